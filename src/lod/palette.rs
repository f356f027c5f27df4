//! Label colours and colour-string helpers.

pub const PALETTE: &[&str] = &[
    "#4C8EDA", "#F79767", "#57C7E3", "#F16667", "#8DCC93", "#D9C8AE", "#FFC454", "#DA7194",
    "#C990C0", "#6DCE9E", "#A5ABB6", "#FF756E",
];

pub const DEFAULT_COLOR: &str = "#A5ABB6";
pub const BACKGROUND: &str = "#1A1A2E";
pub const TEXT: &str = "#F5F5F5";

/// Deterministic palette colour for a label.
pub fn color_for_label(label: Option<&str>) -> &'static str {
    match label {
        Some(label) if !label.is_empty() => PALETTE[label_hash(label) as usize % PALETTE.len()],
        _ => DEFAULT_COLOR,
    }
}

fn label_hash(label: &str) -> u32 {
    let hash = label.chars().fold(0i32, |hash, c| {
        (c as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    hash.unsigned_abs()
}

/// `#RRGGBB` (or `#RGB`) to an `rgba(...)` string with the given alpha.
/// Anything that is not a hex colour is returned unchanged.
pub fn with_alpha(color: &str, alpha: f64) -> String {
    match parse_hex(color) {
        Some((r, g, b)) => format!("rgba({}, {}, {}, {:.2})", r, g, b, alpha.clamp(0.0, 1.0)),
        None => color.to_string(),
    }
}

/// Black or white, whichever reads better on `color`.
pub fn contrast(color: &str) -> &'static str {
    match parse_hex(color) {
        Some((r, g, b)) => {
            let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            if luma > 150.0 {
                "#1A1A2E"
            } else {
                "#FFFFFF"
            }
        }
        None => "#FFFFFF",
    }
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}
