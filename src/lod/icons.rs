//! Small vector icons drawn inside nodes at full detail.

use serde::Serialize;
use std::f64::consts::PI;

use super::surface::{Paint, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IconKind {
    Person,
    Movie,
    Product,
    Order,
    Category,
    Organization,
    Location,
    Time,
    Default,
}

const KEYWORDS: &[(IconKind, &[&str])] = &[
    (IconKind::Person, &["person", "user", "actor", "director", "customer", "employee", "people"]),
    (IconKind::Movie, &["movie", "film", "show"]),
    (IconKind::Product, &["product", "item"]),
    (IconKind::Order, &["order", "purchase", "invoice"]),
    (IconKind::Category, &["category", "genre", "tag"]),
    (IconKind::Organization, &["organization", "organisation", "company", "supplier"]),
    (IconKind::Location, &["location", "city", "country", "address", "place", "region"]),
    (IconKind::Time, &["time", "date", "year", "shipper"]),
];

impl IconKind {
    /// Keyword match against the lower-cased label; first match wins.
    pub fn for_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return IconKind::Default;
        };
        let label = label.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| label.contains(w)))
            .map(|(kind, _)| *kind)
            .unwrap_or(IconKind::Default)
    }
}

/// Draws `kind` centred on `(x, y)` within a box of half-width `size`.
pub fn draw_icon(surface: &mut dyn Surface, kind: IconKind, x: f64, y: f64, size: f64, color: &str) {
    surface.set_stroke_style(Paint::color(color));
    surface.set_fill_style(Paint::color(color));
    surface.set_line_width((size * 0.15).max(1.0));

    match kind {
        IconKind::Person => {
            circle(surface, x, y - size * 0.35, size * 0.3);
            surface.fill();
            surface.begin_path();
            surface.arc(x, y + size * 0.75, size * 0.65, PI, 2.0 * PI);
            surface.close_path();
            surface.fill();
        }
        IconKind::Movie => {
            rect(surface, x - size * 0.7, y - size * 0.45, size * 1.4, size * 0.9);
            surface.stroke();
            surface.begin_path();
            surface.move_to(x - size * 0.2, y - size * 0.25);
            surface.line_to(x + size * 0.3, y);
            surface.line_to(x - size * 0.2, y + size * 0.25);
            surface.close_path();
            surface.fill();
        }
        IconKind::Product => {
            // box with a lid line
            rect(surface, x - size * 0.6, y - size * 0.4, size * 1.2, size);
            surface.stroke();
            surface.begin_path();
            surface.move_to(x - size * 0.6, y - size * 0.1);
            surface.line_to(x + size * 0.6, y - size * 0.1);
            surface.stroke();
        }
        IconKind::Order => {
            rect(surface, x - size * 0.5, y - size * 0.65, size, size * 1.3);
            surface.stroke();
            for row in 0..3 {
                let ly = y - size * 0.3 + row as f64 * size * 0.3;
                surface.begin_path();
                surface.move_to(x - size * 0.3, ly);
                surface.line_to(x + size * 0.3, ly);
                surface.stroke();
            }
        }
        IconKind::Category => {
            surface.begin_path();
            surface.move_to(x - size * 0.6, y - size * 0.6);
            surface.line_to(x + size * 0.1, y - size * 0.6);
            surface.line_to(x + size * 0.7, y);
            surface.line_to(x + size * 0.1, y + size * 0.6);
            surface.line_to(x - size * 0.6, y + size * 0.6);
            surface.close_path();
            surface.stroke();
            circle(surface, x - size * 0.3, y - size * 0.3, size * 0.1);
            surface.fill();
        }
        IconKind::Organization => {
            rect(surface, x - size * 0.5, y - size * 0.7, size, size * 1.4);
            surface.stroke();
            for (dx, dy) in [(-0.22, -0.4), (0.22, -0.4), (-0.22, 0.0), (0.22, 0.0)] {
                rect(surface, x + dx * size - size * 0.08, y + dy * size, size * 0.16, size * 0.16);
                surface.fill();
            }
        }
        IconKind::Location => {
            surface.begin_path();
            surface.arc(x, y - size * 0.2, size * 0.45, PI * 0.8, PI * 2.2);
            surface.line_to(x, y + size * 0.75);
            surface.close_path();
            surface.stroke();
            circle(surface, x, y - size * 0.2, size * 0.15);
            surface.fill();
        }
        IconKind::Time => {
            circle(surface, x, y, size * 0.65);
            surface.stroke();
            surface.begin_path();
            surface.move_to(x, y);
            surface.line_to(x, y - size * 0.4);
            surface.move_to(x, y);
            surface.line_to(x + size * 0.3, y + size * 0.1);
            surface.stroke();
        }
        IconKind::Default => {
            surface.begin_path();
            for i in 0..6 {
                let angle = PI / 3.0 * i as f64 - PI / 6.0;
                let (px, py) = (x + size * 0.65 * angle.cos(), y + size * 0.65 * angle.sin());
                if i == 0 {
                    surface.move_to(px, py);
                } else {
                    surface.line_to(px, py);
                }
            }
            surface.close_path();
            surface.stroke();
            circle(surface, x, y, size * 0.15);
            surface.fill();
        }
    }
}

fn circle(surface: &mut dyn Surface, x: f64, y: f64, radius: f64) {
    surface.begin_path();
    surface.arc(x, y, radius, 0.0, 2.0 * PI);
}

pub(crate) fn rect(surface: &mut dyn Surface, x: f64, y: f64, width: f64, height: f64) {
    surface.begin_path();
    surface.move_to(x, y);
    surface.line_to(x + width, y);
    surface.line_to(x + width, y + height);
    surface.line_to(x, y + height);
    surface.close_path();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lod::surface::{DrawCommand, RecordingSurface};

    #[test]
    fn test_keyword_matching() {
        assert_eq!(IconKind::for_label(Some("Person")), IconKind::Person);
        assert_eq!(IconKind::for_label(Some("FeatureFilm")), IconKind::Movie);
        assert_eq!(IconKind::for_label(Some("Shipper")), IconKind::Time);
        assert_eq!(IconKind::for_label(Some("Supplier")), IconKind::Organization);
        assert_eq!(IconKind::for_label(Some("Widget")), IconKind::Default);
        assert_eq!(IconKind::for_label(None), IconKind::Default);
    }

    #[test]
    fn test_default_icon_is_hexagon_with_dot() {
        let mut surface = RecordingSurface::new();
        draw_icon(&mut surface, IconKind::Default, 0.0, 0.0, 10.0, "#fff");

        assert_eq!(surface.count(|c| matches!(c, DrawCommand::LineTo { .. })), 5);
        assert_eq!(surface.count(|c| matches!(c, DrawCommand::Arc { .. })), 1);
    }
}
