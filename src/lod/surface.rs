//! Minimal immediate-mode 2D surface.
//!
//! The renderer only ever needs paths, arcs, fills, strokes and text, which
//! any canvas-like backend can provide. [`RecordingSurface`] captures the
//! calls as a serializable display list.

use serde::Serialize;

use crate::culling::Transform;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadialGradient {
    pub x0: f64,
    pub y0: f64,
    pub r0: f64,
    pub x1: f64,
    pub y1: f64,
    pub r1: f64,
    pub stops: Vec<(f64, String)>,
}

impl RadialGradient {
    pub fn new(x0: f64, y0: f64, r0: f64, x1: f64, y1: f64, r1: f64) -> Self {
        Self {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
            stops: Vec::new(),
        }
    }

    pub fn add_color_stop(mut self, offset: f64, color: impl Into<String>) -> Self {
        self.stops.push((offset.clamp(0.0, 1.0), color.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Paint {
    Color { value: String },
    Radial(RadialGradient),
}

impl Paint {
    pub fn color(value: impl Into<String>) -> Self {
        Paint::Color {
            value: value.into(),
        }
    }
}

impl From<RadialGradient> for Paint {
    fn from(gradient: RadialGradient) -> Self {
        Paint::Radial(gradient)
    }
}

pub trait Surface {
    fn save(&mut self);
    fn restore(&mut self);
    fn set_transform(&mut self, transform: &Transform);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn arc(&mut self, x: f64, y: f64, radius: f64, start_angle: f64, end_angle: f64);
    fn close_path(&mut self);
    fn fill(&mut self);
    fn stroke(&mut self);

    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    fn measure_text(&self, text: &str) -> f64;

    fn set_fill_style(&mut self, paint: Paint);
    fn set_stroke_style(&mut self, paint: Paint);
    fn set_line_width(&mut self, width: f64);
    fn set_font(&mut self, font: &str);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Save,
    Restore,
    SetTransform { x: f64, y: f64, k: f64 },
    BeginPath,
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    Arc { x: f64, y: f64, radius: f64, start: f64, end: f64 },
    ClosePath,
    Fill,
    Stroke,
    FillText { text: String, x: f64, y: f64 },
    FillStyle { paint: Paint },
    StrokeStyle { paint: Paint },
    LineWidth { width: f64 },
    Font { font: String },
}

/// Records every call. Text is measured from the pixel size in the current
/// font string (`"12px sans-serif"` measures 0.6 * 12 per character).
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
    font_px: f64,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            font_px: 10.0,
        }
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<DrawCommand> {
        self.commands
    }

    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

fn font_size(font: &str) -> Option<f64> {
    font.split_whitespace()
        .find_map(|part| part.strip_suffix("px"))
        .and_then(|px| px.parse().ok())
}

impl Surface for RecordingSurface {
    fn save(&mut self) {
        self.push(DrawCommand::Save);
    }

    fn restore(&mut self) {
        self.push(DrawCommand::Restore);
    }

    fn set_transform(&mut self, transform: &Transform) {
        self.push(DrawCommand::SetTransform {
            x: transform.x,
            y: transform.y,
            k: transform.k,
        });
    }

    fn begin_path(&mut self) {
        self.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.push(DrawCommand::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.push(DrawCommand::LineTo { x, y });
    }

    fn arc(&mut self, x: f64, y: f64, radius: f64, start_angle: f64, end_angle: f64) {
        self.push(DrawCommand::Arc {
            x,
            y,
            radius,
            start: start_angle,
            end: end_angle,
        });
    }

    fn close_path(&mut self) {
        self.push(DrawCommand::ClosePath);
    }

    fn fill(&mut self) {
        self.push(DrawCommand::Fill);
    }

    fn stroke(&mut self) {
        self.push(DrawCommand::Stroke);
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn measure_text(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.font_px * 0.6
    }

    fn set_fill_style(&mut self, paint: Paint) {
        self.push(DrawCommand::FillStyle { paint });
    }

    fn set_stroke_style(&mut self, paint: Paint) {
        self.push(DrawCommand::StrokeStyle { paint });
    }

    fn set_line_width(&mut self, width: f64) {
        self.push(DrawCommand::LineWidth { width });
    }

    fn set_font(&mut self, font: &str) {
        if let Some(px) = font_size(font) {
            self.font_px = px;
        }
        self.push(DrawCommand::Font {
            font: font.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_text_tracks_font() {
        let mut surface = RecordingSurface::new();
        assert_eq!(surface.measure_text("abcd"), 24.0);
        surface.set_font("bold 20px sans-serif");
        assert_eq!(surface.measure_text("ab"), 24.0);
    }

    #[test]
    fn test_display_list_serializes() {
        let mut surface = RecordingSurface::new();
        surface.set_fill_style(
            RadialGradient::new(0.0, 0.0, 1.0, 0.0, 0.0, 5.0)
                .add_color_stop(0.0, "#fff")
                .into(),
        );
        surface.arc(1.0, 2.0, 3.0, 0.0, 1.0);

        let json = serde_json::to_value(surface.commands()).unwrap();
        assert_eq!(json[0]["op"], "fill_style");
        assert_eq!(json[0]["paint"]["kind"], "radial");
        assert_eq!(json[1]["op"], "arc");
    }
}
