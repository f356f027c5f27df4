//! Level-of-detail selection and drawing.
//!
//! Zoom picks one of four [`RenderMode`]s and every drawing call is a pure
//! function of its arguments plus the global animation clock, so the same
//! frame request always yields the same display list.

pub mod icons;
pub mod palette;
pub mod surface;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::culling::{compute_viewport, filter_visible, CullingConfig, Transform};
use crate::error::{ExplorerError, ExplorerResult};
use crate::models::{GraphData, GraphEdge, GraphNode};

use self::icons::{draw_icon, rect, IconKind};
use self::palette::{color_for_label, contrast, with_alpha, BACKGROUND, TEXT};
use self::surface::{Paint, RadialGradient, Surface};

/// Rendering fidelity, ordered from cheapest to most detailed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    Dots,
    Simple,
    WithLabels,
    Full,
}

/// Zoom levels below which the cheaper mode is used.
/// Must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodThresholds {
    pub dot_mode: f64,
    pub simple_mode: f64,
    pub label_mode: f64,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            dot_mode: 0.3,
            simple_mode: 0.7,
            label_mode: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeStyle {
    pub node_size: f64,
    pub show_labels: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LodStyles {
    pub dots: ModeStyle,
    pub simple: ModeStyle,
    pub with_labels: ModeStyle,
    pub full: ModeStyle,
}

impl Default for LodStyles {
    fn default() -> Self {
        Self {
            dots: ModeStyle {
                node_size: 2.0,
                show_labels: false,
            },
            simple: ModeStyle {
                node_size: 5.0,
                show_labels: false,
            },
            with_labels: ModeStyle {
                node_size: 8.0,
                show_labels: true,
            },
            full: ModeStyle {
                node_size: 12.0,
                show_labels: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LodConfig {
    pub thresholds: LodThresholds,
    pub styles: LodStyles,
    pub max_label_len: usize,
    pub arrow_size: f64,
    /// Fraction of an edge a flow particle travels per unit of animation time.
    pub particle_speed: f64,
    pub particle_radius: f64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            thresholds: LodThresholds::default(),
            styles: LodStyles::default(),
            max_label_len: 20,
            arrow_size: 6.0,
            particle_speed: 0.25,
            particle_radius: 2.0,
        }
    }
}

impl LodConfig {
    pub fn validate(&self) -> ExplorerResult<()> {
        let t = &self.thresholds;
        let ordered = [t.dot_mode, t.simple_mode, t.label_mode];
        if ordered.iter().any(|v| !v.is_finite()) || !(t.dot_mode < t.simple_mode && t.simple_mode < t.label_mode) {
            return Err(ExplorerError::invalid_config(format!(
                "LOD thresholds must be finite and strictly increasing, got {:?}",
                ordered
            )));
        }
        Ok(())
    }

    pub fn style(&self, mode: RenderMode) -> &ModeStyle {
        match mode {
            RenderMode::Dots => &self.styles.dots,
            RenderMode::Simple => &self.styles.simple,
            RenderMode::WithLabels => &self.styles.with_labels,
            RenderMode::Full => &self.styles.full,
        }
    }
}

/// First threshold the zoom is below wins. NaN counts as zero.
pub fn select_mode(zoom: f64, config: &LodConfig) -> RenderMode {
    let zoom = if zoom.is_nan() { 0.0 } else { zoom };
    let t = &config.thresholds;
    if zoom < t.dot_mode {
        RenderMode::Dots
    } else if zoom < t.simple_mode {
        RenderMode::Simple
    } else if zoom < t.label_mode {
        RenderMode::WithLabels
    } else {
        RenderMode::Full
    }
}

fn node_radius(node: &GraphNode, mode: RenderMode, config: &LodConfig) -> f64 {
    let style = config.style(mode);
    match mode {
        RenderMode::Dots | RenderMode::Simple => style.node_size,
        RenderMode::WithLabels | RenderMode::Full => node.radius.unwrap_or(style.node_size),
    }
}

fn node_color(node: &GraphNode) -> String {
    node.color
        .clone()
        .unwrap_or_else(|| color_for_label(node.primary_label()).to_string())
}

/// Best-guess display name: the first property whose key mentions
/// name, title or email. Falls back to the id.
pub fn display_name(node: &GraphNode) -> String {
    node.properties
        .iter()
        .find(|(key, _)| {
            let key = key.to_lowercase();
            key.contains("name") || key.contains("title") || key.contains("email")
        })
        .map(|(_, value)| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| node.id.clone())
}

/// Caps `label` at `max_len` characters, ellipsis included. Caps too short
/// to hold an ellipsis cut the label plainly.
pub fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else if max_len < 3 {
        label.chars().take(max_len).collect()
    } else {
        let kept: String = label.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}

fn centered_text(surface: &mut dyn Surface, text: &str, x: f64, y: f64) {
    let width = surface.measure_text(text);
    surface.fill_text(text, x - width / 2.0, y);
}

fn disc(surface: &mut dyn Surface, x: f64, y: f64, radius: f64) {
    surface.begin_path();
    surface.arc(x, y, radius, 0.0, 2.0 * PI);
}

pub fn draw_node(surface: &mut dyn Surface, node: &GraphNode, mode: RenderMode, config: &LodConfig) {
    let Some((x, y)) = node.position() else {
        return;
    };
    let r = node_radius(node, mode, config);
    let color = node_color(node);
    let show_labels = config.style(mode).show_labels;

    match mode {
        RenderMode::Dots => {
            disc(surface, x, y, r);
            surface.set_fill_style(Paint::color(color.as_str()));
            surface.fill();
        }
        RenderMode::Simple => {
            disc(surface, x, y, r);
            surface.set_fill_style(Paint::color(color.as_str()));
            surface.fill();
            surface.set_stroke_style(Paint::color(contrast(&color)));
            surface.set_line_width(1.0);
            surface.stroke();
        }
        RenderMode::WithLabels => {
            disc(surface, x, y, r);
            surface.set_fill_style(Paint::color(with_alpha(&color, 0.3)));
            surface.fill();
            surface.set_stroke_style(Paint::color(color.as_str()));
            surface.set_line_width(1.5);
            surface.stroke();

            disc(surface, x, y, r * 0.45);
            surface.set_fill_style(Paint::color(color.as_str()));
            surface.fill();

            if show_labels {
                surface.set_font("10px sans-serif");
                surface.set_fill_style(Paint::color(TEXT));
                let label = truncate_label(&display_name(node), config.max_label_len);
                centered_text(surface, &label, x, y + r + 12.0);
            }
        }
        RenderMode::Full => {
            disc(surface, x, y, r * 1.6);
            surface.set_fill_style(
                RadialGradient::new(x, y, r * 0.8, x, y, r * 1.6)
                    .add_color_stop(0.0, with_alpha(&color, 0.35))
                    .add_color_stop(1.0, with_alpha(&color, 0.0))
                    .into(),
            );
            surface.fill();

            disc(surface, x, y, r);
            surface.set_fill_style(Paint::color(with_alpha(&color, 0.25)));
            surface.fill();
            surface.set_stroke_style(Paint::color(color.as_str()));
            surface.set_line_width(2.0);
            surface.stroke();

            disc(surface, x, y, r * 0.72);
            surface.set_stroke_style(Paint::color(with_alpha(&color, 0.6)));
            surface.set_line_width(1.0);
            surface.stroke();

            let icon = IconKind::for_label(node.primary_label());
            draw_icon(surface, icon, x, y, r * 0.5, &color);

            if show_labels {
                surface.set_font("bold 8px sans-serif");
                surface.set_fill_style(Paint::color(with_alpha(&color, 0.9)));
                let caption = node.primary_label().unwrap_or("Node").to_uppercase();
                centered_text(surface, &caption, x, y + r + 11.0);

                surface.set_font("11px sans-serif");
                surface.set_fill_style(Paint::color(TEXT));
                centered_text(surface, &display_name(node), x, y + r + 24.0);
            }
        }
    }
}

/// Phase offset in `[0, 1)` derived from the edge id (FNV-1a), so particles
/// on different edges do not move in lockstep.
pub fn edge_offset(edge_id: &str) -> f64 {
    let hash = edge_id.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    });
    (hash % 10_000) as f64 / 10_000.0
}

/// Fraction of the way along the edge the flow particle sits at `animation_time`.
pub fn particle_progress(edge_id: &str, animation_time: f64, speed: f64) -> f64 {
    (animation_time * speed + edge_offset(edge_id)).rem_euclid(1.0)
}

pub fn draw_edge(
    surface: &mut dyn Surface,
    edge: &GraphEdge,
    source: &GraphNode,
    target: &GraphNode,
    mode: RenderMode,
    config: &LodConfig,
    animation_time: f64,
) {
    let (Some((x1, y1)), Some((x2, y2))) = (source.position(), target.position()) else {
        return;
    };
    let (dx, dy) = (x2 - x1, y2 - y1);
    let dist = (dx * dx + dy * dy).sqrt();
    if dist < 0.001 {
        return;
    }
    let (ux, uy) = (dx / dist, dy / dist);
    let source_r = node_radius(source, mode, config);
    let target_r = node_radius(target, mode, config);
    let with_arrow = mode > RenderMode::Dots;
    let arrow = if with_arrow { config.arrow_size } else { 0.0 };

    let (sx, sy) = (x1 + ux * source_r, y1 + uy * source_r);
    let (tip_x, tip_y) = (x2 - ux * target_r, y2 - uy * target_r);
    let (ex, ey) = (tip_x - ux * arrow, tip_y - uy * arrow);

    let (alpha, width) = match mode {
        RenderMode::Dots => (0.35, 0.5),
        RenderMode::Simple => (0.5, 1.0),
        RenderMode::WithLabels | RenderMode::Full => (0.7, 1.5),
    };
    let edge_color = format!("rgba(160, 175, 200, {alpha})");

    surface.begin_path();
    surface.move_to(sx, sy);
    surface.line_to(ex, ey);
    surface.set_stroke_style(Paint::color(edge_color.as_str()));
    surface.set_line_width(width);
    surface.stroke();

    if !with_arrow {
        return;
    }

    let (px, py) = (-uy * arrow * 0.5, ux * arrow * 0.5);
    surface.begin_path();
    surface.move_to(tip_x, tip_y);
    surface.line_to(ex + px, ey + py);
    surface.line_to(ex - px, ey - py);
    surface.close_path();
    surface.set_fill_style(Paint::color(edge_color.as_str()));
    surface.fill();

    if mode >= RenderMode::WithLabels {
        let (mx, my) = ((sx + ex) / 2.0, (sy + ey) / 2.0);
        surface.set_font("8px sans-serif");
        let text_width = surface.measure_text(&edge.edge_type);
        rect(surface, mx - text_width / 2.0 - 3.0, my - 6.0, text_width + 6.0, 11.0);
        surface.set_fill_style(Paint::color(BACKGROUND));
        surface.fill();
        surface.set_fill_style(Paint::color(with_alpha("#A0AFC8", 0.95)));
        surface.fill_text(&edge.edge_type, mx - text_width / 2.0, my + 3.0);
    }

    let t = particle_progress(&edge.id, animation_time, config.particle_speed);
    disc(surface, sx + (ex - sx) * t, sy + (ey - sy) * t, config.particle_radius);
    surface.set_fill_style(Paint::color("rgba(120, 200, 255, 0.9)"));
    surface.fill();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRequest {
    pub transform: Transform,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub animation_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameStats {
    pub mode: RenderMode,
    pub zoom: f64,
    pub visible_nodes: usize,
    pub visible_edges: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
}

/// Culls `data` against the request's viewport and draws what is left,
/// edges underneath nodes.
pub fn render_frame(
    surface: &mut dyn Surface,
    data: &GraphData,
    request: &FrameRequest,
    culling: &CullingConfig,
    lod: &LodConfig,
) -> FrameStats {
    let viewport = compute_viewport(request.width, request.height, &request.transform);
    let visible = filter_visible(&data.nodes, &data.links, &viewport, culling);
    let mode = select_mode(request.transform.k, lod);

    let by_id: HashMap<&str, &GraphNode> =
        visible.nodes.iter().map(|n| (n.id.as_str(), *n)).collect();

    surface.save();
    surface.set_transform(&request.transform);
    for edge in &visible.edges {
        if let (Some(source), Some(target)) = (
            by_id.get(edge.start_node.as_str()),
            by_id.get(edge.end_node.as_str()),
        ) {
            draw_edge(surface, edge, source, target, mode, lod, request.animation_time);
        }
    }
    for node in &visible.nodes {
        draw_node(surface, node, mode, lod);
    }
    surface.restore();

    FrameStats {
        mode,
        zoom: request.transform.k,
        visible_nodes: visible.nodes.len(),
        visible_edges: visible.edges.len(),
        total_nodes: data.nodes.len(),
        total_edges: data.links.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::surface::{DrawCommand, RecordingSurface};
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn person(id: &str, x: f64, y: f64) -> GraphNode {
        GraphNode::new(id, vec!["Person".into()])
            .with_position(x, y)
            .with_property("name", json!("Ada Lovelace, Countess of Lovelace"))
    }

    fn is_stroke(c: &DrawCommand) -> bool {
        matches!(c, DrawCommand::Stroke)
    }

    #[test]
    fn test_select_mode_thresholds() {
        let config = LodConfig::default();
        assert_eq!(select_mode(0.0, &config), RenderMode::Dots);
        assert_eq!(select_mode(0.29, &config), RenderMode::Dots);
        assert_eq!(select_mode(0.3, &config), RenderMode::Simple);
        assert_eq!(select_mode(1.0, &config), RenderMode::WithLabels);
        assert_eq!(select_mode(1.5, &config), RenderMode::Full);
        assert_eq!(select_mode(f64::INFINITY, &config), RenderMode::Full);
        assert_eq!(select_mode(f64::NAN, &config), RenderMode::Dots);
    }

    #[test]
    fn test_thresholds_must_increase() {
        let mut config = LodConfig::default();
        assert!(config.validate().is_ok());
        config.thresholds.simple_mode = config.thresholds.dot_mode;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_dots_mode_is_a_bare_circle() {
        let mut surface = RecordingSurface::new();
        draw_node(&mut surface, &person("a", 0.0, 0.0), RenderMode::Dots, &LodConfig::default());

        assert_eq!(surface.count(|c| matches!(c, DrawCommand::Arc { .. })), 1);
        assert_eq!(surface.count(is_stroke), 0);
        assert!(surface.texts().is_empty());
    }

    #[test]
    fn test_simple_mode_adds_stroke_only() {
        let mut surface = RecordingSurface::new();
        draw_node(&mut surface, &person("a", 0.0, 0.0), RenderMode::Simple, &LodConfig::default());

        assert_eq!(surface.count(is_stroke), 1);
        assert!(surface.texts().is_empty());
    }

    #[test]
    fn test_label_mode_truncates_name() {
        let mut surface = RecordingSurface::new();
        draw_node(&mut surface, &person("a", 0.0, 0.0), RenderMode::WithLabels, &LodConfig::default());

        assert_eq!(surface.texts(), vec!["Ada Lovelace, Cou..."]);
    }

    #[test]
    fn test_truncate_label_never_exceeds_cap() {
        assert_eq!(truncate_label("abcdef", 6), "abcdef");
        assert_eq!(truncate_label("abcdef", 5), "ab...");
        assert_eq!(truncate_label("abcdef", 3), "...");
        assert_eq!(truncate_label("abcdef", 2), "ab");
        assert_eq!(truncate_label("abcdef", 0), "");
        assert_eq!(truncate_label("héllo wörld", 6), "hél...");
    }

    #[test]
    fn test_non_ascii_colour_from_client_renders_in_every_mode() {
        let data = crate::sanitizer::sanitize(
            &json!({ "nodes": [{ "id": "a", "color": "#aébcd", "x": 1.0, "y": 1.0 }] }),
            &crate::sanitizer::ValidationOptions::default(),
        );
        assert_eq!(data.nodes[0].color.as_deref(), Some("#aébcd"));

        for mode in [RenderMode::Dots, RenderMode::Simple, RenderMode::WithLabels, RenderMode::Full] {
            let mut surface = RecordingSurface::new();
            draw_node(&mut surface, &data.nodes[0], mode, &LodConfig::default());
            assert!(!surface.commands().is_empty());
        }
    }

    #[test]
    fn test_full_mode_draws_halo_icon_and_both_labels() {
        let mut surface = RecordingSurface::new();
        draw_node(&mut surface, &person("a", 0.0, 0.0), RenderMode::Full, &LodConfig::default());

        assert!(surface.commands().iter().any(|c| matches!(
            c,
            DrawCommand::FillStyle { paint: Paint::Radial(_) }
        )));
        assert_eq!(
            surface.texts(),
            vec!["PERSON", "Ada Lovelace, Countess of Lovelace"]
        );
    }

    #[test]
    fn test_unpositioned_node_draws_nothing() {
        let mut surface = RecordingSurface::new();
        draw_node(&mut surface, &GraphNode::new("a", vec![]), RenderMode::Full, &LodConfig::default());
        assert!(surface.commands().is_empty());
    }

    #[test]
    fn test_display_name_prefers_name_like_keys() {
        let node = GraphNode::new("42", vec![])
            .with_property("age", json!(3))
            .with_property("contactEmail", json!("a@b.c"));
        assert_eq!(display_name(&node), "a@b.c");
        assert_eq!(display_name(&GraphNode::new("42", vec![])), "42");
    }

    #[test]
    fn test_edge_at_dots_has_no_arrow_or_particle() {
        let mut surface = RecordingSurface::new();
        let edge = GraphEdge::new("e1", "KNOWS", "a", "b");
        draw_edge(
            &mut surface,
            &edge,
            &person("a", 0.0, 0.0),
            &person("b", 100.0, 0.0),
            RenderMode::Dots,
            &LodConfig::default(),
            0.0,
        );

        assert_eq!(surface.count(|c| matches!(c, DrawCommand::Fill)), 0);
        assert_eq!(surface.count(|c| matches!(c, DrawCommand::Arc { .. })), 0);
    }

    #[test]
    fn test_edge_chip_only_with_labels() {
        let edge = GraphEdge::new("e1", "KNOWS", "a", "b");
        let (a, b) = (person("a", 0.0, 0.0), person("b", 100.0, 0.0));
        let config = LodConfig::default();

        let mut simple = RecordingSurface::new();
        draw_edge(&mut simple, &edge, &a, &b, RenderMode::Simple, &config, 0.0);
        assert!(simple.texts().is_empty());
        assert_eq!(simple.count(|c| matches!(c, DrawCommand::Arc { .. })), 1);

        let mut labelled = RecordingSurface::new();
        draw_edge(&mut labelled, &edge, &a, &b, RenderMode::WithLabels, &config, 0.0);
        assert_eq!(labelled.texts(), vec!["KNOWS"]);
    }

    #[test]
    fn test_particle_progress_wraps_and_staggers() {
        for t in [0.0, 0.5, 3.7, 1000.25] {
            let p = particle_progress("edge", t, 0.25);
            assert!((0.0..1.0).contains(&p));
        }
        assert_ne!(edge_offset("e1"), edge_offset("e2"));
        let a = particle_progress("e1", 2.0, 0.25);
        let b = particle_progress("e1", 6.0, 0.25);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_render_frame_is_deterministic_and_culled() {
        let data = GraphData::new(
            vec![
                person("a", 10.0, 10.0),
                person("b", 50.0, 50.0),
                person("far", 10_000.0, 0.0),
            ],
            vec![
                GraphEdge::new("ab", "KNOWS", "a", "b"),
                GraphEdge::new("af", "KNOWS", "a", "far"),
            ],
        );
        let request = FrameRequest {
            transform: Transform { x: 0.0, y: 0.0, k: 1.0 },
            width: 200.0,
            height: 200.0,
            animation_time: 1.25,
        };

        let mut first = RecordingSurface::new();
        let stats = render_frame(&mut first, &data, &request, &CullingConfig::default(), &LodConfig::default());
        let mut second = RecordingSurface::new();
        render_frame(&mut second, &data, &request, &CullingConfig::default(), &LodConfig::default());

        assert_eq!(first.commands(), second.commands());
        assert_eq!(stats.mode, RenderMode::WithLabels);
        assert_eq!(stats.visible_nodes, 2);
        assert_eq!(stats.visible_edges, 1);
        assert_eq!(stats.total_nodes, 3);
    }

    proptest! {
        #[test]
        fn prop_mode_is_monotone_in_zoom(a in 0.0f64..10.0, b in 0.0f64..10.0) {
            let config = LodConfig::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(select_mode(lo, &config) <= select_mode(hi, &config));
        }
    }
}
