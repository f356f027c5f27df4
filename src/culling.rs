//! Viewport culling.
//!
//! Everything here is a pure function of its inputs. Nodes are filtered
//! first, then relationships are kept only when both endpoints survived, so
//! a relationship is never drawn with one end off screen.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{GraphEdge, GraphNode};

/// Pan/zoom transform: screen = world * k + (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, k: 1.0 }
    }
}

/// World-space rectangle currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn contains(&self, x: f64, y: f64, padding: f64) -> bool {
        x >= self.x - padding
            && x <= self.x + self.width + padding
            && y >= self.y - padding
            && y <= self.y + self.height + padding
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CullingConfig {
    /// World units added on every side of the viewport before testing.
    pub padding: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Node count from which the node pass runs on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for CullingConfig {
    fn default() -> Self {
        Self {
            padding: 100.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
            parallel_threshold: 5_000,
        }
    }
}

impl CullingConfig {
    pub fn clamp_zoom(&self, k: f64) -> f64 {
        k.clamp(self.min_zoom, self.max_zoom)
    }
}

/// Borrowed view of the elements that survive culling.
#[derive(Debug, Default)]
pub struct Visible<'a> {
    pub nodes: Vec<&'a GraphNode>,
    pub edges: Vec<&'a GraphEdge>,
}

pub fn compute_viewport(screen_width: f64, screen_height: f64, transform: &Transform) -> Viewport {
    let k = if transform.k > 0.0 { transform.k } else { f64::EPSILON };
    Viewport {
        x: -transform.x / k,
        y: -transform.y / k,
        width: screen_width / k,
        height: screen_height / k,
        zoom: transform.k,
    }
}

/// Unpositioned nodes are never visible.
pub fn is_visible(node: &GraphNode, viewport: &Viewport, config: &CullingConfig) -> bool {
    node.position()
        .is_some_and(|(x, y)| viewport.contains(x, y, config.padding))
}

pub fn filter_visible<'a>(
    nodes: &'a [GraphNode],
    edges: &'a [GraphEdge],
    viewport: &Viewport,
    config: &CullingConfig,
) -> Visible<'a> {
    let visible_nodes: Vec<&GraphNode> = if nodes.len() >= config.parallel_threshold {
        nodes
            .par_iter()
            .filter(|n| is_visible(n, viewport, config))
            .collect()
    } else {
        nodes
            .iter()
            .filter(|n| is_visible(n, viewport, config))
            .collect()
    };

    let ids: HashSet<&str> = visible_nodes.iter().map(|n| n.id.as_str()).collect();
    let visible_edges = edges
        .iter()
        .filter(|e| ids.contains(e.start_node.as_str()) && ids.contains(e.end_node.as_str()))
        .collect();

    Visible {
        nodes: visible_nodes,
        edges: visible_edges,
    }
}
