//! Debug drawing hooks.
//!
//! Drawing is purely observational: sinks receive primitives during
//! generation and path inspection and never influence results.

use glam::DVec3;

use crate::octree::Aabb;
pub use crate::types::Color;

/// Receiver for debug primitives. Every method defaults to a no-op.
pub trait DebugDrawSink: Send + Sync {
  fn draw_string(&self, _position: DVec3, _text: &str, _color: Color) {}

  fn draw_box(&self, _center: DVec3, _half_size: f64, _color: Color) {}

  fn draw_line(&self, _start: DVec3, _end: DVec3, _color: Color, _thickness: f32) {}

  fn draw_arrow(&self, _start: DVec3, _end: DVec3, _color: Color, _arrow_size: f32) {}
}

/// Sink that draws nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDebugDraw;

impl DebugDrawSink for NoDebugDraw {}

/// Default radius around `debug_position` inside which primitives are drawn.
pub const DEFAULT_DEBUG_DISTANCE: f64 = 5000.0;

/// What to draw during generation, and where.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugDrawFlags {
  pub show_voxels: bool,
  pub show_leaf_voxels: bool,
  pub show_morton_codes: bool,
  pub show_neighbour_links: bool,
  pub show_parent_child_links: bool,
  /// When set, only primitives inside this box are drawn.
  pub filter_box: Option<Aabb>,
  pub debug_position: DVec3,
  pub debug_distance: f64,
}

impl DebugDrawFlags {
  /// Everything off.
  pub const NONE: Self = Self {
    show_voxels: false,
    show_leaf_voxels: false,
    show_morton_codes: false,
    show_neighbour_links: false,
    show_parent_child_links: false,
    filter_box: None,
    debug_position: DVec3::ZERO,
    debug_distance: DEFAULT_DEBUG_DISTANCE,
  };

  /// Whether anything is drawn at all.
  pub fn any(&self) -> bool {
    self.show_voxels
      || self.show_leaf_voxels
      || self.show_morton_codes
      || self.show_neighbour_links
      || self.show_parent_child_links
  }

  /// Filter box when set, otherwise distance to `debug_position`.
  pub fn in_range(&self, position: DVec3) -> bool {
    match &self.filter_box {
      Some(filter) => filter.contains_point(position),
      None => position.distance_squared(self.debug_position) < self.debug_distance * self.debug_distance,
    }
  }
}

impl Default for DebugDrawFlags {
  fn default() -> Self {
    Self::NONE
  }
}
