//! Path results.

use glam::DVec3;

use crate::debug_draw::{Color, DebugDrawSink};
use crate::octree::{GenerationParams, Link, OctreeGeometry};
use crate::types::RegionId;

/// One point of a path.
///
/// `layer` is the resolution the point came from: 0 for a leaf sub-voxel,
/// 1 for an unsubdivided layer-0 node, `L + 1` for a node on layer `L`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathPoint {
  pub position: DVec3,
  pub layer: u8,
}

impl PathPoint {
  #[inline]
  pub fn new(position: DVec3, layer: u8) -> Self {
    Self { position, layer }
  }
}

/// Why a search failed, and how far it got.
#[derive(Clone, Debug, PartialEq)]
pub struct PathFailureInfo {
  pub iterations: usize,
  /// Last link popped from the open set.
  pub last_link: Link,
  pub last_position: Option<DVec3>,
  pub start: DVec3,
  pub goal: DVec3,
  /// Straight-line distance between start and goal.
  pub straight_line_distance: f64,
}

/// A computed path from start to goal.
///
/// Only complete results are ever written into a path: failed, cancelled
/// and invalidated requests leave it untouched.
#[derive(Clone, Debug, Default)]
pub struct NavigationPath {
  pub points: Vec<PathPoint>,
  /// Points before post-processing, target first. Kept for inspection.
  pub debug_voxels: Vec<PathPoint>,
  /// Dynamic regions any point lies in.
  pub traversed_regions: Vec<RegionId>,
  ready: bool,
  invalidated: bool,
}

impl NavigationPath {
  pub fn new() -> Self {
    Self::default()
  }

  /// Holds a complete, still valid result.
  #[inline]
  pub fn is_ready(&self) -> bool {
    self.ready && !self.invalidated
  }

  #[inline]
  pub fn is_invalidated(&self) -> bool {
    self.invalidated
  }

  pub fn set_ready(&mut self) {
    self.ready = true;
    self.invalidated = false;
  }

  /// A region this path crosses changed; the points may now be blocked.
  pub fn mark_invalid(&mut self) {
    self.ready = false;
    self.invalidated = true;
  }

  /// Mark invalid if any of `regions` was traversed. Returns whether it was.
  pub fn check_invalidation(&mut self, regions: &[RegionId]) -> bool {
    let hit = self.traversed_regions.iter().any(|id| regions.contains(id));
    if hit {
      self.mark_invalid();
    }
    hit
  }

  /// Record every dynamic region containing a point.
  pub fn record_traversed_regions(&mut self, params: &GenerationParams) {
    self.traversed_regions.clear();
    for point in &self.points {
      for id in params.regions_containing(point.position) {
        if !self.traversed_regions.contains(&id) {
          self.traversed_regions.push(id);
        }
      }
    }
  }

  /// Clear everything, ready for a new request.
  pub fn reset(&mut self) {
    self.points.clear();
    self.debug_voxels.clear();
    self.traversed_regions.clear();
    self.ready = false;
    self.invalidated = false;
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.points.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn start(&self) -> Option<DVec3> {
    self.points.first().map(|p| p.position)
  }

  pub fn end(&self) -> Option<DVec3> {
    self.points.last().map(|p| p.position)
  }

  /// Sum of segment lengths.
  pub fn length(&self) -> f64 {
    self
      .points
      .windows(2)
      .map(|w| w[0].position.distance(w[1].position))
      .sum()
  }

  /// Draw points, connecting lines and the raw search voxels.
  ///
  /// Start is green, end red, the rest blue.
  pub fn debug_draw(&self, sink: &dyn DebugDrawSink, geometry: &OctreeGeometry) {
    let last = self.points.len().saturating_sub(1);
    for (i, point) in self.points.iter().enumerate() {
      let color = match i {
        0 => Color::GREEN,
        i if i == last => Color::RED,
        _ => Color::BLUE,
      };
      sink.draw_box(point.position, debug_box_size(geometry, point.layer), color);
      if i < last {
        sink.draw_line(point.position, self.points[i + 1].position, Color::CYAN, 2.0);
      }
    }
    for voxel in &self.debug_voxels {
      sink.draw_box(voxel.position, debug_box_size(geometry, voxel.layer), Color::YELLOW);
    }
  }
}

/// Smoothing clamp and debug box size for a point layer.
#[inline]
pub(crate) fn debug_box_size(geometry: &OctreeGeometry, layer: u8) -> f64 {
  let scale = if layer == 0 { 0.125 } else { 0.25 };
  geometry.voxel_size(layer) * scale
}
