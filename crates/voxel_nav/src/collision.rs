//! Collision oracle contract.
//!
//! Generation and regeneration only ever ask one question: "is anything
//! solid inside this cube?". The oracle is supplied by the host; this module
//! defines the trait plus two simple implementations.

use std::sync::Arc;

use glam::DVec3;

use crate::octree::Aabb;
pub use crate::types::CollisionChannel;

/// Answers occupancy queries for axis-aligned cubes.
///
/// Called concurrently from rayon workers during rasterization.
pub trait CollisionOracle: Send + Sync {
  /// Whether the cube of `half_size` around `position` overlaps blocking
  /// geometry.
  fn is_blocked(&self, position: DVec3, half_size: f64, channel: CollisionChannel, agent_radius: f64) -> bool;

  /// Whole-leaf fast reject. A `false` answer skips all 64 sub-voxel
  /// queries for the leaf.
  fn is_leaf_blocked(
    &self,
    position: DVec3,
    leaf_half_size: f64,
    channel: CollisionChannel,
    agent_radius: f64,
  ) -> bool {
    self.is_blocked(position, leaf_half_size, channel, agent_radius)
  }
}

/// Blanket impl for boxed trait objects.
impl<T: CollisionOracle + ?Sized> CollisionOracle for Box<T> {
  fn is_blocked(&self, position: DVec3, half_size: f64, channel: CollisionChannel, agent_radius: f64) -> bool {
    (**self).is_blocked(position, half_size, channel, agent_radius)
  }

  fn is_leaf_blocked(&self, position: DVec3, leaf_half_size: f64, channel: CollisionChannel, agent_radius: f64) -> bool {
    (**self).is_leaf_blocked(position, leaf_half_size, channel, agent_radius)
  }
}

/// Blanket impl for shared trait objects.
impl<T: CollisionOracle + ?Sized> CollisionOracle for Arc<T> {
  fn is_blocked(&self, position: DVec3, half_size: f64, channel: CollisionChannel, agent_radius: f64) -> bool {
    (**self).is_blocked(position, half_size, channel, agent_radius)
  }

  fn is_leaf_blocked(&self, position: DVec3, leaf_half_size: f64, channel: CollisionChannel, agent_radius: f64) -> bool {
    (**self).is_leaf_blocked(position, leaf_half_size, channel, agent_radius)
  }
}

// =============================================================================
// Implementations
// =============================================================================

/// Nothing is ever blocked.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenSpace;

impl CollisionOracle for OpenSpace {
  fn is_blocked(&self, _: DVec3, _: f64, _: CollisionChannel, _: f64) -> bool {
    false
  }
}

/// Static set of solid boxes. A query cube (inflated by the agent radius)
/// is blocked when it overlaps any box.
#[derive(Clone, Debug, Default)]
pub struct BoxObstacles {
  pub boxes: Vec<Aabb>,
}

impl BoxObstacles {
  pub fn new(boxes: Vec<Aabb>) -> Self {
    Self { boxes }
  }

  pub fn push(&mut self, aabb: Aabb) {
    self.boxes.push(aabb);
  }
}

impl CollisionOracle for BoxObstacles {
  fn is_blocked(&self, position: DVec3, half_size: f64, _: CollisionChannel, agent_radius: f64) -> bool {
    let query = Aabb::from_center_half_extents(position, DVec3::splat(half_size + agent_radius));
    self.boxes.iter().any(|b| b.overlaps(&query))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_open_space_never_blocks() {
    let oracle = OpenSpace;
    assert!(!oracle.is_blocked(DVec3::ZERO, 1e6, CollisionChannel::default(), 0.0));
    assert!(!oracle.is_leaf_blocked(DVec3::ZERO, 1e6, CollisionChannel::default(), 0.0));
  }

  #[test]
  fn test_box_obstacles_overlap() {
    let oracle = BoxObstacles::new(vec![Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0))]);
    let ch = CollisionChannel::default();
    assert!(oracle.is_blocked(DVec3::ZERO, 0.1, ch, 0.0));
    assert!(oracle.is_blocked(DVec3::new(2.0, 0.0, 0.0), 1.0, ch, 0.0), "touching counts");
    assert!(!oracle.is_blocked(DVec3::new(3.0, 0.0, 0.0), 1.0, ch, 0.0));
    assert!(oracle.is_blocked(DVec3::new(3.0, 0.0, 0.0), 1.0, ch, 1.0), "agent radius inflates the query");
  }

  /// Boxed and shared oracles forward to the inner implementation.
  #[test]
  fn test_smart_pointer_impls() {
    let boxed: Box<dyn CollisionOracle> = Box::new(BoxObstacles::new(vec![Aabb::new(DVec3::ZERO, DVec3::ONE)]));
    let shared: Arc<dyn CollisionOracle> = Arc::new(OpenSpace);
    let ch = CollisionChannel::default();
    assert!(boxed.is_blocked(DVec3::splat(0.5), 0.1, ch, 0.0));
    assert!(!shared.is_blocked(DVec3::splat(0.5), 0.1, ch, 0.0));
  }
}
