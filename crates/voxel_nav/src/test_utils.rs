//! Test utilities shared across module tests.
//!
//! Provides collision fixtures and small helpers for building generated
//! stores and volumes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::DVec3;

use crate::collision::{BoxObstacles, CollisionChannel, CollisionOracle};
use crate::debug_draw::NoDebugDraw;
use crate::generation::generate;
use crate::octree::{Aabb, GenerationParams, OctreeStore};

// =============================================================================
// Fixtures
// =============================================================================

/// Volume used by most scenarios: extents 500 around the origin, 5 layers.
pub fn standard_params() -> GenerationParams {
  GenerationParams::new(DVec3::ZERO, DVec3::splat(500.0), 4)
}

/// Wall of thickness 50 at y=0 spanning ±1000 on x and z. Splits the
/// standard volume in two.
pub fn split_wall() -> BoxObstacles {
  BoxObstacles::new(vec![Aabb::new(
    DVec3::new(-1000.0, -25.0, -1000.0),
    DVec3::new(1000.0, 25.0, 1000.0),
  )])
}

/// Two walls at x=0 (thickness 50) leaving a gap for |y| < 50.
pub fn gapped_walls() -> BoxObstacles {
  BoxObstacles::new(vec![
    Aabb::new(DVec3::new(-25.0, -300.0, -300.0), DVec3::new(25.0, -50.0, 300.0)),
    Aabb::new(DVec3::new(-25.0, 50.0, -300.0), DVec3::new(25.0, 300.0, 300.0)),
  ])
}

/// Small blockers scattered inside the cube (-200..200)³, one of them at
/// the centre.
pub fn scattered_obstacles() -> BoxObstacles {
  let mut boxes = Vec::new();
  for &c in &[
    DVec3::ZERO,
    DVec3::new(-120.0, 40.0, 80.0),
    DVec3::new(100.0, -90.0, -60.0),
    DVec3::new(60.0, 140.0, -150.0),
    DVec3::new(-150.0, -150.0, 150.0),
  ] {
    boxes.push(Aabb::from_center_half_extents(c, DVec3::splat(20.0)));
  }
  BoxObstacles::new(boxes)
}

/// The dynamic region used with [`scattered_obstacles`].
pub fn scattered_region() -> Aabb {
  Aabb::new(DVec3::splat(-200.0), DVec3::splat(200.0))
}

/// Wraps an oracle and counts queries.
pub struct CountingOracle<O> {
  pub inner: O,
  pub calls: AtomicUsize,
}

impl<O> CountingOracle<O> {
  pub fn new(inner: O) -> Self {
    Self {
      inner,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn count(&self) -> usize {
    self.calls.load(Ordering::Relaxed)
  }
}

impl<O: CollisionOracle> CollisionOracle for CountingOracle<O> {
  fn is_blocked(&self, position: DVec3, half_size: f64, channel: CollisionChannel, agent_radius: f64) -> bool {
    self.calls.fetch_add(1, Ordering::Relaxed);
    self.inner.is_blocked(position, half_size, channel, agent_radius)
  }
}

// =============================================================================
// Helpers
// =============================================================================

/// Generate a store, panicking on failure.
pub fn build_store(params: &GenerationParams, oracle: &dyn CollisionOracle) -> OctreeStore {
  generate(params, oracle, &NoDebugDraw).expect("generation should succeed")
}

/// Shared oracle handle.
pub fn shared<O: CollisionOracle + 'static>(oracle: O) -> Arc<dyn CollisionOracle> {
  Arc::new(oracle)
}

/// Poll `condition` every millisecond for up to `timeout_ms`.
pub fn wait_until(timeout_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
  for _ in 0..timeout_ms {
    if condition() {
      return true;
    }
    std::thread::sleep(std::time::Duration::from_millis(1));
  }
  condition()
}
