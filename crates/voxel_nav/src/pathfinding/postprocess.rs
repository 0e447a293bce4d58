//! Path post-processing pipeline.
//!
//! Runs on the raw backtracked points (target first) in a fixed order:
//!
//! ```text
//! chaikin → string pull → position smoothing → intermediate averaging → collinear culling
//! ```
//!
//! Culling only flags points; the survivors are emitted start first at the end.

use glam::DVec3;
use tracing::trace;

use super::path::{debug_box_size, PathPoint};
use super::settings::{PathPointType, PathfinderSettings};
use crate::octree::OctreeGeometry;

/// Below this, a point is considered already on its chord.
const SMOOTHING_EPSILON: f64 = 1e-4;

#[derive(Clone, Copy, Debug)]
pub(crate) struct WorkPoint {
  pub point: PathPoint,
  pub culled: bool,
}

impl WorkPoint {
  #[inline]
  fn position(&self) -> DVec3 {
    self.point.position
  }
}

/// Apply every enabled stage and return the kept points, start first.
pub(crate) fn run(points: Vec<PathPoint>, geometry: &OctreeGeometry, settings: &PathfinderSettings) -> Vec<PathPoint> {
  let points = chaikin(points, settings.smoothing_iterations);
  let mut work: Vec<WorkPoint> = points
    .into_iter()
    .map(|point| WorkPoint { point, culled: false })
    .collect();

  if settings.use_string_pulling {
    string_pull(&mut work, geometry, settings.string_pulling_voxel_threshold);
  }
  if settings.smooth_positions {
    smooth_positions(&mut work, geometry, settings.smoothing_factor);
  }
  if settings.path_point_type == PathPointType::Intermediate {
    average_intermediate(&mut work);
  }
  if settings.optimize_path {
    cull_collinear(&mut work, settings.optimize_dot_tolerance);
  }

  work
    .iter()
    .rev()
    .filter(|w| !w.culled)
    .map(|w| w.point)
    .collect()
}

/// Chaikin corner cutting. Each pass replaces every segment's interior with
/// its quarter points; end points stay put.
pub(crate) fn chaikin(mut points: Vec<PathPoint>, iterations: u32) -> Vec<PathPoint> {
  for _ in 0..iterations {
    if points.len() < 3 {
      break;
    }
    let last = points.len() - 1;
    let mut next = Vec::with_capacity(points.len() * 2);
    next.push(points[0]);
    for (i, pair) in points.windows(2).enumerate() {
      let (a, b) = (pair[0], pair[1]);
      if i > 0 {
        next.push(PathPoint::new(a.position.lerp(b.position, 0.25), a.layer));
      }
      if i + 1 < last {
        next.push(PathPoint::new(a.position.lerp(b.position, 0.75), a.layer));
      }
    }
    next.push(points[last]);
    points = next;
  }
  points
}

/// Drop points lying within `threshold` of a point's voxel size from the
/// straight line between the current apex and the furthest point reachable
/// that way. Points at layer transitions are always kept.
pub(crate) fn string_pull(points: &mut [WorkPoint], geometry: &OctreeGeometry, threshold: f64) {
  let n = points.len();
  if n < 3 {
    return;
  }
  for p in points.iter_mut() {
    p.culled = false;
  }

  let mut keep = vec![false; n];
  keep[0] = true;
  keep[n - 1] = true;

  let mut apex = 0;
  while apex < n - 1 {
    let apex_pos = points[apex].position();
    let furthest = (apex + 1..n).rev().find(|&test| {
      let dir = (points[test].position() - apex_pos).normalize_or_zero();
      points[apex + 1..test].iter().all(|mid| {
        let along = (mid.position() - apex_pos).dot(dir);
        let projected = apex_pos + dir * along;
        mid.position().distance(projected) <= geometry.voxel_size(mid.point.layer) * threshold
      })
    });

    // `apex + 1` always qualifies, having no intermediates.
    let furthest = furthest.unwrap_or(apex + 1);
    keep[furthest] = true;
    let apex_layer = points[apex].point.layer;
    let far_layer = points[furthest].point.layer;
    for i in apex + 1..furthest {
      let layer = points[i].point.layer;
      if layer == apex_layer && layer == far_layer {
        points[i].culled = true;
      } else {
        keep[i] = true;
      }
    }
    apex = furthest;
  }

  for (p, kept) in points.iter_mut().zip(keep) {
    if !kept {
      p.culled = true;
    }
  }
  trace!(
    original = n,
    kept = points.iter().filter(|p| !p.culled).count(),
    "string pulling"
  );
}

/// Pull each interior point toward the chord between its surviving
/// neighbours by `factor` of the distance, clamped to a fraction of its voxel.
pub(crate) fn smooth_positions(points: &mut [WorkPoint], geometry: &OctreeGeometry, factor: f64) {
  let valid: Vec<usize> = (0..points.len()).filter(|&i| !points[i].culled).collect();
  if valid.len() < 3 {
    return;
  }

  for w in 1..valid.len() - 1 {
    let prev = points[valid[w - 1]].position();
    let next = points[valid[w + 1]].position();
    let current = &mut points[valid[w]];

    let max_move = debug_box_size(geometry, current.point.layer);
    let dir = (next - prev).normalize_or_zero();
    let projected = prev + dir * (current.position() - prev).dot(dir);
    let distance = current.position().distance(projected);

    if distance > SMOOTHING_EPSILON {
      let step = (distance * factor).min(max_move);
      let towards = (projected - current.position()).normalize_or_zero();
      current.point.position += towards * step;
    }
  }
}

/// Halve the step between consecutive same-layer points to flatten
/// diagonal zig-zags. End points are untouched.
pub(crate) fn average_intermediate(points: &mut [WorkPoint]) {
  let n = points.len();
  if n < 3 {
    return;
  }
  for i in (1..n - 1).rev() {
    if points[i].point.layer == points[i - 1].point.layer {
      let previous = points[i - 1].position();
      let p = &mut points[i].point.position;
      *p += (previous - *p) * 0.5;
    }
  }
}

/// Cull surviving points whose direction from the last kept point deviates
/// from the direction to the following point by less than `tolerance_deg`.
/// The first and the last two points are never culled.
///
/// Points already culled by string pulling are skipped entirely: they are
/// never the point under test nor the following point. Only survivors take
/// part, so a dropped detour cannot keep a collinear point alive.
pub(crate) fn cull_collinear(points: &mut [WorkPoint], tolerance_deg: f64) {
  let survivors: Vec<usize> = (0..points.len()).filter(|&i| !points[i].culled).collect();
  if survivors.len() < 4 {
    return;
  }

  let mut last = points[survivors[0]].position();
  for s in 1..survivors.len() - 2 {
    let this = points[survivors[s]].position();
    let next = points[survivors[s + 1]].position();
    let a = (this - last).normalize_or_zero();
    let b = (next - last).normalize_or_zero();
    let angle = a.dot(b).clamp(-1.0, 1.0).acos().to_degrees();
    if angle < tolerance_deg {
      points[survivors[s]].culled = true;
    } else {
      last = this;
    }
  }
}

#[cfg(test)]
#[path = "postprocess_test.rs"]
mod postprocess_test;
