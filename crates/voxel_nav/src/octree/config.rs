//! Generation parameters and the coordinate math shared by every layer.

use std::collections::BTreeMap;

use glam::{DVec3, UVec3};
use serde::{Deserialize, Serialize};

use super::Aabb;
use crate::constants::{MAX_VOXEL_POWER, MIN_VOXEL_POWER};
use crate::debug_draw::DebugDrawFlags;
use crate::error::{NavError, NavResult};
use crate::morton;
use crate::types::{CollisionChannel, RegionId};

/// Tolerance used when deciding whether a region's bounds changed.
pub const REGION_BOUNDS_TOLERANCE: f64 = 0.001;

// =============================================================================
// OctreeGeometry
// =============================================================================

/// Spatial layout of an octree: where it sits and how deep it goes.
///
/// Layer `L` holds `2^(P - L)` nodes per side, layer `P` is the single root.
///
/// ```text
/// voxel_size(L) = extents.x / 2^P * 2^(L + 1)
/// centre(L, c)  = origin - extents + decode(c) * voxel_size(L) + voxel_size(L) / 2
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OctreeGeometry {
  pub origin: DVec3,
  pub extents: DVec3,
  pub voxel_power: u8,
}

impl OctreeGeometry {
  /// Layer count (`voxel_power + 1`).
  #[inline]
  pub fn num_layers(&self) -> usize {
    self.voxel_power as usize + 1
  }

  /// Index of the root layer.
  #[inline]
  pub fn root_layer(&self) -> u8 {
    self.voxel_power
  }

  #[inline]
  pub fn nodes_per_side(&self, layer: u8) -> u32 {
    1u32 << (self.voxel_power.saturating_sub(layer))
  }

  #[inline]
  pub fn nodes_in_layer(&self, layer: u8) -> u64 {
    let side = self.nodes_per_side(layer) as u64;
    side * side * side
  }

  /// Edge length of a node at `layer`. Layers above the root keep doubling.
  #[inline]
  pub fn voxel_size(&self, layer: u8) -> f64 {
    self.extents.x / 2f64.powi(self.voxel_power as i32) * 2f64.powi(layer as i32 + 1)
  }

  /// Minimum corner of the volume.
  #[inline]
  pub fn min_corner(&self) -> DVec3 {
    self.origin - self.extents
  }

  #[inline]
  pub fn bounds(&self) -> Aabb {
    Aabb::from_center_half_extents(self.origin, self.extents)
  }

  /// Centre of the node with morton `code` on `layer`.
  #[inline]
  pub fn node_position(&self, layer: u8, code: u64) -> DVec3 {
    let voxel = self.voxel_size(layer);
    let c = morton::decode(code);
    self.min_corner() + c.as_dvec3() * voxel + DVec3::splat(voxel * 0.5)
  }

  /// Grid coordinate of the node on `layer` containing `position`, clamped
  /// to the layer.
  pub fn coord_at(&self, layer: u8, position: DVec3) -> UVec3 {
    let voxel = self.voxel_size(layer);
    let max = (self.nodes_per_side(layer) - 1) as f64;
    let local = ((position - self.min_corner()) / voxel).floor();
    local.clamp(DVec3::ZERO, DVec3::splat(max)).as_uvec3()
  }

  /// Inclusive coordinate range on `layer` overlapped by `aabb`
  /// (floor of the min corner, ceil of the max corner, clamped).
  pub fn coord_range(&self, layer: u8, aabb: &Aabb) -> (UVec3, UVec3) {
    let voxel = self.voxel_size(layer);
    let max = (self.nodes_per_side(layer) - 1) as f64;
    let corner = self.min_corner();
    let lo = ((aabb.min - corner) / voxel).floor();
    let hi = ((aabb.max - corner) / voxel).ceil();
    let lo = lo.clamp(DVec3::ZERO, DVec3::splat(max));
    let hi = hi.clamp(DVec3::ZERO, DVec3::splat(max));
    (lo.as_uvec3(), hi.as_uvec3())
  }

  /// Morton codes of every node on `layer` in `coord_range(layer, aabb)`.
  pub fn codes_overlapping(&self, layer: u8, aabb: &Aabb) -> Vec<u64> {
    if !self.bounds().overlaps(aabb) {
      return Vec::new();
    }
    let (lo, hi) = self.coord_range(layer, aabb);
    let mut codes = Vec::with_capacity(((hi - lo + UVec3::ONE).element_product()) as usize);
    for x in lo.x..=hi.x {
      for y in lo.y..=hi.y {
        for z in lo.z..=hi.z {
          codes.push(morton::encode(x, y, z));
        }
      }
    }
    codes
  }
}

// =============================================================================
// GenerationParams
// =============================================================================

/// Everything one generation pass needs besides the collision oracle.
///
/// Immutable for the duration of a pass, freely mutable between passes.
#[derive(Clone, Debug)]
pub struct GenerationParams {
  /// Volume centre.
  pub origin: DVec3,
  /// Volume half-size. Voxel sizes derive from `extents.x`.
  pub extents: DVec3,
  /// Layer count is `voxel_power + 1`.
  pub voxel_power: u8,
  pub collision_channel: CollisionChannel,
  pub agent_radius: f64,
  /// Dynamic regions, force-materialized during generation.
  pub dynamic_regions: BTreeMap<RegionId, Aabb>,
  pub debug: DebugDrawFlags,
}

impl GenerationParams {
  pub fn new(origin: DVec3, extents: DVec3, voxel_power: u8) -> Self {
    Self {
      origin,
      extents,
      voxel_power,
      ..Default::default()
    }
  }

  #[inline]
  pub fn geometry(&self) -> OctreeGeometry {
    OctreeGeometry {
      origin: self.origin,
      extents: self.extents,
      voxel_power: self.voxel_power,
    }
  }

  #[inline]
  pub fn num_layers(&self) -> usize {
    self.voxel_power as usize + 1
  }

  /// Reject parameters generation cannot work with.
  pub fn validate(&self) -> NavResult<()> {
    if !(MIN_VOXEL_POWER..=MAX_VOXEL_POWER).contains(&self.voxel_power) {
      return Err(NavError::GenerationMisconfigured(format!(
        "voxel power {} outside {}..={}",
        self.voxel_power, MIN_VOXEL_POWER, MAX_VOXEL_POWER
      )));
    }
    if !self.extents.is_finite() || self.extents.min_element() <= 0.0 {
      return Err(NavError::GenerationMisconfigured(format!(
        "extents must be positive, got {}",
        self.extents
      )));
    }
    if !self.origin.is_finite() {
      return Err(NavError::GenerationMisconfigured("origin is not finite".into()));
    }
    Ok(())
  }

  // ---------------------------------------------------------------------------
  // Dynamic region registry
  // ---------------------------------------------------------------------------

  /// Insert or update a region. Returns true when the bounds changed.
  pub fn add_dynamic_region(&mut self, id: RegionId, bounds: Aabb) -> bool {
    match self.dynamic_regions.insert(id, bounds) {
      Some(previous) => !previous.approx_eq(&bounds, REGION_BOUNDS_TOLERANCE),
      None => true,
    }
  }

  pub fn remove_dynamic_region(&mut self, id: RegionId) -> Option<Aabb> {
    self.dynamic_regions.remove(&id)
  }

  pub fn dynamic_region(&self, id: RegionId) -> Option<&Aabb> {
    self.dynamic_regions.get(&id)
  }

  pub fn region_ids(&self) -> Vec<RegionId> {
    self.dynamic_regions.keys().copied().collect()
  }

  pub fn clear_dynamic_regions(&mut self) {
    self.dynamic_regions.clear();
  }

  /// Regions whose bounds contain `position`.
  pub fn regions_containing(&self, position: DVec3) -> impl Iterator<Item = RegionId> + '_ {
    self
      .dynamic_regions
      .iter()
      .filter(move |(_, bounds)| bounds.contains_point(position))
      .map(|(id, _)| *id)
  }
}

impl Default for GenerationParams {
  fn default() -> Self {
    Self {
      origin: DVec3::ZERO,
      extents: DVec3::splat(1000.0),
      voxel_power: 3,
      collision_channel: CollisionChannel::default(),
      agent_radius: 0.0,
      dynamic_regions: BTreeMap::new(),
      debug: DebugDrawFlags::NONE,
    }
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
