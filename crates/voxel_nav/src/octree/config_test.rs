use super::*;

fn geometry() -> OctreeGeometry {
  GenerationParams::new(DVec3::ZERO, DVec3::splat(500.0), 4).geometry()
}

// =========================================================================
// Coordinate math
// =========================================================================

/// extents 500, P=4: voxel0 = 500 / 16 * 2 = 62.5
#[test]
fn test_voxel_size_per_layer() {
  let g = geometry();
  assert_eq!(g.voxel_size(0), 62.5);
  assert_eq!(g.voxel_size(1), 125.0);
  assert_eq!(g.voxel_size(4), 1000.0, "root spans the whole volume");
}

/// Layer L holds 2^(P-L) nodes per side.
#[test]
fn test_nodes_per_side() {
  let g = geometry();
  assert_eq!(g.nodes_per_side(0), 16);
  assert_eq!(g.nodes_per_side(1), 8);
  assert_eq!(g.nodes_per_side(4), 1);
  assert_eq!(g.nodes_in_layer(1), 512);
}

/// The root centre is the volume origin.
#[test]
fn test_root_position_is_origin() {
  let g = geometry();
  assert_eq!(g.node_position(4, 0), DVec3::ZERO);
}

/// Node (0,0,0) on layer 0 sits half a voxel inside the min corner.
#[test]
fn test_first_node_position() {
  let g = geometry();
  assert_eq!(g.node_position(0, 0), DVec3::splat(-500.0 + 31.25));
  let last = morton::encode(15, 15, 15);
  assert_eq!(g.node_position(0, last), DVec3::splat(500.0 - 31.25));
}

/// coord_at clamps positions on and past the max boundary.
#[test]
fn test_coord_at_clamps() {
  let g = geometry();
  assert_eq!(g.coord_at(0, DVec3::splat(500.0)), UVec3::splat(15));
  assert_eq!(g.coord_at(0, DVec3::splat(-900.0)), UVec3::ZERO);
  assert_eq!(g.coord_at(1, DVec3::ZERO), UVec3::splat(4));
}

/// Region ranges use floor/ceil so boundary-touching nodes are included.
#[test]
fn test_coord_range_floor_ceil() {
  let g = geometry();
  let aabb = Aabb::new(DVec3::splat(-10.0), DVec3::splat(10.0));
  let (lo, hi) = g.coord_range(1, &aabb);
  assert_eq!(lo, UVec3::splat(3));
  assert_eq!(hi, UVec3::splat(5));
  assert_eq!(g.codes_overlapping(1, &aabb).len(), 27);
}

#[test]
fn test_codes_overlapping_outside_volume_is_empty() {
  let g = geometry();
  let far = Aabb::new(DVec3::splat(2000.0), DVec3::splat(3000.0));
  assert!(g.codes_overlapping(0, &far).is_empty());
}

// =========================================================================
// Validation and region registry
// =========================================================================

#[test]
fn test_validate_rejects_bad_power() {
  let mut params = GenerationParams::default();
  params.voxel_power = 0;
  assert!(matches!(params.validate(), Err(NavError::GenerationMisconfigured(_))));
  params.voxel_power = 3;
  params.extents = DVec3::new(100.0, 0.0, 100.0);
  assert!(params.validate().is_err());
}

/// Updating a region reports a change only beyond the tolerance.
#[test]
fn test_add_dynamic_region_reports_changes() {
  let mut params = GenerationParams::default();
  let id = RegionId::new();
  let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));

  assert!(params.add_dynamic_region(id, bounds), "insert is a change");
  let nudged = Aabb::new(DVec3::splat(0.0001), DVec3::splat(10.0));
  assert!(!params.add_dynamic_region(id, nudged), "sub-tolerance move is not a change");
  let moved = Aabb::new(DVec3::splat(1.0), DVec3::splat(10.0));
  assert!(params.add_dynamic_region(id, moved));

  assert_eq!(params.region_ids(), vec![id]);
  assert_eq!(params.regions_containing(DVec3::splat(5.0)).count(), 1);
  assert!(params.remove_dynamic_region(id).is_some());
  assert!(params.dynamic_region(id).is_none());
}
