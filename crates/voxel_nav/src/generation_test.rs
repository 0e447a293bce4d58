use glam::DVec3;

use super::*;
use crate::collision::{BoxObstacles, OpenSpace};
use crate::debug_draw::NoDebugDraw;
use crate::error::NavError;
use crate::octree::Aabb;
use crate::test_utils::*;
use crate::types::RegionId;

fn solid_cube() -> BoxObstacles {
  BoxObstacles::new(vec![Aabb::new(DVec3::splat(-100.0), DVec3::splat(100.0))])
}

/// Index of the layer-0 node containing `position`, if materialized.
fn layer0_index(store: &OctreeStore, position: DVec3) -> Option<usize> {
  let code = morton::encode_vec(store.geometry().coord_at(0, position));
  store.index_for_code(0, code)
}

// =========================================================================
// Structure
// =========================================================================

/// Every layer is strictly ascending by code (binary search relies on it).
#[test]
fn test_layers_strictly_ascending() {
  for oracle in [split_wall(), gapped_walls(), scattered_obstacles()] {
    let store = build_store(&standard_params(), &oracle);
    for layer in 0..store.num_layers() as u8 {
      let nodes = store.layer(layer);
      for pair in nodes.windows(2) {
        assert!(
          pair[0].code < pair[1].code,
          "layer {} not strictly ascending: {} then {}",
          layer,
          pair[0].code,
          pair[1].code
        );
      }
    }
  }
}

/// Nodes above layer 0 with children own exactly 8 contiguous children whose
/// parent links point back.
#[test]
fn test_children_point_back_to_parent() {
  let store = build_store(&standard_params(), &gapped_walls());
  let mut checked = 0;
  for layer in 1..store.num_layers() as u8 {
    for (index, node) in store.layer(layer).iter().enumerate() {
      if !node.has_children() {
        continue;
      }
      assert_eq!(node.first_child.layer(), layer - 1);
      let first = node.first_child.node_index();
      let children = &store.layer(layer - 1)[first..first + 8];
      for (octant, child) in children.iter().enumerate() {
        assert_eq!(child.code, (node.code << 3) | octant as u64, "children are contiguous by octant");
        assert_eq!(child.parent, Link::node(layer, index as u32), "child parent must resolve back");
      }
      checked += 1;
    }
  }
  assert!(checked > 0, "fixture should produce subdivided nodes");
}

/// The root is always materialized at layer P with code 0.
#[test]
fn test_root_is_single_node() {
  let params = standard_params();
  let store = build_store(&params, &split_wall());
  assert_eq!(store.num_layers(), params.num_layers());
  let root = store.layer(params.voxel_power);
  assert_eq!(root.len(), 1);
  assert_eq!(root[0].code, 0);
  assert!(!root[0].parent.is_valid());
  assert!(root[0].has_children());
}

/// Open space without regions collapses to the root alone.
#[test]
fn test_open_space_generates_root_only() {
  let store = build_store(&standard_params(), &OpenSpace);
  assert_eq!(store.node_count(), 1);
  assert_eq!(store.leaf_count(), 0);
  let link = store.link_from_position(DVec3::new(123.0, -40.0, 7.0)).expect("root resolves");
  assert_eq!(link, Link::node(4, 0));
}

/// Leaf i belongs to layer-0 node i and first_child is valid iff the mask is non-zero.
#[test]
fn test_leaf_index_matches_node_index() {
  let store = build_store(&standard_params(), &gapped_walls());
  assert_eq!(store.leaf_count(), store.layer(0).len());
  let mut subdivided = 0;
  for (index, node) in store.layer(0).iter().enumerate() {
    let leaf = store.leaves()[index];
    assert_eq!(node.has_children(), !leaf.is_empty(), "node {}", index);
    if node.has_children() {
      assert_eq!(node.first_child, Link::node(0, index as u32));
      subdivided += 1;
    }
  }
  assert!(subdivided > 0);
}

/// Whole-leaf fast reject: clear leaves cost one query, not 65.
#[test]
fn test_fast_reject_skips_sub_voxel_queries() {
  let mut params = standard_params();
  params.add_dynamic_region(RegionId::new(), Aabb::new(DVec3::splat(-60.0), DVec3::splat(60.0)));
  let oracle = CountingOracle::new(OpenSpace);
  let store = generate(&params, &oracle, &NoDebugDraw).expect("generation");

  let layer1_queries = params.geometry().nodes_in_layer(1) as usize;
  assert!(!store.layer(0).is_empty(), "dynamic region forces layer-0 nodes");
  assert_eq!(oracle.count(), layer1_queries + store.layer(0).len());
  assert!(store.leaves().iter().all(|l| l.is_empty()));
}

/// Dynamic regions materialize every overlapping layer-0 node even when clear.
#[test]
fn test_dynamic_region_forces_layer_zero() {
  let mut params = standard_params();
  let region = Aabb::new(DVec3::splat(-200.0), DVec3::splat(200.0));
  params.add_dynamic_region(RegionId::new(), region);
  let store = build_store(&params, &OpenSpace);

  for code in params.geometry().codes_overlapping(0, &region) {
    assert!(store.index_for_code(0, code).is_some(), "code {} inside the region must exist", code);
  }
}

#[test]
fn test_invalid_params_rejected() {
  let mut params = standard_params();
  params.voxel_power = 0;
  let result = generate(&params, &OpenSpace, &NoDebugDraw);
  assert!(matches!(result, Err(NavError::GenerationMisconfigured(_))));
}

// =========================================================================
// Neighbour links
// =========================================================================

/// Links on the volume boundary pointing outward are invalid.
#[test]
fn test_boundary_links_are_invalid() {
  let store = build_store(&standard_params(), &split_wall());
  let side = store.geometry().nodes_per_side(0);
  for node in store.layer(0) {
    let c = morton::decode(node.code);
    if c.x == side - 1 {
      assert!(!node.neighbours[0].is_valid(), "+X link leaves the volume");
    }
    if c.x == 0 {
      assert!(!node.neighbours[1].is_valid(), "-X link leaves the volume");
    }
  }
}

/// Neighbour links address nodes that are adjacent along the direction and
/// never finer than the linking node.
#[test]
fn test_neighbour_links_are_adjacent() {
  let store = build_store(&standard_params(), &gapped_walls());
  for layer in 0..store.num_layers() as u8 {
    let voxel = store.voxel_size(layer);
    for node in store.layer(layer) {
      let centre = store.node_position(layer, node.code);
      for (dir, &link) in node.neighbours.iter().enumerate() {
        let Some(other) = store.get_node(link) else {
          continue;
        };
        assert!(link.layer() >= layer, "neighbour is never finer than the node");
        let other_centre = store.node_position(link.layer(), other.code);
        let along = (other_centre - centre).dot(DIR_OFFSETS[dir].as_dvec3());
        let expected = (voxel + store.voxel_size(link.layer())) * 0.5;
        assert!((along - expected).abs() < 1e-6, "dir {}: {} vs {}", dir, along, expected);
      }
    }
  }
}

/// Completely blocked leaves outside dynamic regions are never linked to.
#[test]
fn test_fully_blocked_static_leaf_is_unlinked() {
  let store = build_store(&standard_params(), &solid_cube());
  let full = layer0_index(&store, DVec3::splat(31.0)).expect("node inside the cube");
  assert!(store.leaves()[full].is_completely_blocked());

  let target = Link::node(0, full as u32);
  for node in store.layer(0) {
    assert!(!node.neighbours.contains(&target), "fully blocked static leaf must not be linked");
  }
}

/// Inside a dynamic region fully blocked leaves stay linked.
#[test]
fn test_fully_blocked_dynamic_leaf_stays_linked() {
  let mut params = standard_params();
  params.add_dynamic_region(RegionId::new(), Aabb::new(DVec3::splat(-150.0), DVec3::splat(150.0)));
  let store = build_store(&params, &solid_cube());
  let full = layer0_index(&store, DVec3::splat(31.0)).expect("node inside the cube");
  assert!(store.leaves()[full].is_completely_blocked());

  let target = Link::node(0, full as u32);
  let linked = store.layer(0).iter().filter(|n| n.neighbours.contains(&target)).count();
  assert_eq!(linked, 6, "all six face neighbours keep their link");
}
