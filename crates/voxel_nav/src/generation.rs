//! Sparse octree generation.
//!
//! # Phases
//!
//! ```text
//! 1. first pass      query the oracle once per layer-1 voxel (parallel),
//!                    force every layer-1 voxel touching a dynamic region,
//!                    then shift codes >> 3 per layer up to the root
//! 2. layer 0         the 8 children of every needed layer-1 voxel, each
//!                    with a rasterized 4×4×4 leaf (parallel)
//! 3. layers 1..=P    the 8 children of every needed parent, root at P;
//!                    first_child/parent wired for all 8 children at once
//! 4. neighbours      top-down, 6 face links per node; missing neighbours
//!                    resolve through the parent chain
//! ```
//!
//! Only nodes with a blocked (or dynamic) descendant are ever materialized,
//! plus their siblings.

use glam::IVec3;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};
use web_time::Instant;

use crate::collision::CollisionOracle;
use crate::constants::{DIR_OFFSETS, NUM_CHILDREN, NUM_DIRECTIONS};
use crate::debug_draw::DebugDrawSink;
use crate::error::NavResult;
use crate::morton;
use crate::octree::{GenerationParams, LeafNode, Link, Node, OctreeStore};
use crate::region::rasterize_leaf;
use crate::types::{layer_color, Color};

/// Build a navigation octree for `params` using `oracle`.
#[cfg_attr(feature = "profiling", tracing::instrument(skip_all, name = "generation::generate"))]
pub fn generate(
  params: &GenerationParams,
  oracle: &dyn CollisionOracle,
  debug_sink: &dyn DebugDrawSink,
) -> NavResult<OctreeStore> {
  params.validate()?;
  let start = Instant::now();
  let geometry = params.geometry();
  let root = geometry.root_layer();

  // Phase 1: coarse blocking pass
  let NeededSets { needed, dynamic_codes } = {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("first_pass").entered();
    first_pass(params, oracle)
  };
  debug!(
    blocked_layer1 = needed[1].len(),
    dynamic_layer1 = dynamic_codes.len(),
    "first pass complete"
  );

  let mut layers: Vec<Vec<Node>> = vec![Vec::new(); geometry.num_layers()];

  // Phase 2: layer 0 and leaves
  let leaves = {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("rasterize_leaves").entered();
    rasterize_layer_zero(params, &needed[1], oracle, &mut layers[0])
  };

  // Phase 3: coarser layers, bottom-up
  {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("build_layers").entered();
    for layer in 1..=root {
      build_layer(layer, root, &needed, &mut layers);
    }
  }

  let mut store = OctreeStore::from_parts(geometry, layers, leaves);

  // Phase 4: neighbour links, top-down
  {
    #[cfg(feature = "profiling")]
    let _span = tracing::info_span!("neighbour_links").entered();
    for layer in (0..root).rev() {
      link_layer_neighbours(&mut store, layer, &dynamic_codes);
    }
  }

  if params.debug.any() {
    draw_generation_debug(&store, params, debug_sink);
  }

  let stats = store.stats();
  info!(
    layers = stats.layers,
    nodes = stats.nodes,
    leaves = stats.leaves,
    blocked_leaves = stats.blocked_leaves,
    bytes = stats.memory_bytes,
    elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
    "navigation octree generated"
  );

  Ok(store)
}

// =============================================================================
// Phase 1: first pass
// =============================================================================

struct NeededSets {
  /// `needed[L]` holds the codes on layer L with a blocked or dynamic
  /// descendant. Index 0 is unused.
  needed: Vec<FxHashSet<u64>>,
  /// Layer-1 codes forced by dynamic regions.
  dynamic_codes: FxHashSet<u64>,
}

fn first_pass(params: &GenerationParams, oracle: &dyn CollisionOracle) -> NeededSets {
  let geometry = params.geometry();
  let root = geometry.root_layer() as usize;
  let half_size = geometry.voxel_size(1) * 0.5;

  let blocked: Vec<u64> = (0..geometry.nodes_in_layer(1))
    .into_par_iter()
    .filter(|&code| {
      oracle.is_blocked(
        geometry.node_position(1, code),
        half_size,
        params.collision_channel,
        params.agent_radius,
      )
    })
    .collect();

  let mut dynamic_codes = FxHashSet::default();
  for bounds in params.dynamic_regions.values() {
    dynamic_codes.extend(geometry.codes_overlapping(1, bounds));
  }

  let mut needed = vec![FxHashSet::default(); root + 1];
  needed[1].extend(blocked);
  needed[1].extend(dynamic_codes.iter().copied());

  for layer in 1..root {
    let parents: FxHashSet<u64> = needed[layer].iter().map(|code| code >> 3).collect();
    needed[layer + 1] = parents;
  }

  NeededSets { needed, dynamic_codes }
}

/// Sorted codes of the 8 children of every code in `parents`.
fn children_of(parents: &FxHashSet<u64>) -> Vec<Node> {
  let mut sorted: Vec<u64> = parents.iter().copied().collect();
  sorted.sort_unstable();
  sorted
    .into_iter()
    .flat_map(|parent| (0..NUM_CHILDREN as u64).map(move |octant| Node::new((parent << 3) | octant)))
    .collect()
}

// =============================================================================
// Phase 2: layer 0
// =============================================================================

/// Allocate layer 0 and its leaves. Leaf `i` belongs to node `i`.
fn rasterize_layer_zero(
  params: &GenerationParams,
  needed_layer1: &FxHashSet<u64>,
  oracle: &dyn CollisionOracle,
  layer_zero: &mut Vec<Node>,
) -> Vec<LeafNode> {
  *layer_zero = children_of(needed_layer1);

  let leaves: Vec<LeafNode> = layer_zero
    .par_iter()
    .map(|node| rasterize_leaf(params, node.code, oracle))
    .collect();

  for (index, (node, leaf)) in layer_zero.iter_mut().zip(&leaves).enumerate() {
    if !leaf.is_empty() {
      node.first_child = Link::node(0, index as u32);
    }
  }

  leaves
}

// =============================================================================
// Phase 3: layers 1..=P
// =============================================================================

fn build_layer(layer: u8, root: u8, needed: &[FxHashSet<u64>], layers: &mut [Vec<Node>]) {
  let nodes = if layer == root {
    vec![Node::new(0)]
  } else {
    children_of(&needed[layer as usize + 1])
  };

  let (lower, upper) = layers.split_at_mut(layer as usize);
  let (Some(children), Some(current)) = (lower.last_mut(), upper.first_mut()) else {
    return;
  };
  *current = nodes;

  for (index, node) in current.iter_mut().enumerate() {
    let Ok(first) = children.binary_search_by_key(&(node.code << 3), |child| child.code) else {
      continue;
    };
    match children.get_mut(first..first + NUM_CHILDREN) {
      Some(group) => {
        node.first_child = Link::node(layer - 1, first as u32);
        for child in group {
          child.parent = Link::node(layer, index as u32);
        }
      }
      None => warn!(layer, code = node.code, "incomplete child group, node left unsubdivided"),
    }
  }
}

// =============================================================================
// Phase 4: neighbour links
// =============================================================================

fn link_layer_neighbours(store: &mut OctreeStore, layer: u8, dynamic_codes: &FxHashSet<u64>) {
  let count = store.layer(layer).len();
  let links: Vec<[Link; NUM_DIRECTIONS]> = (0..count)
    .into_par_iter()
    .map(|index| {
      let mut links = [Link::INVALID; NUM_DIRECTIONS];
      for (dir, link) in links.iter_mut().enumerate() {
        *link = resolve_neighbour(store, layer, index, dir, dynamic_codes);
      }
      links
    })
    .collect();

  if let Some(nodes) = store.layers.get_mut(layer as usize) {
    for (node, links) in nodes.iter_mut().zip(links) {
      node.neighbours = links;
    }
  }
}

/// Neighbour of node `index` in direction `dir`, climbing the parent chain
/// until a node exists on the other side.
fn resolve_neighbour(
  store: &OctreeStore,
  layer: u8,
  index: usize,
  dir: usize,
  dynamic_codes: &FxHashSet<u64>,
) -> Link {
  let mut layer = layer;
  let mut index = index;
  loop {
    if let Some(link) = find_link_in_direction(store, layer, index, dir, dynamic_codes) {
      return link;
    }
    let Some(node) = store.layer(layer).get(index) else {
      return Link::INVALID;
    };
    if !node.parent.is_valid() {
      return Link::INVALID;
    }
    layer = node.parent.layer();
    index = node.parent.node_index();
  }
}

/// Same-layer neighbour lookup.
///
/// - `Some(INVALID)`: outside the volume, or a fully blocked static leaf
/// - `Some(link)`: exact code match on this layer
/// - `None`: not materialized on this layer, caller should ascend
fn find_link_in_direction(
  store: &OctreeStore,
  layer: u8,
  index: usize,
  dir: usize,
  dynamic_codes: &FxHashSet<u64>,
) -> Option<Link> {
  let nodes = store.layer(layer);
  let node = nodes.get(index)?;
  let side = store.geometry().nodes_per_side(layer) as i32;

  let target = morton::decode(node.code).as_ivec3() + DIR_OFFSETS[dir];
  if target.cmplt(IVec3::ZERO).any() || target.cmpge(IVec3::splat(side)).any() {
    return Some(Link::INVALID);
  }
  let target_code = morton::encode_vec(target.as_uvec3());

  // Layers are sorted, so search only on the side the code lies.
  let found = if target_code > node.code {
    nodes[index + 1..]
      .binary_search_by_key(&target_code, |n| n.code)
      .ok()
      .map(|offset| index + 1 + offset)
  } else {
    nodes[..index].binary_search_by_key(&target_code, |n| n.code).ok()
  }?;

  if layer == 0 {
    let neighbour = &nodes[found];
    let fully_blocked = neighbour.has_children()
      && store
        .get_leaf(neighbour.first_child.node_index())
        .is_some_and(LeafNode::is_completely_blocked);
    // Dynamic leaves stay linked so regeneration can open them later.
    if fully_blocked && !dynamic_codes.contains(&neighbour.parent_code()) {
      return Some(Link::INVALID);
    }
  }

  Some(Link::node(layer, found as u32))
}

// =============================================================================
// Debug drawing
// =============================================================================

fn draw_generation_debug(store: &OctreeStore, params: &GenerationParams, sink: &dyn DebugDrawSink) {
  let flags = &params.debug;

  for layer in 0..store.num_layers() as u8 {
    let voxel = store.voxel_size(layer);
    for (index, node) in store.layer(layer).iter().enumerate() {
      let position = store.node_position(layer, node.code);
      if !flags.in_range(position) {
        continue;
      }
      let color = layer_color(layer as usize);

      if flags.show_voxels && (layer > 0 || node.has_children()) {
        sink.draw_box(position, voxel * 0.5, color);
      }
      if flags.show_morton_codes {
        sink.draw_string(position, &format!("{}:{}", layer, index), color);
      }
      if flags.show_neighbour_links {
        for (dir, &neighbour) in node.neighbours.iter().enumerate() {
          match store.get_node(neighbour) {
            Some(other) => sink.draw_line(position, store.node_position(neighbour.layer(), other.code), color, 0.0),
            None => {
              let end = position + DIR_OFFSETS[dir].as_dvec3() * voxel * 0.5;
              sink.draw_line(position, end, Color::RED, 0.0);
            }
          }
        }
      }
      if flags.show_parent_child_links && node.parent.is_valid() {
        if let Some(parent_position) = store.link_position(node.parent) {
          sink.draw_arrow(position, parent_position, Color::ORANGE, 0.0);
        }
      }
    }
  }

  if flags.show_leaf_voxels {
    let sub_half = store.voxel_size(0) * 0.125;
    for index in 0..store.layer(0).len() {
      let Some(leaf) = store.leaf_for(Link::node(0, index as u32)) else {
        continue;
      };
      for sub in 0..64u8 {
        if !leaf.is_blocked(sub) {
          continue;
        }
        if let Some(position) = store.link_position(Link::new(0, index as u32, sub)) {
          if flags.in_range(position) {
            sink.draw_box(position, sub_half, Color::RED);
          }
        }
      }
    }
  }
}

#[cfg(test)]
#[path = "generation_test.rs"]
mod generation_test;
