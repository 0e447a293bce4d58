//! OctreeStore - per-layer node arrays plus the flat leaf array.
//!
//! # Layout
//!
//! ```text
//! layers[P]   [root]                              single node, code 0
//! layers[P-1] [c0 c1 .. c7]                       sorted by morton code
//!   ...
//! layers[0]   [n0 n1 n2 ...]                      sorted by morton code
//! leaves      [l0 l1 l2 ...]                      leaves[i] belongs to layers[0][i]
//! ```
//!
//! Every layer is strictly ascending by code, so lookups are binary searches
//! and a parent's 8 children are contiguous.

use glam::{DVec3, IVec3};
use smallvec::SmallVec;

use super::{LeafNode, Link, Node, OctreeGeometry};
use crate::constants::{
  DIR_CHILD_OFFSETS, DIR_LEAF_CHILD_OFFSETS, DIR_OFFSETS, LEAF_SIDE, NUM_CHILDREN, NUM_DIRECTIONS,
};
use crate::error::{LinkFailureReason, NavError, NavResult};
use crate::morton;

/// Stack capacity for the neighbour expansion working set.
const WORKING_SET_CAPACITY: usize = 16;

/// Sparse voxel octree storage.
#[derive(Clone, Debug)]
pub struct OctreeStore {
  pub(crate) geometry: OctreeGeometry,
  pub(crate) layers: Vec<Vec<Node>>,
  pub(crate) leaves: Vec<LeafNode>,
}

/// Size summary for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
  pub layers: usize,
  pub nodes: usize,
  pub leaves: usize,
  pub blocked_leaves: usize,
  pub memory_bytes: usize,
}

impl OctreeStore {
  /// Empty store for `geometry`.
  pub fn new(geometry: OctreeGeometry) -> Self {
    Self {
      geometry,
      layers: Vec::new(),
      leaves: Vec::new(),
    }
  }

  /// Assemble a store from raw arrays (loading, tests).
  pub fn from_parts(geometry: OctreeGeometry, layers: Vec<Vec<Node>>, leaves: Vec<LeafNode>) -> Self {
    Self {
      geometry,
      layers,
      leaves,
    }
  }

  #[inline]
  pub fn geometry(&self) -> &OctreeGeometry {
    &self.geometry
  }

  #[inline]
  pub fn num_layers(&self) -> usize {
    self.layers.len()
  }

  /// True until generation has produced at least the root.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.layers.last().map_or(true, |root| root.is_empty())
  }

  #[inline]
  pub fn layer(&self, layer: u8) -> &[Node] {
    self.layers.get(layer as usize).map_or(&[], |l| l.as_slice())
  }

  #[inline]
  pub fn leaves(&self) -> &[LeafNode] {
    &self.leaves
  }

  #[inline]
  pub fn voxel_size(&self, layer: u8) -> f64 {
    self.geometry.voxel_size(layer)
  }

  #[inline]
  pub fn node_position(&self, layer: u8, code: u64) -> DVec3 {
    self.geometry.node_position(layer, code)
  }

  // ===========================================================================
  // Lookups
  // ===========================================================================

  #[inline]
  pub fn get_node(&self, link: Link) -> Option<&Node> {
    if !link.is_valid() {
      return None;
    }
    self.layers.get(link.layer() as usize)?.get(link.node_index())
  }

  #[inline]
  pub fn get_leaf(&self, index: usize) -> Option<&LeafNode> {
    self.leaves.get(index)
  }

  /// Leaf owned by the node `link` addresses, if it is a subdivided layer-0 node.
  #[inline]
  pub fn leaf_for(&self, link: Link) -> Option<&LeafNode> {
    if link.layer() != 0 {
      return None;
    }
    let node = self.get_node(link)?;
    if !node.has_children() {
      return None;
    }
    self.get_leaf(node.first_child.node_index())
  }

  /// Index of the node with `code` on `layer`.
  #[inline]
  pub fn index_for_code(&self, layer: u8, code: u64) -> Option<usize> {
    self.layer(layer).binary_search_by_key(&code, |n| n.code).ok()
  }

  /// World position of a link: the node centre, or the sub-voxel centre for
  /// layer-0 nodes that own a leaf.
  pub fn link_position(&self, link: Link) -> Option<DVec3> {
    let node = self.get_node(link)?;
    let mut position = self.node_position(link.layer(), node.code);
    if link.layer() == 0 && node.has_children() {
      let voxel = self.voxel_size(0);
      let sub = morton::decode(link.subnode() as u64).as_dvec3();
      position += sub * voxel * 0.25 - DVec3::splat(voxel * 0.375);
    }
    Some(position)
  }

  /// Whether a link addresses free space.
  pub fn is_link_free(&self, link: Link) -> bool {
    match self.leaf_for(link) {
      Some(leaf) => !leaf.is_blocked(link.subnode()),
      None => self.get_node(link).is_some(),
    }
  }

  // ===========================================================================
  // Neighbour enumeration
  // ===========================================================================

  /// Navigable neighbours of a node.
  ///
  /// Each stored face link is expanded down to the finest materialized
  /// nodes along the face touching `link`: childless nodes are returned
  /// as-is, subdivided layer-0 nodes yield their unblocked face sub-voxels.
  pub fn get_neighbours(&self, link: Link, neighbours: &mut Vec<Link>) {
    let Some(node) = self.get_node(link) else {
      return;
    };
    let mut working_set: SmallVec<[Link; WORKING_SET_CAPACITY]> = SmallVec::new();

    for (dir, &neighbour_link) in node.neighbours.iter().enumerate() {
      let Some(neighbour) = self.get_node(neighbour_link) else {
        continue;
      };
      if !neighbour.has_children() {
        neighbours.push(neighbour_link);
        continue;
      }

      working_set.clear();
      working_set.push(neighbour_link);

      while let Some(this_link) = working_set.pop() {
        let Some(this_node) = self.get_node(this_link) else {
          continue;
        };
        if !this_node.has_children() {
          neighbours.push(this_link);
          continue;
        }

        if this_link.layer() > 0 {
          for &octant in &DIR_CHILD_OFFSETS[dir] {
            let child_link = this_node.first_child.offset(octant as u32);
            match self.get_node(child_link) {
              Some(child) if child.has_children() => working_set.push(child_link),
              Some(_) => neighbours.push(child_link),
              None => {}
            }
          }
        } else if let Some(leaf) = self.get_leaf(this_node.first_child.node_index()) {
          for &sub in &DIR_LEAF_CHILD_OFFSETS[dir] {
            if !leaf.is_blocked(sub) {
              neighbours.push(this_link.with_subnode(sub));
            }
          }
        }
      }
    }
  }

  /// Sub-voxel neighbours of a leaf link.
  ///
  /// Inside the leaf the occupancy mask decides. Crossing the leaf boundary
  /// re-enters the neighbouring layer-0 leaf at the mirrored coordinate
  /// (0↔3 on the crossed axis), or yields the neighbour node itself when it
  /// is not subdivided.
  pub fn get_leaf_neighbours(&self, link: Link, neighbours: &mut Vec<Link>) {
    let Some(node) = self.get_node(link) else {
      return;
    };
    let Some(leaf) = self.leaf_for(link) else {
      return;
    };
    let coord = morton::decode(link.subnode() as u64).as_ivec3();

    for dir in 0..NUM_DIRECTIONS {
      let target = coord + DIR_OFFSETS[dir];

      if in_leaf(target) {
        let sub = leaf_index(target);
        if !leaf.is_blocked(sub) {
          neighbours.push(link.with_subnode(sub));
        }
        continue;
      }

      let neighbour_link = node.neighbours[dir];
      let Some(neighbour) = self.get_node(neighbour_link) else {
        continue;
      };
      if !neighbour.has_children() || neighbour_link.layer() > 0 {
        neighbours.push(neighbour_link);
        continue;
      }
      let Some(neighbour_leaf) = self.get_leaf(neighbour.first_child.node_index()) else {
        continue;
      };
      if neighbour_leaf.is_completely_blocked() {
        continue;
      }

      let wrapped = target.rem_euclid(IVec3::splat(LEAF_SIDE));
      let sub = leaf_index(wrapped);
      if !neighbour_leaf.is_blocked(sub) {
        neighbours.push(neighbour_link.with_subnode(sub));
      }
    }
  }

  // ===========================================================================
  // Position resolution
  // ===========================================================================

  /// Resolve a world position to the finest link containing it.
  ///
  /// Descends from the root, following `first_child` until a childless node
  /// or a leaf sub-voxel is reached. Fails when the position is outside the
  /// volume or inside a blocked sub-voxel.
  pub fn link_from_position(&self, position: DVec3) -> NavResult<Link> {
    let fail = |reason| NavError::LinkResolutionFailure { position, reason };

    if !self.geometry.bounds().contains_point(position) {
      return Err(fail(LinkFailureReason::OutsideVolume));
    }
    if self.is_empty() {
      return Err(fail(LinkFailureReason::NoData));
    }

    let mut layer = self.geometry.root_layer();
    let mut index = 0usize;

    loop {
      let link = Link::node(layer, index as u32);
      let node = self
        .get_node(link)
        .ok_or_else(|| fail(LinkFailureReason::Unresolved))?;

      if !node.has_children() {
        return Ok(link);
      }

      if layer == 0 {
        let leaf = self
          .get_leaf(node.first_child.node_index())
          .ok_or_else(|| fail(LinkFailureReason::Unresolved))?;
        let voxel = self.voxel_size(0);
        let node_origin = self.node_position(0, node.code) - DVec3::splat(voxel * 0.5);
        let local = ((position - node_origin) / (voxel * 0.25))
          .floor()
          .clamp(DVec3::ZERO, DVec3::splat((LEAF_SIDE - 1) as f64))
          .as_ivec3();
        let sub = leaf_index(local);
        if leaf.is_blocked(sub) {
          return Err(fail(LinkFailureReason::Blocked));
        }
        return Ok(link.with_subnode(sub));
      }

      let child_layer = layer - 1;
      let code = morton::encode_vec(self.geometry.coord_at(child_layer, position));
      let first = node.first_child.node_index();
      let children = self
        .layer(child_layer)
        .get(first..first + NUM_CHILDREN)
        .ok_or_else(|| fail(LinkFailureReason::Unresolved))?;
      let offset = children
        .iter()
        .position(|child| child.code == code)
        .ok_or_else(|| fail(LinkFailureReason::Unresolved))?;

      layer = child_layer;
      index = first + offset;
    }
  }

  /// Whether `position` resolves to free space.
  pub fn is_position_navigable(&self, position: DVec3) -> bool {
    self.link_from_position(position).is_ok()
  }

  // ===========================================================================
  // Statistics
  // ===========================================================================

  pub fn node_count(&self) -> usize {
    self.layers.iter().map(Vec::len).sum()
  }

  pub fn leaf_count(&self) -> usize {
    self.leaves.len()
  }

  pub fn memory_bytes(&self) -> usize {
    self.node_count() * std::mem::size_of::<Node>() + self.leaf_count() * std::mem::size_of::<LeafNode>()
  }

  pub fn stats(&self) -> StoreStats {
    StoreStats {
      layers: self.num_layers(),
      nodes: self.node_count(),
      leaves: self.leaf_count(),
      blocked_leaves: self.leaves.iter().filter(|l| !l.is_empty()).count(),
      memory_bytes: self.memory_bytes(),
    }
  }
}

#[inline]
fn in_leaf(c: IVec3) -> bool {
  c.cmpge(IVec3::ZERO).all() && c.cmplt(IVec3::splat(LEAF_SIDE)).all()
}

/// Sub-voxel index of an in-leaf coordinate.
#[inline]
pub(crate) fn leaf_index(c: IVec3) -> u8 {
  morton::encode_vec(c.as_uvec3()) as u8
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
