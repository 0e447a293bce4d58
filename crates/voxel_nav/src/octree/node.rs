//! Node - one materialized octree cell.
//!
//! Nodes live in per-layer arrays sorted by morton code. Layer 0 is the
//! finest layer; its nodes may own a [`LeafNode`](super::LeafNode) through
//! `first_child`.

use serde::{Deserialize, Serialize};

use super::Link;
use crate::constants::NUM_DIRECTIONS;

/// Octree node.
///
/// Above layer 0 a valid `first_child` addresses the first of 8 contiguous
/// children in the next finer layer. At layer 0 it addresses a leaf.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Node {
  /// Morton code of the node's grid coordinate at its own layer.
  pub code: u64,
  /// Parent in the next coarser layer.
  pub parent: Link,
  /// First child (layer > 0) or leaf (layer 0).
  pub first_child: Link,
  /// Face neighbours, ordered +X, -X, +Y, -Y, +Z, -Z.
  pub neighbours: [Link; NUM_DIRECTIONS],
}

impl Node {
  /// Create an unlinked node.
  pub fn new(code: u64) -> Self {
    Self {
      code,
      parent: Link::INVALID,
      first_child: Link::INVALID,
      neighbours: [Link::INVALID; NUM_DIRECTIONS],
    }
  }

  #[inline]
  pub fn has_children(&self) -> bool {
    self.first_child.is_valid()
  }

  /// Octant of this node within its parent.
  #[inline]
  pub fn octant(&self) -> u8 {
    (self.code & 7) as u8
  }

  /// Code of this node's parent one layer up.
  #[inline]
  pub fn parent_code(&self) -> u64 {
    self.code >> 3
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
