//! Link - index-based address of an octree node or leaf sub-voxel.

use serde::{Deserialize, Serialize};

/// Layer value reserved for the invalid link.
const INVALID_LAYER: u8 = u8::MAX;

/// Address of a node (layer, node index) and, for layer-0 nodes that own a
/// leaf, one of its 64 sub-voxels.
///
/// Links never point into memory; they are re-resolved against the
/// [`OctreeStore`](super::OctreeStore) on every access and are only
/// meaningful for the store generation that produced them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
  layer: u8,
  subnode: u8,
  node: u32,
}

impl Link {
  /// The invalid link.
  pub const INVALID: Link = Link {
    layer: INVALID_LAYER,
    subnode: 0,
    node: u32::MAX,
  };

  /// Create a link to `node` on `layer`, addressing sub-voxel `subnode`.
  #[inline]
  pub const fn new(layer: u8, node: u32, subnode: u8) -> Self {
    Self { layer, subnode, node }
  }

  /// Link to a node without a sub-voxel.
  #[inline]
  pub const fn node(layer: u8, node: u32) -> Self {
    Self::new(layer, node, 0)
  }

  #[inline]
  pub const fn is_valid(&self) -> bool {
    self.layer != INVALID_LAYER
  }

  #[inline]
  pub const fn layer(&self) -> u8 {
    self.layer
  }

  #[inline]
  pub const fn node_index(&self) -> usize {
    self.node as usize
  }

  #[inline]
  pub const fn subnode(&self) -> u8 {
    self.subnode
  }

  /// Same node, different sub-voxel.
  #[inline]
  pub const fn with_subnode(self, subnode: u8) -> Self {
    Self { subnode, ..self }
  }

  /// Same layer and sub-voxel, node index shifted by `offset`.
  #[inline]
  pub const fn offset(self, offset: u32) -> Self {
    Self {
      node: self.node + offset,
      ..self
    }
  }
}

impl Default for Link {
  fn default() -> Self {
    Self::INVALID
  }
}

impl std::fmt::Display for Link {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if self.is_valid() {
      write!(f, "{}:{}:{}", self.layer, self.node, self.subnode)
    } else {
      f.write_str("invalid")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_invalid() {
    assert!(!Link::default().is_valid());
    assert_eq!(Link::default(), Link::INVALID);
  }

  #[test]
  fn test_accessors() {
    let link = Link::new(2, 17, 5);
    assert!(link.is_valid());
    assert_eq!(link.layer(), 2);
    assert_eq!(link.node_index(), 17);
    assert_eq!(link.subnode(), 5);
    assert_eq!(link.with_subnode(9).subnode(), 9);
    assert_eq!(link.offset(3).node_index(), 20);
    assert_eq!(link.to_string(), "2:17:5");
  }
}
