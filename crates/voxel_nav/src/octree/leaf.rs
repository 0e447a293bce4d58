//! LeafNode - 4×4×4 occupancy mask beneath a layer-0 node.

use serde::{Deserialize, Serialize};

/// Occupancy of the 64 sub-voxels of one layer-0 node. Bit set = blocked.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub struct LeafNode {
  pub mask: u64,
}

impl LeafNode {
  pub const EMPTY: LeafNode = LeafNode { mask: 0 };
  pub const FULL: LeafNode = LeafNode { mask: u64::MAX };

  #[inline]
  pub const fn from_mask(mask: u64) -> Self {
    Self { mask }
  }

  #[inline]
  pub fn is_blocked(&self, subnode: u8) -> bool {
    (self.mask >> subnode) & 1 != 0
  }

  #[inline]
  pub fn set_blocked(&mut self, subnode: u8) {
    self.mask |= 1 << subnode;
  }

  #[inline]
  pub fn clear(&mut self) {
    self.mask = 0;
  }

  #[inline]
  pub fn is_completely_blocked(&self) -> bool {
    self.mask == u64::MAX
  }

  /// No sub-voxel is blocked. Equivalent to no subdivision.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.mask == 0
  }

  #[inline]
  pub fn blocked_count(&self) -> u32 {
    self.mask.count_ones()
  }
}
