//! Octree layout constants and direction tables.
//!
//! # Coordinate System
//!
//! ```text
//!         +Y
//!          │
//!          │
//!          │
//!          └───────── +X
//!         /
//!        /
//!       +Z
//!
//! Child octant indices (binary: ZYX), same bit layout as morton codes:
//!   0 = (0,0,0)    4 = (0,0,1)
//!   1 = (1,0,0)    5 = (1,0,1)
//!   2 = (0,1,0)    6 = (0,1,1)
//!   3 = (1,1,0)    7 = (1,1,1)
//! ```
//!
//! # Leaf Layout
//!
//! Every layer-0 node may own a leaf: a 4×4×4 grid of sub-voxels packed into
//! a `u64`. Sub-voxel indices are 2-bit-per-axis morton codes, so bit `i` of
//! the mask is the sub-voxel at `morton::decode(i)`.
//!
//! ```text
//!   layer-0 node (voxel0)
//!   ┌────┬────┬────┬────┐
//!   │    │    │    │    │   sub-voxel size = voxel0 / 4
//!   ├────┼────┼────┼────┤   sub-voxel centre = leaf_origin
//!   │    │    │    │    │       + (x, y, z) * voxel0 / 4
//!   ├────┼────┼────┼────┤       + voxel0 / 8
//!   │    │    │    │    │
//!   ├────┼────┼────┼────┤
//!   │    │    │    │    │
//!   └────┴────┴────┴────┘
//! ```

use glam::IVec3;

// =============================================================================
// Layer limits
// =============================================================================

/// Smallest voxel power accepted by generation (layers 0 and 1 only).
pub const MIN_VOXEL_POWER: u8 = 1;

/// Largest voxel power accepted by generation.
///
/// Layer 0 then spans 2^12 nodes per side, well inside the 21 bits per axis
/// that a 64-bit morton code can hold.
pub const MAX_VOXEL_POWER: u8 = 12;

/// Sub-voxels per leaf axis.
pub const LEAF_SIDE: i32 = 4;

/// Sub-voxels per leaf (4³).
pub const LEAF_SUBNODES: usize = 64;

/// Number of face directions.
pub const NUM_DIRECTIONS: usize = 6;

/// Children per octree node.
pub const NUM_CHILDREN: usize = 8;

// =============================================================================
// Directions
// =============================================================================

/// Face direction offsets, ordered +X, -X, +Y, -Y, +Z, -Z.
///
/// Every per-direction table in the crate is indexed by this order.
pub const DIR_OFFSETS: [IVec3; NUM_DIRECTIONS] = [
  IVec3::new(1, 0, 0),
  IVec3::new(-1, 0, 0),
  IVec3::new(0, 1, 0),
  IVec3::new(0, -1, 0),
  IVec3::new(0, 0, 1),
  IVec3::new(0, 0, -1),
];

/// Child octants on the face of a neighbour that touches the querying node.
///
/// Looking in +X, the neighbour's touching face is its -X side (x bit clear).
pub const DIR_CHILD_OFFSETS: [[u8; 4]; NUM_DIRECTIONS] = [
  [0, 2, 4, 6],
  [1, 3, 5, 7],
  [0, 1, 4, 5],
  [2, 3, 6, 7],
  [0, 1, 2, 3],
  [4, 5, 6, 7],
];

/// Leaf sub-voxels on the face of a neighbour leaf that touches the querying node.
pub const DIR_LEAF_CHILD_OFFSETS: [[u8; 16]; NUM_DIRECTIONS] = [
  leaf_face(0, 0),
  leaf_face(0, 3),
  leaf_face(1, 0),
  leaf_face(1, 3),
  leaf_face(2, 0),
  leaf_face(2, 3),
];

/// Collect the 16 sub-voxel indices whose coordinate on `axis` equals `value`.
const fn leaf_face(axis: u32, value: u32) -> [u8; 16] {
  let mut out = [0u8; 16];
  let mut count = 0;
  let mut i = 0u32;
  while i < LEAF_SUBNODES as u32 {
    // 2-bit morton: axis bits live at positions `axis` and `axis + 3`.
    let coord = ((i >> axis) & 1) | (((i >> (axis + 3)) & 1) << 1);
    if coord == value {
      out[count] = i as u8;
      count += 1;
    }
    i += 1;
  }
  out
}

/// Index of the direction opposite to `dir`.
#[inline]
pub const fn opposite_direction(dir: usize) -> usize {
  dir ^ 1
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
