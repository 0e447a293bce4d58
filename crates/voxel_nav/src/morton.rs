//! 3D morton (Z-order) codes.
//!
//! Bits are interleaved x, y, z starting at bit 0, 21 bits per axis.
//! Shifting a code right by 3 yields the code of its parent one layer up;
//! the low 3 bits are the child octant.

use glam::UVec3;

/// Largest coordinate representable on one axis.
pub const MAX_COORD: u32 = (1 << 21) - 1;

#[inline]
fn split_by_3(a: u32) -> u64 {
  let mut x = (a & MAX_COORD) as u64;
  x = (x | x << 32) & 0x001f_0000_0000_ffff;
  x = (x | x << 16) & 0x001f_0000_ff00_00ff;
  x = (x | x << 8) & 0x100f_00f0_0f00_f00f;
  x = (x | x << 4) & 0x10c3_0c30_c30c_30c3;
  x = (x | x << 2) & 0x1249_2492_4924_9249;
  x
}

#[inline]
fn compact_by_3(code: u64) -> u32 {
  let mut x = code & 0x1249_2492_4924_9249;
  x = (x ^ (x >> 2)) & 0x10c3_0c30_c30c_30c3;
  x = (x ^ (x >> 4)) & 0x100f_00f0_0f00_f00f;
  x = (x ^ (x >> 8)) & 0x001f_0000_ff00_00ff;
  x = (x ^ (x >> 16)) & 0x001f_0000_0000_ffff;
  x = (x ^ (x >> 32)) & MAX_COORD as u64;
  x as u32
}

/// Interleave three coordinates into a morton code.
#[inline]
pub fn encode(x: u32, y: u32, z: u32) -> u64 {
  split_by_3(x) | (split_by_3(y) << 1) | (split_by_3(z) << 2)
}

/// Encode a coordinate vector.
#[inline]
pub fn encode_vec(v: UVec3) -> u64 {
  encode(v.x, v.y, v.z)
}

/// Split a morton code back into its coordinates.
#[inline]
pub fn decode(code: u64) -> UVec3 {
  UVec3::new(compact_by_3(code), compact_by_3(code >> 1), compact_by_3(code >> 2))
}

#[cfg(test)]
#[path = "morton_test.rs"]
mod morton_test;
