use super::*;

/// Low bits follow x, y, z order.
#[test]
fn test_encode_bit_order() {
  assert_eq!(encode(1, 0, 0), 0b001);
  assert_eq!(encode(0, 1, 0), 0b010);
  assert_eq!(encode(0, 0, 1), 0b100);
  assert_eq!(encode(1, 1, 1), 0b111);
  assert_eq!(encode(2, 0, 0), 0b1000);
}

/// Decoding reverses encoding at the extremes of the coordinate range.
#[test]
fn test_decode_extremes() {
  let code = encode(MAX_COORD, 0, MAX_COORD);
  assert_eq!(decode(code), UVec3::new(MAX_COORD, 0, MAX_COORD));

  let code = encode(12345, 678, 1 << 20);
  assert_eq!(decode(code), UVec3::new(12345, 678, 1 << 20));
}

/// Shifting right by 3 halves each coordinate (parent lookup).
#[test]
fn test_parent_shift() {
  let child = encode(13, 6, 9);
  assert_eq!(decode(child >> 3), UVec3::new(6, 3, 4), "child >> 3 must address the parent");
  assert_eq!(child & 7, encode(1, 0, 1), "low bits are the child octant");
}

/// Codes are monotonic along a single axis, which the sorted layers rely on.
#[test]
fn test_monotonic_along_axis() {
  for axis in 0..3 {
    let mut last = None;
    for i in 0..64u32 {
      let mut c = [0u32; 3];
      c[axis] = i;
      let code = encode(c[0], c[1], c[2]);
      if let Some(prev) = last {
        assert!(code > prev, "axis {} not monotonic at {}", axis, i);
      }
      last = Some(code);
    }
  }
}
