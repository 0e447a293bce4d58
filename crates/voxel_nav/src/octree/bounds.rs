//! Axis-aligned bounding box with double precision.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Double-precision axis-aligned bounding box.
///
/// Used for volume bounds, dynamic regions and the debug filter box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
	/// Minimum corner (inclusive).
	pub min: DVec3,
	/// Maximum corner (inclusive).
	pub max: DVec3,
}

impl Aabb {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a new AABB from center and half-extents.
	pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
		Self {
			min: center - half_extents,
			max: center + half_extents,
		}
	}

	/// Check if this AABB overlaps with another (touching counts).
	#[inline]
	pub fn overlaps(&self, other: &Aabb) -> bool {
		self.min.x <= other.max.x
			&& self.max.x >= other.min.x
			&& self.min.y <= other.max.y
			&& self.max.y >= other.min.y
			&& self.min.z <= other.max.z
			&& self.max.z >= other.min.z
	}

	/// Check if this AABB contains a point (boundary inclusive).
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	/// Check if a cube of `half_size` around `center` overlaps this box.
	#[inline]
	pub fn overlaps_cube(&self, center: DVec3, half_size: f64) -> bool {
		self.overlaps(&Aabb::from_center_half_extents(center, DVec3::splat(half_size)))
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Corner-wise comparison within `tolerance`.
	pub fn approx_eq(&self, other: &Aabb, tolerance: f64) -> bool {
		self.min.abs_diff_eq(other.min, tolerance) && self.max.abs_diff_eq(other.max, tolerance)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_center_half_extents() {
		let aabb = Aabb::from_center_half_extents(DVec3::ZERO, DVec3::splat(10.0));
		assert_eq!(aabb.min, DVec3::splat(-10.0));
		assert_eq!(aabb.max, DVec3::splat(10.0));
		assert_eq!(aabb.center(), DVec3::ZERO);
		assert_eq!(aabb.size(), DVec3::splat(20.0));
	}

	#[test]
	fn test_overlaps_touching() {
		// Touching at boundary should count as overlapping
		let a = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
		let b = Aabb::new(DVec3::splat(10.0), DVec3::splat(20.0));
		assert!(a.overlaps(&b));
		assert!(b.overlaps(&a));

		let c = Aabb::new(DVec3::splat(11.0), DVec3::splat(20.0));
		assert!(!a.overlaps(&c));
	}

	#[test]
	fn test_contains_point() {
		let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
		assert!(aabb.contains_point(DVec3::splat(5.0)));
		assert!(aabb.contains_point(DVec3::ZERO));
		assert!(aabb.contains_point(DVec3::splat(10.0)));
		assert!(!aabb.contains_point(DVec3::new(5.0, -1.0, 5.0)));
	}

	#[test]
	fn test_overlaps_cube() {
		let aabb = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
		assert!(aabb.overlaps_cube(DVec3::splat(12.0), 2.5));
		assert!(!aabb.overlaps_cube(DVec3::splat(12.0), 1.5));
	}

	#[test]
	fn test_approx_eq() {
		let a = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
		let b = Aabb::new(DVec3::splat(0.0005), DVec3::splat(10.0));
		assert!(a.approx_eq(&b, 0.001));
		assert!(!a.approx_eq(&b, 0.0001));
	}
}
