//! Double-precision bounds shared by the scene model and the space tree.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in world space.
///
/// Used for renderer bounds, scene bounds and space cells. The `_xz` helpers
/// ignore Y, matching the quadtree's split plane.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
	pub min: DVec3,
	pub max: DVec3,
}

impl Aabb {
	/// Box spanning `min..=max`. Debug builds check the corners are ordered.
	pub fn new(min: DVec3, max: DVec3) -> Self {
		debug_assert!(min.cmple(max).all(), "inverted bounds: {min} > {max}");
		Self { min, max }
	}

	/// Box of full `size` around `center`.
	pub fn from_center_size(center: DVec3, size: DVec3) -> Self {
		let half = size * 0.5;
		Self {
			min: center - half,
			max: center + half,
		}
	}

	/// Degenerate box containing a single point.
	pub fn from_point(point: DVec3) -> Self {
		Self {
			min: point,
			max: point,
		}
	}

	#[inline]
	pub fn size(&self) -> DVec3 {
		self.max - self.min
	}

	#[inline]
	pub fn center(&self) -> DVec3 {
		(self.min + self.max) * 0.5
	}

	/// Largest extent over all three axes.
	#[inline]
	pub fn max_dimension(&self) -> f64 {
		self.size().max_element()
	}

	/// Grow this box to include `other`.
	pub fn encapsulate(&mut self, other: &Aabb) {
		self.min = self.min.min(other.min);
		self.max = self.max.max(other.max);
	}

	/// Union of two boxes.
	pub fn union(&self, other: &Aabb) -> Aabb {
		let mut out = *self;
		out.encapsulate(other);
		out
	}

	/// Boundary-inclusive point test.
	#[inline]
	pub fn contains_point(&self, point: DVec3) -> bool {
		self.min.cmple(point).all() && point.cmple(self.max).all()
	}

	/// Check if `other` lies fully inside this box (boundary inclusive).
	#[inline]
	pub fn contains_aabb(&self, other: &Aabb) -> bool {
		self.contains_point(other.min) && self.contains_point(other.max)
	}

	/// Like [`contains_aabb`](Self::contains_aabb) but only on the X/Z plane.
	#[inline]
	pub fn contains_aabb_xz(&self, other: &Aabb) -> bool {
		other.min.x >= self.min.x
			&& other.max.x <= self.max.x
			&& other.min.z >= self.min.z
			&& other.max.z <= self.max.z
	}

	/// Grow the box by `amount` on each side of the X and Z axes.
	pub fn expand_xz(&self, amount: f64) -> Aabb {
		let delta = DVec3::new(amount, 0.0, amount);
		Aabb {
			min: self.min - delta,
			max: self.max + delta,
		}
	}

	/// Cube sharing this box's center whose side is the largest dimension.
	pub fn to_cube(&self) -> Aabb {
		Aabb::from_center_size(self.center(), DVec3::splat(self.max_dimension()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_center_size() {
		let cell = Aabb::from_center_size(DVec3::new(5.0, 0.0, 5.0), DVec3::new(10.0, 2.0, 10.0));
		assert_eq!(cell, Aabb::new(DVec3::new(0.0, -1.0, 0.0), DVec3::new(10.0, 1.0, 10.0)));
	}

	#[test]
	fn test_contains_point_is_boundary_inclusive() {
		let cell = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));

		assert!(cell.contains_point(DVec3::new(3.0, 7.0, 1.0)));
		assert!(cell.contains_point(cell.min));
		assert!(cell.contains_point(cell.max));
		assert!(!cell.contains_point(DVec3::new(3.0, 7.0, -0.5)));
		assert!(!cell.contains_point(DVec3::new(10.5, 0.0, 0.0)));
	}

	#[test]
	fn test_contains_aabb() {
		let outer = Aabb::new(DVec3::ZERO, DVec3::splat(10.0));
		let inner = Aabb::new(DVec3::splat(2.0), DVec3::splat(8.0));
		let straddling = Aabb::new(DVec3::splat(5.0), DVec3::splat(15.0));

		assert!(outer.contains_aabb(&inner));
		assert!(outer.contains_aabb(&outer));
		assert!(!outer.contains_aabb(&straddling));
	}

	#[test]
	fn test_contains_aabb_xz_ignores_height() {
		let cell = Aabb::new(DVec3::ZERO, DVec3::new(10.0, 1.0, 10.0));
		let tall = Aabb::new(DVec3::new(1.0, -50.0, 1.0), DVec3::new(2.0, 50.0, 2.0));

		assert!(!cell.contains_aabb(&tall));
		assert!(cell.contains_aabb_xz(&tall));
	}

	#[test]
	fn test_encapsulate() {
		let mut a = Aabb::new(DVec3::ZERO, DVec3::ONE);
		a.encapsulate(&Aabb::new(DVec3::splat(-1.0), DVec3::splat(0.5)));
		assert_eq!(a.min, DVec3::splat(-1.0));
		assert_eq!(a.max, DVec3::ONE);
	}

	#[test]
	fn test_expand_xz() {
		let a = Aabb::new(DVec3::ZERO, DVec3::splat(4.0)).expand_xz(1.0);
		assert_eq!(a.min, DVec3::new(-1.0, 0.0, -1.0));
		assert_eq!(a.max, DVec3::new(5.0, 4.0, 5.0));
	}

	#[test]
	fn test_to_cube() {
		let a = Aabb::new(DVec3::ZERO, DVec3::new(10.0, 2.0, 4.0)).to_cube();
		assert_eq!(a.size(), DVec3::splat(10.0));
		assert_eq!(a.center(), DVec3::new(5.0, 1.0, 2.0));
	}

	#[test]
	fn test_max_dimension() {
		let a = Aabb::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
		assert_eq!(a.max_dimension(), 6.0);
	}
}
