//! SplitterConfig - cell sizing and lattice alignment for space splitting.

use glam::DVec3;

use crate::bounds::Aabb;
use crate::config::HlodSettings;

/// Smallest cell side the splitter will ever produce, whatever `min_size` says.
pub const MIN_CELL_SIZE: f64 = 0.01;

/// Configuration for the quadtree splitter.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitterConfig {
  /// Lattice origin; cell boundaries on X/Z are aligned to it.
  pub origin: DVec3,

  /// Margin added to child cells on X/Z when testing object containment.
  pub loose_size: f64,

  /// Cells whose side is not larger than this are never split.
  pub min_size: f64,

  /// Maximum depth below the root.
  pub max_depth: u32,
}

impl SplitterConfig {
  /// Build a splitter configuration from target settings.
  pub fn from_settings(origin: DVec3, settings: &HlodSettings) -> Self {
    Self {
      origin,
      loose_size: settings.loose_size,
      min_size: settings.min_size,
      max_depth: settings.max_depth,
    }
  }

  /// `min_size` clamped to [`MIN_CELL_SIZE`].
  #[inline]
  pub fn effective_min_size(&self) -> f64 {
    if self.min_size.is_finite() {
      self.min_size.max(MIN_CELL_SIZE)
    } else {
      MIN_CELL_SIZE
    }
  }

  /// Whether a cell of the given side at the given depth may be split.
  #[inline]
  pub fn can_split(&self, side: f64, depth: u32) -> bool {
    depth < self.max_depth && side > self.effective_min_size()
  }

  /// Root cell covering `bounds`.
  ///
  /// The X/Z minimum is snapped down to the `min_size` lattice anchored at
  /// `origin`, and the side is `min_size * 2^k` for the smallest `k` (up to
  /// `max_depth`) that covers the bounds, so leaf cells line up with the
  /// lattice. When `max_depth` levels cannot cover the bounds the raw extent
  /// is used instead. Y spans the input bounds unchanged.
  pub fn root_bounds(&self, bounds: &Aabb) -> Aabb {
    let cell = self.effective_min_size();
    let snap = |value: f64, origin: f64| origin + ((value - origin) / cell).floor() * cell;

    let min_x = snap(bounds.min.x, self.origin.x);
    let min_z = snap(bounds.min.z, self.origin.z);
    let needed = (bounds.max.x - min_x).max(bounds.max.z - min_z).max(cell);

    let mut side = cell;
    let mut levels = 0;
    while side < needed && levels < self.max_depth {
      side *= 2.0;
      levels += 1;
    }
    if side < needed {
      side = needed;
    }

    Aabb::new(
      DVec3::new(min_x, bounds.min.y, min_z),
      DVec3::new(min_x + side, bounds.max.y, min_z + side),
    )
  }
}

impl Default for SplitterConfig {
  fn default() -> Self {
    let settings = HlodSettings::default();
    Self::from_settings(DVec3::ZERO, &settings)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
