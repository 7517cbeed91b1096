//! Built-in simplifiers.

use serde::{Deserialize, Serialize};

use super::Simplifier;
use crate::branch::BranchProgress;
use crate::build_info::BuildInfo;
use crate::error::StageError;

/// Leaves geometry untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoneSimplifier;

impl Simplifier for NoneSimplifier {
  fn simplify(&self, _info: &mut BuildInfo<'_>, progress: &BranchProgress) -> Result<(), StageError> {
    progress.set(1.0);
    Ok(())
  }
}

/// Options of [`PolygonRatioSimplifier`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolygonRatioOptions {
  /// Fraction of triangles kept per level of LOD distance.
  pub ratio: f32,
  pub min_polygon_count: usize,
  pub max_polygon_count: usize,
}

impl Default for PolygonRatioOptions {
  fn default() -> Self {
    Self {
      ratio: 0.8,
      min_polygon_count: 10,
      max_polygon_count: 500,
    }
  }
}

/// Reduces each working object to `count * ratio^distance` triangles.
///
/// The budget is clamped to `[min_polygon_count, max_polygon_count]` and never
/// exceeds the source triangle count. Reduction drops trailing triangles.
#[derive(Clone, Debug)]
pub struct PolygonRatioSimplifier {
  options: PolygonRatioOptions,
}

impl PolygonRatioSimplifier {
  pub fn new(options: PolygonRatioOptions) -> Result<Self, StageError> {
    if !(options.ratio > 0.0 && options.ratio <= 1.0) {
      return Err(format!("ratio must be in (0, 1], got {}", options.ratio).into());
    }
    if options.min_polygon_count > options.max_polygon_count {
      return Err(
        format!(
          "min_polygon_count {} exceeds max_polygon_count {}",
          options.min_polygon_count, options.max_polygon_count
        )
        .into(),
      );
    }
    Ok(Self { options })
  }

  /// Triangle budget for an object of `triangles` triangles at `distance`.
  pub fn target_triangles(&self, triangles: usize, distance: u32) -> usize {
    let scaled = triangles as f64 * (self.options.ratio as f64).powi(distance as i32);
    let budget = (scaled.round() as usize)
      .clamp(self.options.min_polygon_count, self.options.max_polygon_count);
    budget.min(triangles)
  }
}

impl Simplifier for PolygonRatioSimplifier {
  fn simplify(&self, info: &mut BuildInfo<'_>, progress: &BranchProgress) -> Result<(), StageError> {
    let total = info.objects.len();
    for (i, entry) in info.objects.iter_mut().enumerate() {
      let mesh = &mut entry.object.mesh;
      let keep = self.target_triangles(mesh.triangle_count(), entry.distance);
      mesh.indices.truncate(keep * 3);
      progress.set((i + 1) as f32 / total as f32);
    }
    progress.set(1.0);
    Ok(())
  }
}
