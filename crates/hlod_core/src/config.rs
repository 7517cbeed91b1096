//! HlodSettings - per-target bake configuration.
//!
//! Deserializable from TOML so tools can keep bake settings next to the
//! scene. Defaults match the values a freshly added HLOD target starts with.

use serde::{Deserialize, Serialize};

/// Free-form option payload handed to a strategy factory.
pub type StrategyOptions = toml::Table;

/// Late-bound strategy selection: type identifier plus its options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
  /// Identifier registered in the [`StrategyRegistry`](crate::StrategyRegistry).
  #[serde(rename = "type")]
  pub type_id: String,

  /// Options forwarded verbatim to the factory.
  #[serde(default)]
  pub options: StrategyOptions,
}

impl StrategyConfig {
  /// Strategy with no options.
  pub fn new(type_id: impl Into<String>) -> Self {
    Self {
      type_id: type_id.into(),
      options: StrategyOptions::new(),
    }
  }

  /// Strategy with the given options table.
  pub fn with_options(type_id: impl Into<String>, options: StrategyOptions) -> Self {
    Self {
      type_id: type_id.into(),
      options,
    }
  }
}

/// Bake configuration for one HLOD target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HlodSettings {
  /// Renderers whose largest bounds dimension is below this are ignored.
  pub threshold_size: f32,

  /// Space cells are not split below this side length.
  pub min_size: f64,

  /// Loose margin added to child cells when testing object containment.
  pub loose_size: f64,

  /// Maximum quadtree depth (root = 0).
  pub max_depth: u32,

  /// Screen-relative size at which a coarser level replaces its children.
  pub lod_distance: f32,

  /// Screen-relative size below which the whole hierarchy is culled.
  pub cull_distance: f32,

  pub simplifier: StrategyConfig,
  pub batcher: StrategyConfig,
  pub streaming: StrategyConfig,
}

impl Default for HlodSettings {
  fn default() -> Self {
    Self {
      threshold_size: 5.0,
      min_size: 30.0,
      loose_size: 5.0,
      max_depth: 16,
      lod_distance: 0.3,
      cull_distance: 0.01,
      simplifier: StrategyConfig::new("none"),
      batcher: StrategyConfig::new("simple"),
      streaming: StrategyConfig::new("hierarchy"),
    }
  }
}
