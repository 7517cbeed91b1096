//! Pluggable bake strategies and the registry that late-binds them.
//!
//! A target names each strategy by type identifier plus an options table
//! ([`StrategyConfig`]). The [`StrategyRegistry`] maps identifiers to
//! factories and builds a fresh instance per bake.
//!
//! # Module Structure
//!
//! - [`simplifier`]: `none`, `polygon_ratio`
//! - [`batcher`]: `simple`
//! - [`streaming`]: `hierarchy`

pub mod batcher;
pub mod simplifier;
pub mod streaming;

pub use batcher::SimpleBatcher;
pub use simplifier::{NoneSimplifier, PolygonRatioOptions, PolygonRatioSimplifier};
pub use streaming::{HierarchyOptions, HierarchyStreamingBuilder};

use std::collections::HashMap;

use glam::DVec3;
use serde::de::DeserializeOwned;

use crate::asset::{AssetHandle, AssetStore};
use crate::branch::BranchProgress;
use crate::build_info::BuildInfo;
use crate::config::{StrategyConfig, StrategyOptions};
use crate::controller::HlodController;
use crate::error::{HlodError, StageError, StrategyKind};
use crate::scene::HlodTarget;
use crate::space::SpaceNode;

// =============================================================================
// Contracts
// =============================================================================

/// Reduces the geometry of one build-info node.
///
/// Runs concurrently with the simplifiers of sibling nodes; it may only touch
/// the node it was given.
pub trait Simplifier: Send + Sync {
  fn simplify(&self, info: &mut BuildInfo<'_>, progress: &BranchProgress) -> Result<(), StageError>;
}

/// Combines the working objects of every node, once per bake.
pub trait Batcher {
  fn batch(
    &self,
    origin: DVec3,
    build_infos: &mut [BuildInfo<'_>],
    on_progress: &mut dyn FnMut(f32),
  ) -> Result<(), StageError>;
}

/// Everything the streaming builder reads.
#[derive(Clone, Copy)]
pub struct StreamingRequest<'a> {
  pub root: &'a SpaceNode,
  pub build_infos: &'a [BuildInfo<'a>],
  pub target: &'a HlodTarget,
  pub cull_distance: f32,
  pub lod_distance: f32,
}

/// What the streaming builder produced.
///
/// Builders push every asset they write into `generated` as soon as it is
/// written, so a failed build can be rolled back.
#[derive(Debug, Default)]
pub struct StreamingOutput {
  pub generated: Vec<AssetHandle>,
  pub controller: Option<HlodController>,
}

/// Emits the streamable hierarchy and its assets.
pub trait StreamingBuilder {
  fn build(
    &self,
    request: StreamingRequest<'_>,
    assets: &mut dyn AssetStore,
    output: &mut StreamingOutput,
    on_progress: &mut dyn FnMut(f32),
  ) -> Result<(), StageError>;
}

/// Deserialize a typed options struct from a strategy's options table.
pub fn parse_options<T: DeserializeOwned>(options: &StrategyOptions) -> Result<T, StageError> {
  toml::Value::Table(options.clone())
    .try_into::<T>()
    .map_err(Into::into)
}

// =============================================================================
// Registry
// =============================================================================

type Factory<T> = Box<dyn Fn(&StrategyOptions) -> Result<Box<T>, StageError> + Send + Sync>;

/// Strategy factories keyed by type identifier.
#[derive(Default)]
pub struct StrategyRegistry {
  simplifiers: HashMap<String, Factory<dyn Simplifier>>,
  batchers: HashMap<String, Factory<dyn Batcher>>,
  streaming_builders: HashMap<String, Factory<dyn StreamingBuilder>>,
}

impl StrategyRegistry {
  /// Empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry holding the built-in strategies.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();

    registry.register_simplifier("none", |_options| {
      Ok(Box::new(NoneSimplifier) as Box<dyn Simplifier>)
    });
    registry.register_simplifier("polygon_ratio", |options| {
      let options: PolygonRatioOptions = parse_options(options)?;
      Ok(Box::new(PolygonRatioSimplifier::new(options)?) as Box<dyn Simplifier>)
    });
    registry.register_batcher("simple", |options| {
      if !options.is_empty() {
        return Err("the simple batcher takes no options".into());
      }
      Ok(Box::new(SimpleBatcher) as Box<dyn Batcher>)
    });
    registry.register_streaming_builder("hierarchy", |options| {
      let options: HierarchyOptions = parse_options(options)?;
      Ok(Box::new(HierarchyStreamingBuilder::new(options)) as Box<dyn StreamingBuilder>)
    });

    registry
  }

  pub fn register_simplifier<F>(&mut self, type_id: impl Into<String>, factory: F)
  where
    F: Fn(&StrategyOptions) -> Result<Box<dyn Simplifier>, StageError> + Send + Sync + 'static,
  {
    self.simplifiers.insert(type_id.into(), Box::new(factory));
  }

  pub fn register_batcher<F>(&mut self, type_id: impl Into<String>, factory: F)
  where
    F: Fn(&StrategyOptions) -> Result<Box<dyn Batcher>, StageError> + Send + Sync + 'static,
  {
    self.batchers.insert(type_id.into(), Box::new(factory));
  }

  pub fn register_streaming_builder<F>(&mut self, type_id: impl Into<String>, factory: F)
  where
    F: Fn(&StrategyOptions) -> Result<Box<dyn StreamingBuilder>, StageError> + Send + Sync + 'static,
  {
    self.streaming_builders.insert(type_id.into(), Box::new(factory));
  }

  pub fn create_simplifier(&self, config: &StrategyConfig) -> Result<Box<dyn Simplifier>, HlodError> {
    instantiate(&self.simplifiers, StrategyKind::Simplifier, config)
  }

  pub fn create_batcher(&self, config: &StrategyConfig) -> Result<Box<dyn Batcher>, HlodError> {
    instantiate(&self.batchers, StrategyKind::Batcher, config)
  }

  pub fn create_streaming_builder(
    &self,
    config: &StrategyConfig,
  ) -> Result<Box<dyn StreamingBuilder>, HlodError> {
    instantiate(&self.streaming_builders, StrategyKind::StreamingBuilder, config)
  }

  /// Registered identifiers of `kind`, sorted.
  pub fn type_ids(&self, kind: StrategyKind) -> Vec<&str> {
    let mut ids: Vec<&str> = match kind {
      StrategyKind::Simplifier => self.simplifiers.keys().map(String::as_str).collect(),
      StrategyKind::Batcher => self.batchers.keys().map(String::as_str).collect(),
      StrategyKind::StreamingBuilder => self.streaming_builders.keys().map(String::as_str).collect(),
    };
    ids.sort_unstable();
    ids
  }
}

fn instantiate<T: ?Sized>(
  factories: &HashMap<String, Factory<T>>,
  kind: StrategyKind,
  config: &StrategyConfig,
) -> Result<Box<T>, HlodError> {
  let factory = factories
    .get(&config.type_id)
    .ok_or_else(|| HlodError::UnknownStrategy {
      kind,
      type_id: config.type_id.clone(),
    })?;

  factory(&config.options).map_err(|source| HlodError::InvalidStrategyOptions {
    kind,
    type_id: config.type_id.clone(),
    source,
  })
}
