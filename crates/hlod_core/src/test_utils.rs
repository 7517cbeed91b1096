//! Test utilities shared by the module tests.
//!
//! Provides scene fixtures, a recording progress sink, failing asset stores
//! and strategies so each stage can be exercised in isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use glam::DVec3;

use crate::asset::{AssetData, AssetHandle, AssetStore, MemoryAssetStore};
use crate::branch::BranchProgress;
use crate::build_info::BuildInfo;
use crate::config::{HlodSettings, StrategyConfig, StrategyOptions};
use crate::error::StageError;
use crate::progress::ProgressSink;
use crate::scene::{HlodTarget, Lod, LodGroup, Renderer, SceneObject};
use crate::strategy::{Batcher, Simplifier, StrategyRegistry, StreamingBuilder};
use crate::strategy::{StreamingOutput, StreamingRequest};

// =============================================================================
// Scene fixtures
// =============================================================================

/// Object with a single cube renderer of side `size` centered at `center`.
pub fn cube_object(name: &str, center: DVec3, size: f64) -> SceneObject {
  SceneObject::new(name, center).with_renderer(Renderer::cuboid(
    format!("{name}.renderer"),
    center,
    DVec3::splat(size),
  ))
}

/// Object with an LOD group; level `n` holds one cube of side `8 / 2^n`.
pub fn lod_object(name: &str, center: DVec3, levels: usize) -> SceneObject {
  let lods = (0..levels)
    .map(|level| Lod {
      renderers: vec![Renderer::cuboid(
        format!("{name}.lod{level}"),
        center,
        DVec3::splat(8.0 / (1u32 << level) as f64),
      )],
    })
    .collect();
  SceneObject::new(name, center).with_lod_group(LodGroup { lods })
}

/// Settings with a cell size of `min_size` and no loose margin.
pub fn settings(min_size: f64, threshold_size: f32) -> HlodSettings {
  HlodSettings {
    min_size,
    threshold_size,
    loose_size: 0.0,
    ..HlodSettings::default()
  }
}

/// Target at the origin holding `objects`.
pub fn target_with(settings: HlodSettings, objects: Vec<SceneObject>) -> HlodTarget {
  let mut target = HlodTarget::new("Town", DVec3::ZERO, settings);
  for object in objects {
    target.add_object(object);
  }
  target
}

/// Objects laid out on a regular X/Z grid, `spacing` apart.
pub fn grid_objects(count_per_axis: usize, spacing: f64, size: f64) -> Vec<SceneObject> {
  let mut objects = Vec::with_capacity(count_per_axis * count_per_axis);
  for x in 0..count_per_axis {
    for z in 0..count_per_axis {
      let center = DVec3::new(
        x as f64 * spacing + spacing * 0.5,
        0.0,
        z as f64 * spacing + spacing * 0.5,
      );
      objects.push(cube_object(&format!("obj_{x}_{z}"), center, size));
    }
  }
  objects
}

// =============================================================================
// Progress
// =============================================================================

/// Progress sink that records everything it receives.
#[derive(Clone, Default)]
pub struct RecordingProgress {
  pub events: Arc<Mutex<Vec<(String, f32)>>>,
  pub clears: Arc<AtomicUsize>,
}

impl RecordingProgress {
  pub fn values(&self) -> Vec<f32> {
    self.events.lock().unwrap().iter().map(|(_, p)| *p).collect()
  }

  pub fn values_for(&self, info: &str) -> Vec<f32> {
    self
      .events
      .lock()
      .unwrap()
      .iter()
      .filter(|(i, _)| i == info)
      .map(|(_, p)| *p)
      .collect()
  }

  pub fn clear_count(&self) -> usize {
    self.clears.load(Ordering::SeqCst)
  }
}

impl ProgressSink for RecordingProgress {
  fn display(&mut self, _title: &str, info: &str, progress: f32) {
    self.events.lock().unwrap().push((info.to_owned(), progress));
  }

  fn clear(&mut self) {
    self.clears.fetch_add(1, Ordering::SeqCst);
  }
}

pub fn assert_non_decreasing(values: &[f32]) {
  for pair in values.windows(2) {
    assert!(
      pair[1] >= pair[0],
      "progress went backwards: {} -> {} in {:?}",
      pair[0],
      pair[1],
      values
    );
  }
}

// =============================================================================
// Asset stores
// =============================================================================

/// Memory store whose deletes of selected paths fail.
#[derive(Default)]
pub struct FlakyAssetStore {
  pub inner: MemoryAssetStore,
  pub failing_deletes: Vec<String>,
  pub fail_stop_editing: bool,
  pub stop_editing_calls: usize,
}

impl AssetStore for FlakyAssetStore {
  fn refresh(&mut self) -> Result<(), StageError> {
    self.inner.refresh()
  }

  fn save_assets(&mut self) -> Result<(), StageError> {
    self.inner.save_assets()
  }

  fn start_editing(&mut self) -> Result<(), StageError> {
    self.inner.start_editing()
  }

  fn stop_editing(&mut self) -> Result<(), StageError> {
    self.stop_editing_calls += 1;
    self.inner.stop_editing()?;
    if self.fail_stop_editing {
      return Err("editing session could not be closed".into());
    }
    Ok(())
  }

  fn write_asset(&mut self, path: &str, data: AssetData) -> Result<AssetHandle, StageError> {
    self.inner.write_asset(path, data)
  }

  fn asset_path(&self, handle: &AssetHandle) -> Option<String> {
    self.inner.asset_path(handle)
  }

  fn delete_asset(&mut self, path: &str) -> Result<bool, StageError> {
    if self.failing_deletes.iter().any(|p| p == path) {
      return Err(format!("{path} is locked").into());
    }
    self.inner.delete_asset(path)
  }
}

// =============================================================================
// Strategies
// =============================================================================

/// Simplifier that fails for nodes whose name matches.
pub struct FailingSimplifier {
  pub fail_on: String,
  pub calls: Arc<AtomicUsize>,
}

impl Simplifier for FailingSimplifier {
  fn simplify(&self, info: &mut BuildInfo<'_>, progress: &BranchProgress) -> Result<(), StageError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    progress.set(0.5);
    if info.name == self.fail_on {
      return Err(format!("cannot simplify {:?}", info.name).into());
    }
    progress.set(1.0);
    Ok(())
  }
}

/// Batcher that always fails.
pub struct FailingBatcher;

impl Batcher for FailingBatcher {
  fn batch(
    &self,
    _origin: DVec3,
    _build_infos: &mut [BuildInfo<'_>],
    _on_progress: &mut dyn FnMut(f32),
  ) -> Result<(), StageError> {
    Err("batcher exploded".into())
  }
}

/// Streaming builder that writes one asset, then fails.
pub struct HalfwayStreamingBuilder;

impl StreamingBuilder for HalfwayStreamingBuilder {
  fn build(
    &self,
    _request: StreamingRequest<'_>,
    assets: &mut dyn AssetStore,
    output: &mut StreamingOutput,
    _on_progress: &mut dyn FnMut(f32),
  ) -> Result<(), StageError> {
    let handle = assets.write_asset(
      "hlod/partial.mesh",
      AssetData::Mesh(crate::asset::MeshAsset::default()),
    )?;
    output.generated.push(handle);
    Err("disk full".into())
  }
}

/// Registry with the built-ins plus the failing test strategies.
///
/// - simplifier `fail_on_root` fails on the root node
/// - batcher `failing`
/// - streaming builder `halfway`
pub fn test_registry(simplify_calls: Arc<AtomicUsize>) -> StrategyRegistry {
  let mut registry = StrategyRegistry::with_builtins();
  registry.register_simplifier("fail_on_root", move |_options: &StrategyOptions| {
    Ok(Box::new(FailingSimplifier {
      fail_on: String::new(),
      calls: Arc::clone(&simplify_calls),
    }) as Box<dyn Simplifier>)
  });
  registry.register_batcher("failing", |_options: &StrategyOptions| {
    Ok(Box::new(FailingBatcher) as Box<dyn Batcher>)
  });
  registry.register_streaming_builder("halfway", |_options: &StrategyOptions| {
    Ok(Box::new(HalfwayStreamingBuilder) as Box<dyn StreamingBuilder>)
  });
  registry
}

pub fn strategy(type_id: &str) -> StrategyConfig {
  StrategyConfig::new(type_id)
}
