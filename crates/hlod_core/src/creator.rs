//! HlodCreator - bakes and destroys the HLOD of a target.
//!
//! # Create
//!
//! ```text
//!   resolve strategies ──► refresh assets ──► split space ──► build info
//!                                              0 .. 25%          │
//!        ┌───────────────────────────────────────────────────────┘
//!        ▼
//!   simplify (one branch per node, join) ──► batch ──► stream ──► attach
//!        25 .. 50%                          50 .. 75%   75 .. 100%
//! ```
//!
//! Strategies are resolved before anything else runs, so a bad configuration
//! fails without touching the asset store. The build-info list owns every
//! working object of the bake and is disposed on every exit path. The progress
//! sink is cleared whenever `create` or `destroy` returns.
//!
//! # Destroy
//!
//! Deletes every tracked artifact inside one editing session. Entries that
//! are already gone are skipped; deletions that fail are attempted for every
//! entry and reported together once the session is closed.

use tracing::{debug, info, warn};
use web_time::Instant;

use crate::asset::{AssetHandle, AssetStore};
use crate::branch::BranchSet;
use crate::build_info::{create_build_info, BuildInfo};
use crate::error::{BranchError, HlodError, Stage, StageError};
use crate::progress::{ProgressScope, ProgressSink, StageProgress};
use crate::scene::HlodTarget;
use crate::space::{QuadTreeSpaceSplitter, SpaceSplitter, SplitterConfig};
use crate::strategy::{Simplifier, StrategyRegistry, StreamingOutput, StreamingRequest};
use crate::working::Allocator;

const BAKE_TITLE: &str = "Bake HLOD";
const SPLIT_PROGRESS: StageProgress = StageProgress::new(BAKE_TITLE, "Splitting space", 0.0, 0.25);
const SIMPLIFY_PROGRESS: StageProgress = StageProgress::new(BAKE_TITLE, "Simplify meshes", 0.25, 0.25);
const BATCH_PROGRESS: StageProgress =
  StageProgress::new(BAKE_TITLE, "Generating combined static meshes.", 0.5, 0.25);
const STREAM_PROGRESS: StageProgress = StageProgress::new(BAKE_TITLE, "Storing results.", 0.75, 0.25);
const DESTROY_PROGRESS: StageProgress =
  StageProgress::new("Destroy HLOD", "Destroying HLOD files", 0.0, 1.0);

/// Timing and size statistics of one bake.
#[derive(Debug, Clone, Copy, Default)]
pub struct BakeStats {
  pub split_us: u64,
  pub build_info_us: u64,
  pub simplify_us: u64,
  pub batch_us: u64,
  pub stream_us: u64,
  pub total_us: u64,
  /// Space nodes (and build infos) in the hierarchy.
  pub node_count: usize,
  /// Working objects converted from renderers.
  pub working_object_count: usize,
  /// Assets written by the streaming builder.
  pub generated_count: usize,
}

/// Bake orchestrator.
///
/// Borrows its collaborators for the duration of one or more operations.
pub struct HlodCreator<'a> {
  registry: &'a StrategyRegistry,
  assets: &'a mut dyn AssetStore,
  progress: &'a mut dyn ProgressSink,
  allocator: Allocator,
}

impl<'a> HlodCreator<'a> {
  pub fn new(
    registry: &'a StrategyRegistry,
    assets: &'a mut dyn AssetStore,
    progress: &'a mut dyn ProgressSink,
  ) -> Self {
    Self {
      registry,
      assets,
      progress,
      allocator: Allocator::new(),
    }
  }

  /// Use `allocator` for working objects, e.g. to observe allocations.
  pub fn with_allocator(mut self, allocator: Allocator) -> Self {
    self.allocator = allocator;
    self
  }

  pub fn allocator(&self) -> &Allocator {
    &self.allocator
  }

  /// Bake the HLOD of `target`.
  ///
  /// On success the generated assets and the controller are attached to the
  /// target. On failure the target is left untouched.
  pub fn create(&mut self, target: &mut HlodTarget) -> Result<BakeStats, HlodError> {
    let _span = tracing::info_span!("hlod::create", hlod = %target.name).entered();
    let mut progress = ProgressScope::new(&mut *self.progress);

    if target.is_baked() {
      return Err(HlodError::AlreadyBaked(target.name.clone()));
    }

    let settings = &target.settings;
    let simplifier = self.registry.create_simplifier(&settings.simplifier)?;
    let batcher = self.registry.create_batcher(&settings.batcher)?;
    let streaming = self.registry.create_streaming_builder(&settings.streaming)?;

    self
      .assets
      .refresh()
      .map_err(|e| HlodError::assets(Stage::Refresh, e))?;
    self
      .assets
      .save_assets()
      .map_err(|e| HlodError::assets(Stage::Refresh, e))?;

    let total_start = Instant::now();
    let mut stats = BakeStats::default();

    // Split space
    let start = Instant::now();
    let root = {
      let _span = tracing::info_span!("split_space").entered();
      let bounds = target.scene_bounds();
      let objects = target.hlod_targets();
      let splitter =
        QuadTreeSpaceSplitter::new(SplitterConfig::from_settings(target.position, &target.settings));
      splitter.create_space_tree(bounds, &objects, &mut |p| {
        SPLIT_PROGRESS.report(progress.sink(), p)
      })
    };
    stats.split_us = start.elapsed().as_micros() as u64;
    info!(elapsed_us = stats.split_us, nodes = root.node_count(), "split space");

    // Build info
    let start = Instant::now();
    let allocated_before = self.allocator.total_allocated();
    let mut infos = {
      let _span = tracing::info_span!("build_info").entered();
      create_build_info(&root, target.settings.threshold_size, &self.allocator)
    };
    stats.build_info_us = start.elapsed().as_micros() as u64;
    stats.node_count = infos.len();
    stats.working_object_count = self.allocator.total_allocated() - allocated_before;

    // Simplify
    let start = Instant::now();
    {
      let _span = tracing::info_span!("simplify").entered();
      simplify_all(simplifier.as_ref(), &mut infos, progress.sink())?;
    }
    stats.simplify_us = start.elapsed().as_micros() as u64;
    info!(elapsed_us = stats.simplify_us, branches = infos.len(), "simplify");

    // Batch
    let start = Instant::now();
    {
      let _span = tracing::info_span!("batch").entered();
      batcher
        .batch(target.position, &mut infos[..], &mut |p| {
          BATCH_PROGRESS.report(progress.sink(), p)
        })
        .map_err(|e| HlodError::stage(Stage::Batch, e))?;
    }
    stats.batch_us = start.elapsed().as_micros() as u64;
    info!(elapsed_us = stats.batch_us, "batch");

    // Stream
    let start = Instant::now();
    let mut output = StreamingOutput::default();
    let streamed = {
      let _span = tracing::info_span!("stream").entered();
      let request = StreamingRequest {
        root: &root,
        build_infos: &infos[..],
        target: &*target,
        cull_distance: target.settings.cull_distance,
        lod_distance: target.settings.lod_distance,
      };
      streaming.build(request, &mut *self.assets, &mut output, &mut |p| {
        STREAM_PROGRESS.report(progress.sink(), p)
      })
    };
    stats.stream_us = start.elapsed().as_micros() as u64;

    let controller = match streamed {
      Ok(()) => output.controller.take(),
      Err(source) => {
        discard_generated(&mut *self.assets, &output.generated);
        return Err(HlodError::stage(Stage::Stream, source));
      }
    };
    let Some(controller) = controller else {
      discard_generated(&mut *self.assets, &output.generated);
      return Err(HlodError::stage(
        Stage::Stream,
        "streaming builder produced no controller".into(),
      ));
    };
    info!(elapsed_us = stats.stream_us, assets = output.generated.len(), "stream");

    infos.dispose();
    debug!(live = self.allocator.live_count(), "working objects released");

    stats.generated_count = output.generated.len();
    stats.total_us = total_start.elapsed().as_micros() as u64;
    target.generated = output.generated.into_iter().map(Some).collect();
    target.controller = Some(controller);

    info!(
      total_us = stats.total_us,
      nodes = stats.node_count,
      working_objects = stats.working_object_count,
      assets = stats.generated_count,
      "bake finished"
    );
    Ok(stats)
  }

  /// Remove every artifact generated for `target` and detach its controller.
  ///
  /// Does nothing if the target was never baked.
  pub fn destroy(&mut self, target: &mut HlodTarget) -> Result<(), HlodError> {
    if !target.is_baked() {
      return Ok(());
    }

    let _span = tracing::info_span!("hlod::destroy", hlod = %target.name).entered();
    let mut progress = ProgressScope::new(&mut *self.progress);
    DESTROY_PROGRESS.report(progress.sink(), 0.0);

    let mut session = EditingSession::open(&mut *self.assets)?;

    let entries = std::mem::take(&mut target.generated);
    let total = entries.len();
    let mut remaining: Vec<AssetHandle> = Vec::new();
    let mut first_error: Option<StageError> = None;
    let mut removed = 0usize;

    for (i, entry) in entries.into_iter().enumerate() {
      if let Some(handle) = entry {
        match session.store().asset_path(&handle) {
          Some(path) if !path.is_empty() => match session.store().delete_asset(&path) {
            Ok(true) => removed += 1,
            Ok(false) => debug!(path = %path, "artifact already gone"),
            Err(error) => {
              warn!(path = %path, %error, "failed to delete artifact");
              remaining.push(handle);
              first_error.get_or_insert(error);
            }
          },
          _ => debug!(asset = %handle.path(), "artifact missing, skipped"),
        }
      }
      DESTROY_PROGRESS.report(progress.sink(), (i + 1) as f32 / total as f32);
    }

    let closed = session.close();

    if let Some(source) = first_error {
      if let Err(error) = &closed {
        warn!(%error, "editing session did not close cleanly");
      }
      let paths = remaining.iter().map(|h| h.path().to_owned()).collect();
      target.generated = remaining.into_iter().map(Some).collect();
      return Err(HlodError::DestroyIncomplete {
        remaining: paths,
        source,
      });
    }

    target.controller = None;
    info!(removed, total, "destroyed");
    closed.map_err(|e| HlodError::assets(Stage::Destroy, e))
  }

  /// Destroy, then bake again.
  pub fn rebuild(&mut self, target: &mut HlodTarget) -> Result<BakeStats, HlodError> {
    self.destroy(target)?;
    self.create(target)
  }
}

/// Launch one simplify branch per node and wait for all of them.
fn simplify_all(
  simplifier: &dyn Simplifier,
  infos: &mut [BuildInfo<'_>],
  sink: &mut dyn ProgressSink,
) -> Result<(), BranchError> {
  rayon::in_place_scope(move |scope| {
    let mut branches = BranchSet::new();
    for info in infos {
      let name = info.name.clone();
      branches.launch(scope, name, move |progress| simplifier.simplify(info, progress));
    }
    branches.join_all(&mut |p| SIMPLIFY_PROGRESS.report(sink, p))
  })
}

/// Best-effort removal of assets written by a failed streaming build.
fn discard_generated(assets: &mut dyn AssetStore, generated: &[AssetHandle]) {
  for handle in generated {
    if let Err(error) = assets.delete_asset(handle.path()) {
      warn!(asset = %handle.path(), %error, "failed to discard partial artifact");
    }
  }
  if let Err(error) = assets.save_assets() {
    warn!(%error, "failed to save assets after discarding partial artifacts");
  }
}

/// Open asset-editing session; closed explicitly or on drop.
struct EditingSession<'s> {
  store: &'s mut dyn AssetStore,
  open: bool,
}

impl<'s> EditingSession<'s> {
  fn open(store: &'s mut dyn AssetStore) -> Result<Self, HlodError> {
    store
      .start_editing()
      .map_err(|e| HlodError::assets(Stage::Destroy, e))?;
    Ok(Self { store, open: true })
  }

  fn store(&mut self) -> &mut dyn AssetStore {
    &mut *self.store
  }

  fn close(mut self) -> Result<(), StageError> {
    self.open = false;
    self.store.stop_editing()
  }
}

impl Drop for EditingSession<'_> {
  fn drop(&mut self) {
    if self.open {
      self.open = false;
      if let Err(error) = self.store.stop_editing() {
        warn!(%error, "failed to close editing session");
      }
    }
  }
}

#[cfg(test)]
#[path = "creator_test.rs"]
mod creator_test;
