use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::asset::MemoryAssetStore;
use crate::config::{HlodSettings, StrategyConfig, StrategyOptions};
use crate::error::StrategyKind;
use crate::test_utils::*;

fn town(settings: HlodSettings) -> HlodTarget {
  target_with(settings, grid_objects(4, 10.0, 2.0))
}

fn default_settings() -> HlodSettings {
  settings(10.0, 1.0)
}

/// Run `create` with a fresh allocator; returns the result and the allocator.
fn bake(
  registry: &StrategyRegistry,
  store: &mut dyn AssetStore,
  progress: &RecordingProgress,
  target: &mut HlodTarget,
) -> (Result<BakeStats, HlodError>, Allocator) {
  let allocator = Allocator::new();
  let mut sink = progress.clone();
  let result = HlodCreator::new(registry, store, &mut sink)
    .with_allocator(allocator.clone())
    .create(target);
  (result, allocator)
}

fn destroy(
  registry: &StrategyRegistry,
  store: &mut dyn AssetStore,
  progress: &RecordingProgress,
  target: &mut HlodTarget,
) -> Result<(), HlodError> {
  let mut sink = progress.clone();
  HlodCreator::new(registry, store, &mut sink).destroy(target)
}

// =============================================================================
// Create
// =============================================================================

#[test]
fn test_create_attaches_artifacts() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);
  let stats = result.unwrap();

  assert!(target.is_baked());
  assert_eq!(stats.node_count, 21);
  assert_eq!(stats.working_object_count, 16 * 3);
  assert_eq!(stats.generated_count, target.generated.len());
  // 16 leaves + 4 interior nodes + root carry geometry
  assert_eq!(target.generated.len(), 21);
  for handle in target.generated.iter().flatten() {
    assert!(store.asset_path(handle).is_some(), "{} not written", handle.path());
  }

  let controller = target.controller.as_ref().unwrap();
  assert_eq!(controller.nodes.len(), 21);
  assert_eq!(controller.root().map(|n| n.name.as_str()), Some(""));
  assert_eq!(controller.cull_distance, target.settings.cull_distance);
  assert_eq!(controller.lod_distance, target.settings.lod_distance);

  assert_eq!(allocator.live_count(), 0, "working objects leaked");
  assert_eq!(store.refresh_count(), 1);
}

#[test]
fn test_create_progress_slices_are_ordered() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());

  let (result, _) = bake(&registry, &mut store, &progress, &mut target);
  result.unwrap();

  let values = progress.values();
  assert_non_decreasing(&values);
  assert_eq!(values.last().copied(), Some(1.0));

  let slices = [
    ("Splitting space", 0.0, 0.25),
    ("Simplify meshes", 0.25, 0.5),
    ("Generating combined static meshes.", 0.5, 0.75),
    ("Storing results.", 0.75, 1.0),
  ];
  for (info, low, high) in slices {
    let stage = progress.values_for(info);
    assert!(!stage.is_empty(), "no progress for {info}");
    assert!(stage.iter().all(|p| (low..=high).contains(p)), "{info}: {stage:?}");
    assert_eq!(stage.last().copied(), Some(high));
  }
  assert_eq!(progress.clear_count(), 1);
}

#[test]
fn test_create_empty_target() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = target_with(default_settings(), Vec::new());

  let (result, _) = bake(&registry, &mut store, &progress, &mut target);
  let stats = result.unwrap();

  assert_eq!(stats.node_count, 1);
  assert!(target.generated.is_empty());
  assert!(target.is_baked());
  assert!(store.is_empty());
}

#[test]
fn test_create_refuses_baked_target() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());

  bake(&registry, &mut store, &progress, &mut target).0.unwrap();
  let written = store.len();

  let (result, _) = bake(&registry, &mut store, &progress, &mut target);
  assert!(matches!(result, Err(HlodError::AlreadyBaked(ref name)) if name == "Town"));
  assert_eq!(store.len(), written);
  assert_eq!(progress.clear_count(), 2);
}

// =============================================================================
// Configuration errors
// =============================================================================

/// An unresolvable simplifier fails before any branch is launched and
/// before any working object is converted.
#[test]
fn test_unknown_simplifier_fails_fast() {
  let calls = Arc::new(AtomicUsize::new(0));
  let registry = test_registry(Arc::clone(&calls));
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(HlodSettings {
    simplifier: strategy("quadric"),
    ..default_settings()
  });

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);

  assert!(matches!(
    result,
    Err(HlodError::UnknownStrategy { kind: StrategyKind::Simplifier, .. })
  ));
  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert_eq!(allocator.live_count(), 0);
  assert_eq!(allocator.total_allocated(), 0);
  assert_eq!(store.refresh_count(), 0, "asset store touched before failing");
  assert!(!target.is_baked());
  assert!(progress.values().is_empty());
  assert_eq!(progress.clear_count(), 1);
}

/// Every strategy is resolved before simplification starts.
#[test]
fn test_unknown_batcher_fails_before_simplify() {
  let calls = Arc::new(AtomicUsize::new(0));
  let registry = test_registry(Arc::clone(&calls));
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(HlodSettings {
    simplifier: strategy("fail_on_root"),
    batcher: strategy("mesh_combiner"),
    ..default_settings()
  });

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);

  assert!(matches!(
    result,
    Err(HlodError::UnknownStrategy { kind: StrategyKind::Batcher, .. })
  ));
  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert_eq!(allocator.total_allocated(), 0);
}

#[test]
fn test_invalid_options_fail_fast() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut options = StrategyOptions::new();
  options.insert("ratio".into(), toml::Value::Float(2.0));
  let mut target = town(HlodSettings {
    simplifier: StrategyConfig::with_options("polygon_ratio", options),
    ..default_settings()
  });

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);

  match result {
    Err(HlodError::InvalidStrategyOptions { kind, type_id, .. }) => {
      assert_eq!(kind, StrategyKind::Simplifier);
      assert_eq!(type_id, "polygon_ratio");
    }
    other => panic!("unexpected result: {other:?}"),
  }
  assert_eq!(allocator.total_allocated(), 0);
}

// =============================================================================
// Stage failures
// =============================================================================

/// A failing branch does not stop its siblings; the bake fails afterwards
/// with every working object released.
#[test]
fn test_branch_failure_releases_everything() {
  let calls = Arc::new(AtomicUsize::new(0));
  let registry = test_registry(Arc::clone(&calls));
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(HlodSettings {
    simplifier: strategy("fail_on_root"),
    ..default_settings()
  });

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);

  match result {
    Err(HlodError::Branch(BranchError::Failed { index, name, .. })) => {
      assert_eq!(index, 0);
      assert_eq!(name, "");
    }
    other => panic!("unexpected result: {other:?}"),
  }
  assert_eq!(calls.load(Ordering::SeqCst), 21, "every branch ran");
  assert!(allocator.total_allocated() > 0);
  assert_eq!(allocator.live_count(), 0);
  assert!(store.is_empty());
  assert!(!target.is_baked());
  assert!(target.generated.is_empty());

  let simplify = progress.values_for("Simplify meshes");
  assert!(simplify.iter().all(|p| *p < 0.5));
  assert!(progress.values_for("Generating combined static meshes.").is_empty());
  assert_eq!(progress.clear_count(), 1);
}

#[test]
fn test_batch_failure_releases_everything() {
  let registry = test_registry(Arc::new(AtomicUsize::new(0)));
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(HlodSettings {
    batcher: strategy("failing"),
    ..default_settings()
  });

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);

  assert!(matches!(
    result,
    Err(HlodError::Stage {
      stage: Stage::Batch,
      ..
    })
  ));
  assert_eq!(allocator.live_count(), 0);
  assert!(store.is_empty());
  assert!(!target.is_baked());
  assert_eq!(progress.clear_count(), 1);
}

/// A streaming failure leaves no partial artifact set behind.
#[test]
fn test_stream_failure_discards_partial_assets() {
  let registry = test_registry(Arc::new(AtomicUsize::new(0)));
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(HlodSettings {
    streaming: strategy("halfway"),
    ..default_settings()
  });

  let (result, allocator) = bake(&registry, &mut store, &progress, &mut target);

  match result {
    Err(HlodError::Stage {
      stage: Stage::Stream,
      source,
    }) => assert_eq!(source.to_string(), "disk full"),
    other => panic!("unexpected result: {other:?}"),
  }
  assert!(store.get("hlod/partial.mesh").is_none());
  assert!(store.is_empty());
  assert!(target.generated.is_empty());
  assert!(target.controller.is_none());
  assert_eq!(allocator.live_count(), 0);
}

// =============================================================================
// Destroy
// =============================================================================

#[test]
fn test_destroy_removes_all_artifacts() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());
  bake(&registry, &mut store, &progress, &mut target).0.unwrap();
  assert!(!store.is_empty());

  destroy(&registry, &mut store, &progress, &mut target).unwrap();

  assert!(store.is_empty());
  assert!(target.generated.is_empty());
  assert!(!target.is_baked());
  assert!(!store.is_editing());

  let values = progress.values_for("Destroying HLOD files");
  assert_non_decreasing(&values);
  assert_eq!(values.first().copied(), Some(0.0));
  assert_eq!(values.last().copied(), Some(1.0));
  assert_eq!(progress.clear_count(), 2);
}

/// Entries that are `None` or whose asset is already gone are skipped.
#[test]
fn test_destroy_tolerates_missing_entries() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());
  bake(&registry, &mut store, &progress, &mut target).0.unwrap();

  let gone = target.generated[3].clone().unwrap();
  store.delete_asset(gone.path()).unwrap();
  target.generated.insert(0, None);
  target.generated.push(Some(AssetHandle("hlod/never_written.mesh".into())));

  destroy(&registry, &mut store, &progress, &mut target).unwrap();

  assert!(store.is_empty());
  assert!(target.generated.is_empty());
  assert!(!target.is_baked());
}

#[test]
fn test_destroy_unbaked_target_is_noop() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  store
    .write_asset("hlod/unrelated.mesh", crate::asset::AssetData::Mesh(Default::default()))
    .unwrap();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());

  destroy(&registry, &mut store, &progress, &mut target).unwrap();

  assert_eq!(store.len(), 1);
  assert!(progress.values().is_empty());
  assert!(!store.is_editing());
}

/// Failing deletions are all attempted and reported; everything else is gone.
#[test]
fn test_destroy_reports_failed_deletions() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = FlakyAssetStore::default();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());
  bake(&registry, &mut store, &progress, &mut target).0.unwrap();

  let locked: Vec<AssetHandle> = target.generated.iter().flatten().take(2).cloned().collect();
  store.failing_deletes = locked.iter().map(|h| h.path().to_owned()).collect();

  let result = destroy(&registry, &mut store, &progress, &mut target);

  match result {
    Err(HlodError::DestroyIncomplete { remaining, .. }) => {
      assert_eq!(remaining, store.failing_deletes);
    }
    other => panic!("unexpected result: {other:?}"),
  }
  assert_eq!(store.inner.len(), 2);
  assert_eq!(target.generated, locked.iter().cloned().map(Some).collect::<Vec<_>>());
  assert!(target.is_baked(), "controller kept while artifacts remain");
  assert_eq!(store.stop_editing_calls, 1);
  assert!(!store.inner.is_editing());
  assert_eq!(progress.clear_count(), 2);

  store.failing_deletes.clear();
  destroy(&registry, &mut store, &progress, &mut target).unwrap();
  assert!(store.inner.is_empty());
  assert!(!target.is_baked());
}

/// A session that cannot be closed is reported after every removal ran.
#[test]
fn test_destroy_surfaces_stop_editing_failure() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = FlakyAssetStore::default();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());
  bake(&registry, &mut store, &progress, &mut target).0.unwrap();
  store.fail_stop_editing = true;

  let result = destroy(&registry, &mut store, &progress, &mut target);

  assert!(matches!(
    result,
    Err(HlodError::AssetStore {
      stage: Stage::Destroy,
      ..
    })
  ));
  assert!(store.inner.is_empty());
  assert!(target.generated.is_empty());
  assert!(!target.is_baked());
  assert_eq!(store.stop_editing_calls, 1);
  assert_eq!(progress.clear_count(), 2);
}

// =============================================================================
// Rebuild
// =============================================================================

#[test]
fn test_rebuild_replaces_artifacts() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut target = town(default_settings());
  bake(&registry, &mut store, &progress, &mut target).0.unwrap();
  let before: Vec<String> = store.paths().map(str::to_owned).collect();

  let mut sink = progress.clone();
  let stats = HlodCreator::new(&registry, &mut store, &mut sink)
    .rebuild(&mut target)
    .unwrap();

  let after: Vec<String> = store.paths().map(str::to_owned).collect();
  assert_eq!(before, after);
  assert_eq!(stats.generated_count, after.len());
  assert!(target.is_baked());
}

#[test]
fn test_stats_count_each_bake_separately() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let mut sink = RecordingProgress::default();
  let allocator = Allocator::new();
  let mut first = town(default_settings());
  let mut second = town(default_settings());
  second.name = "Village".into();

  let mut creator =
    HlodCreator::new(&registry, &mut store, &mut sink).with_allocator(allocator.clone());
  let a = creator.create(&mut first).unwrap();
  let b = creator.create(&mut second).unwrap();

  assert_eq!(a.working_object_count, 16 * 3);
  assert_eq!(b.working_object_count, a.working_object_count);
  assert!(allocator.total_allocated() > a.working_object_count + b.working_object_count);
  assert_eq!(allocator.live_count(), 0);
}

/// Polygon-ratio simplification runs per node and keeps geometry at leaves.
#[test]
fn test_polygon_ratio_bake() {
  let registry = StrategyRegistry::with_builtins();
  let mut store = MemoryAssetStore::new();
  let progress = RecordingProgress::default();
  let mut options = StrategyOptions::new();
  options.insert("ratio".into(), toml::Value::Float(0.5));
  options.insert("min_polygon_count".into(), toml::Value::Integer(1));
  let mut target = town(HlodSettings {
    simplifier: StrategyConfig::with_options("polygon_ratio", options),
    ..default_settings()
  });

  bake(&registry, &mut store, &progress, &mut target).0.unwrap();

  let triangles = |path: &str| match store.get(path) {
    Some(crate::asset::AssetData::Mesh(mesh)) => mesh.indices.len() / 3,
    None => 0,
  };
  // a leaf holds one cube at full detail; the root holds 16 cubes at distance 2
  assert_eq!(triangles("hlod/Town_1_1.mesh"), 12);
  assert_eq!(triangles("hlod/Town.mesh"), 16 * 3);
}
