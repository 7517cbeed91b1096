//! Asset store contract: the persistent side channel a bake writes into.
//!
//! The bake brackets its writes with refresh/save and destroy brackets its
//! deletions with `start_editing`/`stop_editing`. [`MemoryAssetStore`] is the
//! in-process implementation used by tests and tools that keep results in
//! memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// Reference to a generated asset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetHandle(pub String);

impl AssetHandle {
  pub fn path(&self) -> &str {
    &self.0
  }
}

/// Serialized mesh payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshAsset {
  pub name: String,
  pub positions: Vec<[f32; 3]>,
  pub normals: Vec<[f32; 3]>,
  pub uvs: Vec<[f32; 2]>,
  pub indices: Vec<u32>,
  pub materials: Vec<String>,
}

/// Data written to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AssetData {
  Mesh(MeshAsset),
}

/// Persistent asset storage.
pub trait AssetStore {
  /// Pick up external changes before a bake.
  fn refresh(&mut self) -> Result<(), StageError>;

  /// Flush pending writes.
  fn save_assets(&mut self) -> Result<(), StageError>;

  /// Open a batched editing session.
  fn start_editing(&mut self) -> Result<(), StageError>;

  /// Close the editing session opened by `start_editing`.
  fn stop_editing(&mut self) -> Result<(), StageError>;

  /// Store `data` at `path`, replacing anything already there.
  fn write_asset(&mut self, path: &str, data: AssetData) -> Result<AssetHandle, StageError>;

  /// Current path of the asset, or `None` if it no longer exists.
  fn asset_path(&self, handle: &AssetHandle) -> Option<String>;

  /// Delete the asset at `path`. Returns false if nothing was there.
  fn delete_asset(&mut self, path: &str) -> Result<bool, StageError>;
}

/// In-memory asset store.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
  assets: BTreeMap<String, AssetData>,
  editing_depth: usize,
  refresh_count: usize,
}

impl MemoryAssetStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  pub fn get(&self, path: &str) -> Option<&AssetData> {
    self.assets.get(path)
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.assets.keys().map(String::as_str)
  }

  /// True while an editing session is open.
  pub fn is_editing(&self) -> bool {
    self.editing_depth > 0
  }

  pub fn refresh_count(&self) -> usize {
    self.refresh_count
  }
}

impl AssetStore for MemoryAssetStore {
  fn refresh(&mut self) -> Result<(), StageError> {
    self.refresh_count += 1;
    Ok(())
  }

  fn save_assets(&mut self) -> Result<(), StageError> {
    Ok(())
  }

  fn start_editing(&mut self) -> Result<(), StageError> {
    self.editing_depth += 1;
    Ok(())
  }

  fn stop_editing(&mut self) -> Result<(), StageError> {
    if self.editing_depth == 0 {
      return Err("stop_editing called without a matching start_editing".into());
    }
    self.editing_depth -= 1;
    Ok(())
  }

  fn write_asset(&mut self, path: &str, data: AssetData) -> Result<AssetHandle, StageError> {
    if path.is_empty() {
      return Err("asset path must not be empty".into());
    }
    self.assets.insert(path.to_owned(), data);
    Ok(AssetHandle(path.to_owned()))
  }

  fn asset_path(&self, handle: &AssetHandle) -> Option<String> {
    self
      .assets
      .contains_key(handle.path())
      .then(|| handle.path().to_owned())
  }

  fn delete_asset(&mut self, path: &str) -> Result<bool, StageError> {
    Ok(self.assets.remove(path).is_some())
  }
}
