//! Asset store backed by a directory, plus the bake manifest that records
//! what a target generated.

use anyhow::{Context, Result};
use hlod_core::{AssetData, AssetHandle, AssetStore, HlodController, HlodTarget, StageError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Writes assets as pretty JSON files below `root`.
pub struct DirectoryAssetStore {
	root: PathBuf,
	editing_depth: usize,
}

impl DirectoryAssetStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			editing_depth: 0,
		}
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Resolve a store-relative path, refusing anything that escapes `root`.
	fn resolve(&self, path: &str) -> Result<PathBuf, StageError> {
		let relative = Path::new(path);
		let escapes = relative
			.components()
			.any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
		if path.is_empty() || escapes {
			return Err(format!("invalid asset path {path:?}").into());
		}
		Ok(self.root.join(relative))
	}
}

impl AssetStore for DirectoryAssetStore {
	fn refresh(&mut self) -> Result<(), StageError> {
		std::fs::create_dir_all(&self.root)?;
		Ok(())
	}

	fn save_assets(&mut self) -> Result<(), StageError> {
		// writes go straight to disk
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
		let file = self.resolve(path)?;
		if let Some(parent) = file.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&file, serde_json::to_vec_pretty(&data)?)?;
		debug!(path = %file.display(), "asset written");
		Ok(AssetHandle(path.to_owned()))
	}

	fn asset_path(&self, handle: &AssetHandle) -> Option<String> {
		let file = self.resolve(handle.path()).ok()?;
		file.is_file().then(|| handle.path().to_owned())
	}

	fn delete_asset(&mut self, path: &str) -> Result<bool, StageError> {
		let file = self.resolve(path)?;
		match std::fs::remove_file(&file) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

// =============================================================================
// Manifest
// =============================================================================

pub const MANIFEST_FILE: &str = "hlod_manifest.json";

/// Baked state of one target, persisted next to its assets.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
	pub target: String,
	pub generated: Vec<Option<AssetHandle>>,
	pub controller: Option<HlodController>,
}

impl Manifest {
	pub fn from_target(target: &HlodTarget) -> Self {
		Self {
			target: target.name.clone(),
			generated: target.generated.clone(),
			controller: target.controller.clone(),
		}
	}

	/// Move the recorded state onto `target`.
	pub fn apply(self, target: &mut HlodTarget) {
		target.generated = self.generated;
		target.controller = self.controller;
	}

	/// Whether the manifest still tracks anything.
	pub fn is_empty(&self) -> bool {
		self.controller.is_none() && self.generated.iter().all(Option::is_none)
	}

	/// Load the manifest of `dir`, if there is one.
	pub fn load(dir: &Path) -> Result<Option<Self>> {
		let path = dir.join(MANIFEST_FILE);
		let content = match std::fs::read_to_string(&path) {
			Ok(content) => content,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
			Err(e) => {
				return Err(e).with_context(|| format!("Failed to read manifest: {}", path.display()))
			}
		};
		let manifest = serde_json::from_str(&content)
			.with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
		Ok(Some(manifest))
	}

	/// Write the manifest into `dir`, or remove it when it tracks nothing.
	pub fn store(&self, dir: &Path) -> Result<()> {
		let path = dir.join(MANIFEST_FILE);
		if self.is_empty() {
			match std::fs::remove_file(&path) {
				Err(e) if e.kind() != ErrorKind::NotFound => {
					return Err(e).with_context(|| format!("Failed to remove manifest: {}", path.display()))
				}
				_ => return Ok(()),
			}
		}
		std::fs::create_dir_all(dir)
			.with_context(|| format!("Failed to create output dir: {}", dir.display()))?;
		std::fs::write(&path, serde_json::to_vec_pretty(self)?)
			.with_context(|| format!("Failed to write manifest: {}", path.display()))
	}
}
