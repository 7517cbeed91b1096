//! Configuration parsing for HLOD baking.

use anyhow::{Context, Result};
use glam::DVec3;
use hlod_core::HlodSettings;
use serde::Deserialize;
use std::path::Path;

/// Root configuration for one bake.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// The HLOD target the scene is baked into.
	pub target: TargetConfig,
	/// Bake settings; missing keys use the defaults of a new target.
	#[serde(default)]
	pub hlod: HlodSettings,
}

/// Name and placement of the HLOD target.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
	/// Prefix of every generated asset.
	pub name: String,
	/// World-space origin [X, Y, Z]; anchors the split lattice.
	#[serde(default)]
	pub position: [f64; 3],
}

impl TargetConfig {
	pub fn position(&self) -> DVec3 {
		DVec3::from_array(self.position)
	}
}

impl Config {
	/// Load configuration from a TOML file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {}", path.display()))?;
		Self::parse(&content)
	}

	/// Parse and validate configuration TOML.
	pub fn parse(content: &str) -> Result<Self> {
		let config: Config = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;

		if config.target.name.trim().is_empty() {
			anyhow::bail!("target.name must not be empty");
		}
		if config.target.name.contains(['/', '\\']) {
			anyhow::bail!("target.name must not contain path separators, got {:?}", config.target.name);
		}
		if !(config.hlod.min_size > 0.0) {
			anyhow::bail!("hlod.min_size must be positive, got {}", config.hlod.min_size);
		}
		if config.hlod.loose_size < 0.0 {
			anyhow::bail!("hlod.loose_size must not be negative, got {}", config.hlod.loose_size);
		}
		if config.hlod.threshold_size < 0.0 {
			anyhow::bail!(
				"hlod.threshold_size must not be negative, got {}",
				config.hlod.threshold_size
			);
		}

		Ok(config)
	}
}
