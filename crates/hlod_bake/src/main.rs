//! HLOD baker.
//!
//! Bakes a JSON scene description into per-region combined meshes plus a
//! manifest describing the streaming hierarchy, and removes them again.
//!
//! Output layout:
//! - `<out>/<output_dir>/<target><node>.mesh`: combined mesh per node (JSON)
//! - `<out>/hlod_manifest.json`: generated assets and controller hierarchy

mod config;
mod progress;
mod scene_file;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::DVec3;
use hlod_core::{HlodCreator, HlodError, HlodSettings, HlodTarget, StrategyKind, StrategyRegistry};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use progress::LogProgress;
use scene_file::SceneFile;
use store::{DirectoryAssetStore, Manifest};

/// Hierarchical LOD baker.
#[derive(Parser, Debug)]
#[command(name = "hlod_bake")]
#[command(about = "Bakes scene descriptions into streamable HLOD meshes")]
struct Args {
	/// Enable debug logging.
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Bake the HLOD of a scene.
	Bake {
		/// Path to configuration TOML file.
		#[arg(short, long)]
		config: PathBuf,

		/// Path to scene JSON file.
		#[arg(short, long)]
		scene: PathBuf,

		/// Output directory (default: next to the config file).
		#[arg(short, long)]
		out: Option<PathBuf>,

		/// Destroy an existing bake first.
		#[arg(long)]
		force: bool,
	},

	/// Remove a previous bake.
	Destroy {
		/// Output directory of the bake.
		#[arg(short, long)]
		out: PathBuf,
	},

	/// List the registered strategies.
	Strategies,
}

fn main() -> Result<()> {
	let args = Args::parse();

	let filter = if args.verbose {
		EnvFilter::new("debug")
	} else {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
	};
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	let registry = StrategyRegistry::with_builtins();

	match args.command {
		Command::Bake {
			config,
			scene,
			out,
			force,
		} => {
			let out = out.unwrap_or_else(|| config.parent().unwrap_or(Path::new(".")).to_path_buf());
			bake(&registry, &config, &scene, &out, force)
		}
		Command::Destroy { out } => destroy(&registry, &out),
		Command::Strategies => {
			for kind in [
				StrategyKind::Simplifier,
				StrategyKind::Batcher,
				StrategyKind::StreamingBuilder,
			] {
				println!("{kind}: {}", registry.type_ids(kind).join(", "));
			}
			Ok(())
		}
	}
}

fn bake(registry: &StrategyRegistry, config: &Path, scene: &Path, out: &Path, force: bool) -> Result<()> {
	info!(config = %config.display(), scene = %scene.display(), out = %out.display(), "baking");

	let config = Config::load(config)?;
	let objects = SceneFile::load(scene)?.to_objects()?;

	let mut target = HlodTarget::new(config.target.name.clone(), config.target.position(), config.hlod);
	for object in objects {
		target.add_object(object);
	}

	if let Some(manifest) = Manifest::load(out)? {
		if manifest.target != target.name {
			anyhow::bail!(
				"{} already holds a bake of target {:?}; destroy it first",
				out.display(),
				manifest.target
			);
		}
		manifest.apply(&mut target);
	}

	let mut store = DirectoryAssetStore::new(out);
	let mut progress = LogProgress::default();
	let mut creator = HlodCreator::new(registry, &mut store, &mut progress);

	let result = if force {
		creator.rebuild(&mut target)
	} else {
		creator.create(&mut target)
	};
	// a failed rebuild may have destroyed the previous bake
	let stats = store_manifest(&target, out, result, "bake")?;

	info!(
		nodes = stats.node_count,
		working_objects = stats.working_object_count,
		assets = stats.generated_count,
		total_ms = stats.total_us / 1000,
		"bake finished"
	);
	println!(
		"Baked {} nodes into {} assets in {}",
		stats.node_count,
		stats.generated_count,
		out.display()
	);
	Ok(())
}

fn destroy(registry: &StrategyRegistry, out: &Path) -> Result<()> {
	let Some(manifest) = Manifest::load(out)? else {
		warn!(out = %out.display(), "no bake found");
		return Ok(());
	};

	let mut target = HlodTarget::new(manifest.target.clone(), DVec3::ZERO, HlodSettings::default());
	manifest.apply(&mut target);

	let mut store = DirectoryAssetStore::new(out);
	let mut progress = LogProgress::default();
	let result = HlodCreator::new(registry, &mut store, &mut progress).destroy(&mut target);

	store_manifest(&target, out, result, "destroy")?;

	println!("Removed bake of {} from {}", target.name, out.display());
	Ok(())
}

/// Record what `target` still owns, then surface `result`.
///
/// A manifest write failure only wins when the operation itself succeeded.
fn store_manifest<T>(target: &HlodTarget, out: &Path, result: Result<T, HlodError>, action: &str) -> Result<T> {
	let stored = Manifest::from_target(target).store(out);
	let value = result.with_context(|| format!("Failed to {action} target {:?}", target.name));
	match (value, stored) {
		(Ok(value), stored) => stored.map(|()| value),
		(Err(error), Ok(())) => Err(error),
		(Err(error), Err(store_error)) => {
			error!(out = %out.display(), error = ?store_error, "failed to store manifest");
			Err(error)
		}
	}
}
