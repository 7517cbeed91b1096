//! hlod_core - Engine independent hierarchical LOD baking
//!
//! This crate builds the spatial hierarchy and drives the bake that turns a
//! scene of many small renderers into a few streamable combined meshes per
//! region. The bake is split into pluggable stages so engines can bring their
//! own mesh simplification, batching and asset streaming.
//!
//! # Features
//!
//! - **Space splitting**: Loose quadtree over the X/Z plane, aligned to a
//!   lattice anchored at the target position
//! - **Build info**: Flat breadth-first node list where every node carries
//!   the geometry of its whole subtree, tagged with its LOD distance
//! - **Branch concurrency**: One simplification branch per node on the rayon
//!   pool, joined with aggregated progress and first-failure reporting
//! - **Create/Destroy**: Resource-safe bake orchestration with rollback of
//!   partial results and tolerant artifact removal
//!
//! # Example
//!
//! ```ignore
//! use hlod_core::{HlodCreator, HlodSettings, HlodTarget, MemoryAssetStore, NullProgress};
//! use hlod_core::StrategyRegistry;
//!
//! let mut target = HlodTarget::new("Town", DVec3::ZERO, HlodSettings::default());
//! // add scene objects...
//!
//! let registry = StrategyRegistry::with_builtins();
//! let mut store = MemoryAssetStore::new();
//! let mut progress = NullProgress;
//!
//! let stats = HlodCreator::new(&registry, &mut store, &mut progress).create(&mut target)?;
//! println!("{} nodes, {} assets", stats.node_count, stats.generated_count);
//! ```

pub mod asset;
pub mod bounds;
pub mod config;
pub mod controller;
pub mod error;
pub mod scene;

// Re-export commonly used items
pub use asset::{AssetData, AssetHandle, AssetStore, MemoryAssetStore, MeshAsset};
pub use bounds::Aabb;
pub use config::{HlodSettings, StrategyConfig, StrategyOptions};
pub use controller::{ControllerNode, HlodController};
pub use error::{BranchError, HlodError, MeshIndexOverflow, Stage, StageError, StrategyKind};
pub use scene::{HlodTarget, Lod, LodGroup, MeshSource, Renderer, RendererKind, SceneObject};

// Spatial subdivision
pub mod space;
pub use space::{QuadTreeSpaceSplitter, SpaceNode, SpaceSplitter, SplitterConfig};

// Working copies and per-node build lists
pub mod working;
pub use working::{Allocator, DisposableList, Dispose, WorkingMesh, WorkingObject};

pub mod build_info;
pub use build_info::{create_build_info, BuildInfo, BuildObject};

// Fan-out/join of concurrent branches
pub mod branch;
pub use branch::{BranchProgress, BranchSet};

pub mod progress;
pub use progress::{NullProgress, ProgressSink};

// Pluggable bake stages
pub mod strategy;
pub use strategy::{Batcher, Simplifier, StrategyRegistry, StreamingBuilder};

// Bake orchestration
pub mod creator;
pub use creator::{BakeStats, HlodCreator};

#[cfg(test)]
pub mod test_utils;
