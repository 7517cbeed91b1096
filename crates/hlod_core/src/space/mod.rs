//! Space module: recursive spatial subdivision of the scene.
//!
//! The tree is built once per bake by a [`SpaceSplitter`] and is read-only
//! afterwards. Every input object ends up in exactly one node.
//!
//! # Layout
//!
//! ```text
//!              ┌───────────────┬───────────────┐
//!              │               │               │
//!              │      _3       │      _4       │     +Z
//!              │               │               │      ▲
//!              ├───────────────┼───────────────┤      │
//!              │               │               │      └──► +X
//!              │      _1       │      _2       │
//!              │               │               │
//!              └───────────────┴───────────────┘
//! ```
//!
//! Children are ordered X-fastest; the build-info names above are the
//! `_<childIndex+1>` suffixes appended to the parent name.
//!
//! # Module Structure
//!
//! - [`node`]: `SpaceNode` - one cell of the tree
//! - [`config`]: `SplitterConfig` - cell size, depth and lattice origin
//! - [`quad_tree`]: `QuadTreeSpaceSplitter` - loose quadtree on X/Z

pub mod config;
pub mod node;
pub mod quad_tree;

// Re-exports
pub use config::{SplitterConfig, MIN_CELL_SIZE};
pub use node::SpaceNode;
pub use quad_tree::QuadTreeSpaceSplitter;

use std::sync::Arc;

use crate::bounds::Aabb;
use crate::scene::SceneObject;

/// Builds a [`SpaceNode`] tree over a set of objects.
pub trait SpaceSplitter {
  /// Split `bounds` and assign every object to one node.
  ///
  /// `on_progress` receives non-decreasing values in [0, 1] as objects are
  /// assigned.
  fn create_space_tree(
    &self,
    bounds: Aabb,
    objects: &[Arc<SceneObject>],
    on_progress: &mut dyn FnMut(f32),
  ) -> SpaceNode;
}
