//! HlodController - the streamable hierarchy attached to a baked target.
//!
//! Mirrors the build-info tree: one node per space cell, flat storage with
//! parent indices, each node pointing at the assets that render it.

use serde::{Deserialize, Serialize};

use crate::asset::AssetHandle;
use crate::bounds::Aabb;

/// One level of the streamed hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerNode {
  /// Hierarchical name (root = "", children append `_<n>`).
  pub name: String,
  /// Index of the parent node, `None` for the root.
  pub parent: Option<usize>,
  /// Space cell covered by this node.
  pub bounds: Aabb,
  /// Combined geometry for this node, if it has any.
  pub assets: Vec<AssetHandle>,
}

/// Baked-state marker and streaming hierarchy of an HLOD target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HlodController {
  pub nodes: Vec<ControllerNode>,
  pub cull_distance: f32,
  pub lod_distance: f32,
}

impl HlodController {
  /// Root node of the hierarchy.
  pub fn root(&self) -> Option<&ControllerNode> {
    self.nodes.first()
  }

  /// Indices of the direct children of `index`.
  pub fn children_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .filter(move |(_, n)| n.parent == Some(index))
      .map(|(i, _)| i)
  }
}
