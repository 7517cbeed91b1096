//! SpaceNode - one cell of the space subdivision tree.

use std::sync::Arc;

use crate::bounds::Aabb;
use crate::scene::SceneObject;

/// One cell of the spatial subdivision.
///
/// A node is a leaf iff it has no children. Children, when present, are a
/// fixed 4-way X/Z subdivision of the node's bounds.
#[derive(Clone, Debug)]
pub struct SpaceNode {
  bounds: Aabb,
  depth: u32,
  children: Vec<SpaceNode>,
  objects: Vec<Arc<SceneObject>>,
}

impl SpaceNode {
  /// Create an empty leaf at the given depth.
  pub fn new(bounds: Aabb, depth: u32) -> Self {
    Self {
      bounds,
      depth,
      children: Vec::new(),
      objects: Vec::new(),
    }
  }

  #[inline]
  pub fn bounds(&self) -> &Aabb {
    &self.bounds
  }

  /// Depth below the root (root = 0).
  #[inline]
  pub fn depth(&self) -> u32 {
    self.depth
  }

  #[inline]
  pub fn children(&self) -> &[SpaceNode] {
    &self.children
  }

  #[inline]
  pub fn child(&self, index: usize) -> Option<&SpaceNode> {
    self.children.get(index)
  }

  #[inline]
  pub fn child_count(&self) -> usize {
    self.children.len()
  }

  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  /// Objects assigned to this cell (not its descendants).
  #[inline]
  pub fn objects(&self) -> &[Arc<SceneObject>] {
    &self.objects
  }

  /// Pre-order traversal of this node and all descendants.
  pub fn iter(&self) -> impl Iterator<Item = &SpaceNode> {
    let mut stack = vec![self];
    std::iter::from_fn(move || {
      let node = stack.pop()?;
      stack.extend(node.children.iter().rev());
      Some(node)
    })
  }

  /// All leaf cells below (or equal to) this node.
  pub fn leaves(&self) -> impl Iterator<Item = &SpaceNode> {
    self.iter().filter(|n| n.is_leaf())
  }

  /// Total number of nodes in this subtree.
  pub fn node_count(&self) -> usize {
    self.iter().count()
  }

  /// Total number of objects assigned anywhere in this subtree.
  pub fn object_count(&self) -> usize {
    self.iter().map(|n| n.objects.len()).sum()
  }

  pub(crate) fn set_children(&mut self, children: Vec<SpaceNode>) {
    debug_assert!(self.children.is_empty(), "node already subdivided");
    self.children = children;
  }

  pub(crate) fn children_mut(&mut self) -> &mut [SpaceNode] {
    &mut self.children
  }

  pub(crate) fn push_object(&mut self, object: Arc<SceneObject>) {
    self.objects.push(object);
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
