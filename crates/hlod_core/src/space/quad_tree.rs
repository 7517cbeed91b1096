//! Loose quadtree splitter.
//!
//! Cells split 4-way on the X/Z plane, lazily, as objects are pushed down.
//! An object descends into the first child whose loose bounds (the cell grown
//! by `loose_size` on X/Z) contain it; if none does, it stays in the current
//! cell. Splitting stops at `min_size` or `max_depth`, whichever comes first.

use std::sync::Arc;

use glam::DVec3;
use tracing::debug;

use super::{SpaceNode, SpaceSplitter, SplitterConfig};
use crate::bounds::Aabb;
use crate::scene::SceneObject;

/// Quadtree space splitter.
#[derive(Clone, Debug, Default)]
pub struct QuadTreeSpaceSplitter {
  config: SplitterConfig,
}

impl QuadTreeSpaceSplitter {
  pub fn new(config: SplitterConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &SplitterConfig {
    &self.config
  }

  /// The four X/Z quadrants of `node`, X-fastest.
  fn subdivide(node: &SpaceNode) -> Vec<SpaceNode> {
    let bounds = node.bounds();
    let half = bounds.size() * 0.5;
    (0..4u8)
      .map(|quadrant| {
        let offset = DVec3::new(
          (quadrant & 1) as f64 * half.x,
          0.0,
          ((quadrant >> 1) & 1) as f64 * half.z,
        );
        let min = bounds.min + offset;
        let max = DVec3::new(min.x + half.x, bounds.max.y, min.z + half.z);
        SpaceNode::new(Aabb::new(min, max), node.depth() + 1)
      })
      .collect()
  }

  fn insert(&self, node: &mut SpaceNode, object: &Arc<SceneObject>, object_bounds: &Aabb) {
    if self.config.can_split(node.bounds().size().x, node.depth()) {
      if node.is_leaf() {
        let children = Self::subdivide(node);
        node.set_children(children);
      }

      let loose_size = self.config.loose_size;
      if let Some(child) = node
        .children_mut()
        .iter_mut()
        .find(|child| child.bounds().expand_xz(loose_size).contains_aabb_xz(object_bounds))
      {
        self.insert(child, object, object_bounds);
        return;
      }
    }

    node.push_object(Arc::clone(object));
  }
}

impl SpaceSplitter for QuadTreeSpaceSplitter {
  #[tracing::instrument(skip_all, name = "space::create_space_tree")]
  fn create_space_tree(
    &self,
    bounds: Aabb,
    objects: &[Arc<SceneObject>],
    on_progress: &mut dyn FnMut(f32),
  ) -> SpaceNode {
    let mut root = SpaceNode::new(self.config.root_bounds(&bounds), 0);

    if objects.is_empty() {
      on_progress(1.0);
      return root;
    }

    let total = objects.len() as f32;
    for (i, object) in objects.iter().enumerate() {
      let object_bounds = object.bounds();
      self.insert(&mut root, object, &object_bounds);
      on_progress((i + 1) as f32 / total);
    }

    debug!(
      nodes = root.node_count(),
      objects = objects.len(),
      "space tree built"
    );
    root
  }
}

#[cfg(test)]
#[path = "quad_tree_test.rs"]
mod quad_tree_test;
