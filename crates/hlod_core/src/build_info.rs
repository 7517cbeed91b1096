//! Build-info tree: one [`BuildInfo`] per space node, in breadth-first order.
//!
//! Every node's qualifying renderers are converted to working objects and
//! appended to the node itself and to each of its ancestors, with a distance
//! equal to the number of levels walked upward. The root therefore ends up
//! holding the geometry of the whole scene, at the coarsest distances.
//!
//! ```text
//!   index  name   parent  objects
//!   0      ""     None    a@1 b@1 c@2
//!   1      "_1"   0       a@0 b@0 c@1
//!   2      "_1_3" 1       c@0
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::scene::{Renderer, RendererKind, SceneObject};
use crate::space::SpaceNode;
use crate::working::{Allocator, Dispose, DisposableList, WorkingObject};

/// A working object together with its LOD distance at the owning node.
#[derive(Debug)]
pub struct BuildObject {
  pub object: WorkingObject,
  /// Levels between the node the object was assigned to and this node.
  pub distance: u32,
}

impl Dispose for BuildObject {
  fn dispose(&mut self) {
    self.object.dispose();
  }
}

/// Per-node bake record.
#[derive(Debug)]
pub struct BuildInfo<'a> {
  /// `""` for the root; children append `_<index + 1>`.
  pub name: String,
  /// Index of the parent in the flat list; `None` for the root.
  pub parent_index: Option<usize>,
  pub target: &'a SpaceNode,
  pub objects: Vec<BuildObject>,
}

impl<'a> BuildInfo<'a> {
  pub fn new(name: impl Into<String>, parent_index: Option<usize>, target: &'a SpaceNode) -> Self {
    Self {
      name: name.into(),
      parent_index,
      target,
      objects: Vec::new(),
    }
  }

  pub fn is_root(&self) -> bool {
    self.parent_index.is_none()
  }

  /// Replace the object list, disposing the previous contents.
  pub fn replace_objects(&mut self, objects: Vec<BuildObject>) {
    for mut old in std::mem::replace(&mut self.objects, objects) {
      old.dispose();
    }
  }
}

impl Dispose for BuildInfo<'_> {
  fn dispose(&mut self) {
    for object in &mut self.objects {
      object.dispose();
    }
    self.objects.clear();
  }
}

/// Renderers of `objects` that take part in the bake.
///
/// An object with an LOD group contributes its lowest-detail level only;
/// other objects contribute their own renderers. Only mesh renderers whose
/// largest bounds dimension reaches `threshold` qualify.
pub fn collect_mesh_renderers(
  objects: &[Arc<SceneObject>],
  threshold: f32,
) -> SmallVec<[&Renderer; 8]> {
  let threshold = threshold as f64;
  let mut renderers = SmallVec::new();

  for object in objects {
    let candidates: &[Renderer] = match &object.lod_group {
      Some(group) => group
        .lowest_detail()
        .map(|lod| lod.renderers.as_slice())
        .unwrap_or(&[]),
      None => &object.renderers,
    };

    renderers.extend(
      candidates
        .iter()
        .filter(|r| r.kind == RendererKind::Mesh)
        .filter(|r| r.max_dimension() >= threshold),
    );
  }

  renderers
}

/// Build the flat build-info list for the tree rooted at `root`.
///
/// Nodes are visited breadth-first, so every parent index is smaller than the
/// index of its child. Nodes without qualifying renderers still get an entry.
#[tracing::instrument(skip_all, name = "build_info::create")]
pub fn create_build_info<'a>(
  root: &'a SpaceNode,
  threshold: f32,
  allocator: &Allocator,
) -> DisposableList<BuildInfo<'a>> {
  let mut results = DisposableList::with_capacity(root.node_count());

  let mut travel_queue: VecDeque<&'a SpaceNode> = VecDeque::new();
  let mut parent_queue: VecDeque<Option<usize>> = VecDeque::new();
  let mut name_queue: VecDeque<String> = VecDeque::new();

  travel_queue.push_back(root);
  parent_queue.push_back(None);
  name_queue.push_back(String::new());

  while let (Some(node), Some(parent_index), Some(name)) = (
    travel_queue.pop_front(),
    parent_queue.pop_front(),
    name_queue.pop_front(),
  ) {
    let current_index = results.len();

    for (i, child) in node.children().iter().enumerate() {
      travel_queue.push_back(child);
      parent_queue.push_back(Some(current_index));
      name_queue.push_back(format!("{name}_{}", i + 1));
    }

    results.push(BuildInfo::new(name, parent_index, node));

    let renderers = collect_mesh_renderers(node.objects(), threshold);
    if renderers.is_empty() {
      continue;
    }

    let mut cursor = Some(current_index);
    let mut distance = 0u32;
    while let Some(index) = cursor {
      let info = &mut results[index];
      info.objects.extend(renderers.iter().map(|renderer| BuildObject {
        object: WorkingObject::from_renderer(renderer, allocator),
        distance,
      }));
      cursor = info.parent_index;
      distance += 1;
    }
  }

  debug!(
    infos = results.len(),
    working_objects = allocator.live_count(),
    "build info created"
  );
  results
}

#[cfg(test)]
#[path = "build_info_test.rs"]
mod build_info_test;
