//! Built-in batcher: one combined mesh per node.

use glam::{DAffine3, DVec3};

use super::Batcher;
use crate::bounds::Aabb;
use crate::build_info::{BuildInfo, BuildObject};
use crate::error::{MeshIndexOverflow, StageError};
use crate::working::{WorkingMesh, WorkingObject};

/// Merges every working object of a node into one mesh, expressed relative
/// to the batch origin.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleBatcher;

impl Batcher for SimpleBatcher {
  fn batch(
    &self,
    origin: DVec3,
    build_infos: &mut [BuildInfo<'_>],
    on_progress: &mut dyn FnMut(f32),
  ) -> Result<(), StageError> {
    let total = build_infos.len().max(1) as f32;
    let to_origin = DAffine3::from_translation(-origin);

    for (i, info) in build_infos.iter_mut().enumerate() {
      if let Some(first) = info.objects.first() {
        let allocator = first.object.allocator().clone();
        let distance = info.objects.iter().map(|o| o.distance).min().unwrap_or(0);
        let bounds = info
          .objects
          .iter()
          .map(|o| o.object.bounds)
          .reduce(|a, b| a.union(&b))
          .unwrap_or_else(|| Aabb::from_point(origin));
        let (mesh, materials) = combine(info.objects.iter().map(|o| &o.object), &to_origin)?;

        let combined = WorkingObject::new(
          format!("combined{}", info.name),
          mesh,
          materials,
          DAffine3::from_translation(origin),
          bounds,
          &allocator,
        );
        info.replace_objects(vec![BuildObject {
          object: combined,
          distance,
        }]);
      }
      on_progress((i + 1) as f32 / total);
    }

    if build_infos.is_empty() {
      on_progress(1.0);
    }
    Ok(())
  }
}

/// Concatenate `objects` into one mesh in the space given by `to_space`
/// (applied after each object's own transform). Materials are deduplicated
/// in first-seen order.
pub(crate) fn combine<'o>(
  objects: impl Iterator<Item = &'o WorkingObject>,
  to_space: &DAffine3,
) -> Result<(WorkingMesh, Vec<String>), MeshIndexOverflow> {
  let mut mesh = WorkingMesh::default();
  let mut materials: Vec<String> = Vec::new();

  for object in objects {
    mesh.append(&object.mesh.transformed(&(*to_space * object.transform)))?;
    for material in &object.materials {
      if !materials.contains(material) {
        materials.push(material.clone());
      }
    }
  }

  Ok((mesh, materials))
}
