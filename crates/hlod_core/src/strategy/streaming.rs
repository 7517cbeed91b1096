//! Built-in streaming builder: one mesh asset per node plus a controller
//! mirroring the build-info tree.

use glam::DAffine3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::batcher::combine;
use super::{StreamingBuilder, StreamingOutput, StreamingRequest};
use crate::asset::{AssetData, AssetStore};
use crate::controller::{ControllerNode, HlodController};
use crate::error::StageError;

/// Options of [`HierarchyStreamingBuilder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HierarchyOptions {
  /// Directory (asset-store path prefix) that receives the node meshes.
  pub output_dir: String,
}

impl Default for HierarchyOptions {
  fn default() -> Self {
    Self {
      output_dir: "hlod".to_owned(),
    }
  }
}

/// Writes `<output_dir>/<target><node>.mesh` for every node with geometry.
#[derive(Clone, Debug, Default)]
pub struct HierarchyStreamingBuilder {
  options: HierarchyOptions,
}

impl HierarchyStreamingBuilder {
  pub fn new(options: HierarchyOptions) -> Self {
    Self { options }
  }

  /// Asset path of the node named `node_name`.
  pub fn asset_path(&self, target_name: &str, node_name: &str) -> String {
    let dir = self.options.output_dir.trim_end_matches('/');
    if dir.is_empty() {
      format!("{target_name}{node_name}.mesh")
    } else {
      format!("{dir}/{target_name}{node_name}.mesh")
    }
  }
}

impl StreamingBuilder for HierarchyStreamingBuilder {
  fn build(
    &self,
    request: StreamingRequest<'_>,
    assets: &mut dyn AssetStore,
    output: &mut StreamingOutput,
    on_progress: &mut dyn FnMut(f32),
  ) -> Result<(), StageError> {
    let target = request.target;
    let to_target = DAffine3::from_translation(-target.position);
    let total = request.build_infos.len().max(1) as f32;
    let mut nodes = Vec::with_capacity(request.build_infos.len());

    for (i, info) in request.build_infos.iter().enumerate() {
      let mut node_assets = Vec::new();
      if !info.objects.is_empty() {
        let (mesh, materials) = combine(info.objects.iter().map(|o| &o.object), &to_target)?;
        let path = self.asset_path(&target.name, &info.name);
        let name = format!("{}{}", target.name, info.name);
        let handle = assets.write_asset(&path, AssetData::Mesh(mesh.to_asset(&name, &materials)))?;
        debug!(path = %path, triangles = mesh.triangle_count(), "node mesh written");

        output.generated.push(handle.clone());
        node_assets.push(handle);
      }

      nodes.push(ControllerNode {
        name: info.name.clone(),
        parent: info.parent_index,
        bounds: *info.target.bounds(),
        assets: node_assets,
      });
      on_progress((i + 1) as f32 / total);
    }

    output.controller = Some(HlodController {
      nodes,
      cull_distance: request.cull_distance,
      lod_distance: request.lod_distance,
    });
    if request.build_infos.is_empty() {
      on_progress(1.0);
    }
    Ok(())
  }
}
