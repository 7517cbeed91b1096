//! JSON scene description.
//!
//! Renderers are described as boxes (center and full size), which is enough
//! to lay out and bake placeholder scenes without a mesh importer.
//!
//! ```json
//! {
//!   "objects": [
//!     { "name": "house", "position": [4, 0, 4],
//!       "renderers": [{ "name": "walls", "center": [4, 2, 4], "size": [6, 4, 6] }] },
//!     { "name": "tree", "position": [12, 0, 3],
//!       "lods": [[{ "name": "tree_lod0", "center": [12, 3, 3], "size": [3, 6, 3] }],
//!                [{ "name": "tree_lod1", "center": [12, 3, 3], "size": [2, 6, 2] }]] }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use glam::DVec3;
use hlod_core::{Lod, LodGroup, Renderer, RendererKind, SceneObject};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneFile {
	pub objects: Vec<ObjectDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDesc {
	pub name: String,
	pub position: [f64; 3],
	#[serde(default)]
	pub renderers: Vec<RendererDesc>,
	/// LOD levels, finest first. Present means the object has an LOD group.
	#[serde(default)]
	pub lods: Option<Vec<Vec<RendererDesc>>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RendererDesc {
	pub name: String,
	pub center: [f64; 3],
	pub size: [f64; 3],
	#[serde(default)]
	pub kind: KindDesc,
	#[serde(default)]
	pub materials: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindDesc {
	#[default]
	Mesh,
	SkinnedMesh,
	Other,
}

impl From<KindDesc> for RendererKind {
	fn from(kind: KindDesc) -> Self {
		match kind {
			KindDesc::Mesh => RendererKind::Mesh,
			KindDesc::SkinnedMesh => RendererKind::SkinnedMesh,
			KindDesc::Other => RendererKind::Other,
		}
	}
}

impl RendererDesc {
	fn to_renderer(&self) -> Result<Renderer> {
		let size = DVec3::from_array(self.size);
		if !size.is_finite() || size.min_element() < 0.0 {
			anyhow::bail!("renderer {:?} has an invalid size {:?}", self.name, self.size);
		}
		Ok(
			Renderer::cuboid(self.name.clone(), DVec3::from_array(self.center), size)
				.with_kind(self.kind.into())
				.with_materials(self.materials.clone()),
		)
	}
}

impl SceneFile {
	/// Load a scene from a JSON file.
	pub fn load(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read scene file: {}", path.display()))?;
		serde_json::from_str(&content)
			.with_context(|| format!("Failed to parse scene JSON: {}", path.display()))
	}

	/// Convert the description into scene objects.
	pub fn to_objects(&self) -> Result<Vec<SceneObject>> {
		self
			.objects
			.iter()
			.map(|desc| {
				let mut object = SceneObject::new(desc.name.clone(), DVec3::from_array(desc.position));
				for renderer in &desc.renderers {
					object = object.with_renderer(renderer.to_renderer()?);
				}
				if let Some(levels) = &desc.lods {
					let lods = levels
						.iter()
						.map(|level| {
							Ok(Lod {
								renderers: level.iter().map(RendererDesc::to_renderer).collect::<Result<_>>()?,
							})
						})
						.collect::<Result<Vec<_>>>()?;
					object = object.with_lod_group(LodGroup { lods });
				}
				Ok(object)
			})
			.collect::<Result<Vec<_>>>()
			.with_context(|| "Invalid scene description")
	}
}
