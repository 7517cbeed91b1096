//! Scene model consumed by the bake: renderers, LOD groups, objects and the
//! HLOD target that owns them.
//!
//! The model is deliberately engine-agnostic. Engine bridges convert their own
//! renderer components into [`Renderer`] values before baking.

use std::sync::Arc;

use glam::{DAffine3, DVec3, Vec2, Vec3};

use crate::asset::AssetHandle;
use crate::bounds::Aabb;
use crate::config::HlodSettings;
use crate::controller::HlodController;

/// Renderer component type. Only [`RendererKind::Mesh`] takes part in HLOD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererKind {
  /// Static mesh renderer.
  Mesh,
  /// Skinned (animated) mesh renderer.
  SkinnedMesh,
  /// Anything else (particles, lines, ...).
  Other,
}

/// Shared source geometry, in renderer-local space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshSource {
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub uvs: Vec<Vec2>,
  pub indices: Vec<u32>,
}

impl MeshSource {
  /// Number of whole triangles in the index buffer.
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Axis-aligned box mesh with the given full size, centered on the origin.
  pub fn cuboid(size: Vec3) -> Self {
    let h = size * 0.5;
    // (normal, tangent u, tangent v) per face
    let faces = [
      (Vec3::X, Vec3::Z, Vec3::Y),
      (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
      (Vec3::Y, Vec3::X, Vec3::Z),
      (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
      (Vec3::Z, Vec3::NEG_X, Vec3::Y),
      (Vec3::NEG_Z, Vec3::X, Vec3::Y),
    ];

    let mut mesh = MeshSource::default();
    for (normal, u, v) in faces {
      let base = mesh.positions.len() as u32;
      for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
        mesh.positions.push((normal + u * su + v * sv) * h);
        mesh.normals.push(normal);
        mesh.uvs.push(Vec2::new((su + 1.0) * 0.5, (sv + 1.0) * 0.5));
      }
      mesh
        .indices
        .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
  }
}

/// A renderer component snapshot.
#[derive(Clone, Debug)]
pub struct Renderer {
  pub name: String,
  pub kind: RendererKind,
  /// World-space bounds.
  pub bounds: Aabb,
  /// Local-to-world transform of the mesh.
  pub transform: DAffine3,
  pub mesh: Arc<MeshSource>,
  pub materials: Vec<String>,
}

impl Renderer {
  /// Mesh renderer whose world bounds are derived from the mesh and transform.
  pub fn mesh(name: impl Into<String>, mesh: Arc<MeshSource>, transform: DAffine3) -> Self {
    let bounds = world_bounds(&mesh, &transform);
    Self {
      name: name.into(),
      kind: RendererKind::Mesh,
      bounds,
      transform,
      mesh,
      materials: Vec::new(),
    }
  }

  /// Axis-aligned box mesh renderer centered at `center`.
  pub fn cuboid(name: impl Into<String>, center: DVec3, size: DVec3) -> Self {
    Self::mesh(
      name,
      Arc::new(MeshSource::cuboid(size.as_vec3())),
      DAffine3::from_translation(center),
    )
  }

  pub fn with_kind(mut self, kind: RendererKind) -> Self {
    self.kind = kind;
    self
  }

  pub fn with_materials(mut self, materials: Vec<String>) -> Self {
    self.materials = materials;
    self
  }

  /// Largest world-space bounds dimension, the quantity compared against the
  /// bake threshold.
  pub fn max_dimension(&self) -> f64 {
    self.bounds.max_dimension()
  }
}

fn world_bounds(mesh: &MeshSource, transform: &DAffine3) -> Aabb {
  let mut points = mesh
    .positions
    .iter()
    .map(|p| transform.transform_point3(p.as_dvec3()));
  match points.next() {
    Some(first) => points.fold(Aabb::from_point(first), |mut acc, p| {
      acc.encapsulate(&Aabb::from_point(p));
      acc
    }),
    None => Aabb::from_point(transform.translation),
  }
}

/// One detail level of an LOD group.
#[derive(Clone, Debug, Default)]
pub struct Lod {
  pub renderers: Vec<Renderer>,
}

/// Ordered detail levels, finest first.
#[derive(Clone, Debug, Default)]
pub struct LodGroup {
  pub lods: Vec<Lod>,
}

impl LodGroup {
  /// The coarsest detail level, if any.
  pub fn lowest_detail(&self) -> Option<&Lod> {
    self.lods.last()
  }
}

/// A scene object that may contribute geometry to the HLOD.
#[derive(Clone, Debug)]
pub struct SceneObject {
  pub name: String,
  pub position: DVec3,
  pub lod_group: Option<LodGroup>,
  /// Renderer components attached directly to the object.
  pub renderers: Vec<Renderer>,
}

impl SceneObject {
  pub fn new(name: impl Into<String>, position: DVec3) -> Self {
    Self {
      name: name.into(),
      position,
      lod_group: None,
      renderers: Vec::new(),
    }
  }

  pub fn with_renderer(mut self, renderer: Renderer) -> Self {
    self.renderers.push(renderer);
    self
  }

  pub fn with_lod_group(mut self, lod_group: LodGroup) -> Self {
    self.lod_group = Some(lod_group);
    self
  }

  /// Every renderer reachable from this object, including all LOD levels.
  pub fn all_renderers(&self) -> impl Iterator<Item = &Renderer> {
    let lod_renderers = self
      .lod_group
      .iter()
      .flat_map(|group| group.lods.iter())
      .flat_map(|lod| lod.renderers.iter());
    self.renderers.iter().chain(lod_renderers)
  }

  /// Union of all renderer bounds, or a point at the object's position.
  pub fn bounds(&self) -> Aabb {
    self
      .all_renderers()
      .map(|r| r.bounds)
      .reduce(|acc, b| acc.union(&b))
      .unwrap_or_else(|| Aabb::from_point(self.position))
  }

  /// True if the object carries an LOD group or at least one renderer.
  pub fn is_renderable(&self) -> bool {
    self.lod_group.is_some() || !self.renderers.is_empty()
  }
}

/// Root of one bake: settings, source objects and generated state.
#[derive(Debug)]
pub struct HlodTarget {
  pub name: String,
  /// World-space origin; anchors the split lattice and batched meshes.
  pub position: DVec3,
  pub settings: HlodSettings,
  pub objects: Vec<Arc<SceneObject>>,

  /// Artifacts produced by the last bake. `None` marks an entry whose asset
  /// was already removed elsewhere.
  pub generated: Vec<Option<AssetHandle>>,

  /// Baked-state marker and streaming hierarchy.
  pub controller: Option<HlodController>,
}

impl HlodTarget {
  pub fn new(name: impl Into<String>, position: DVec3, settings: HlodSettings) -> Self {
    Self {
      name: name.into(),
      position,
      settings,
      objects: Vec::new(),
      generated: Vec::new(),
      controller: None,
    }
  }

  pub fn add_object(&mut self, object: SceneObject) {
    self.objects.push(Arc::new(object));
  }

  pub fn is_baked(&self) -> bool {
    self.controller.is_some()
  }

  /// Objects that take part in the bake.
  pub fn hlod_targets(&self) -> Vec<Arc<SceneObject>> {
    self
      .objects
      .iter()
      .filter(|o| o.is_renderable())
      .cloned()
      .collect()
  }

  /// Cubic bounds enclosing every renderer of the target.
  ///
  /// Returns an empty box at `position` when the target has no renderers.
  pub fn scene_bounds(&self) -> Aabb {
    self
      .objects
      .iter()
      .flat_map(|o| o.all_renderers())
      .map(|r| r.bounds)
      .reduce(|acc, b| acc.union(&b))
      .map(|b| b.to_cube())
      .unwrap_or_else(|| Aabb::from_point(self.position))
  }
}
