//! Working objects: allocator-backed geometry snapshots consumed by one bake.
//!
//! Every [`WorkingObject`] holds an [`Allocation`] from an [`Allocator`]. The
//! allocator counts live allocations, so a bake can prove that everything it
//! converted was released again. Collections of working data are owned by a
//! [`DisposableList`], which releases its items exactly once: explicitly via
//! [`DisposableList::dispose`] or, on any early exit, when it is dropped.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::{DAffine3, Vec2, Vec3};

use crate::asset::MeshAsset;
use crate::bounds::Aabb;
use crate::error::MeshIndexOverflow;
use crate::scene::Renderer;

// =============================================================================
// Allocator
// =============================================================================

#[derive(Debug, Default)]
struct AllocatorCounters {
  live: AtomicUsize,
  total: AtomicUsize,
}

/// Allocation tracker for working objects.
///
/// Cheap to clone; clones share counters.
#[derive(Clone, Debug, Default)]
pub struct Allocator {
  counters: Arc<AllocatorCounters>,
}

impl Allocator {
  pub fn new() -> Self {
    Self::default()
  }

  /// Allocations that have not been released yet.
  pub fn live_count(&self) -> usize {
    self.counters.live.load(Ordering::Acquire)
  }

  /// Allocations made over the allocator's lifetime.
  pub fn total_allocated(&self) -> usize {
    self.counters.total.load(Ordering::Relaxed)
  }

  pub fn allocate(&self) -> Allocation {
    self.counters.live.fetch_add(1, Ordering::AcqRel);
    self.counters.total.fetch_add(1, Ordering::Relaxed);
    Allocation {
      allocator: self.clone(),
      released: false,
    }
  }
}

/// One live allocation. Released exactly once.
#[derive(Debug)]
pub struct Allocation {
  allocator: Allocator,
  released: bool,
}

impl Allocation {
  pub fn release(&mut self) {
    if !self.released {
      self.released = true;
      self.allocator.counters.live.fetch_sub(1, Ordering::AcqRel);
    }
  }

  pub fn is_released(&self) -> bool {
    self.released
  }

  pub fn allocator(&self) -> &Allocator {
    &self.allocator
  }
}

impl Drop for Allocation {
  fn drop(&mut self) {
    self.release();
  }
}

// =============================================================================
// Dispose
// =============================================================================

/// Explicit, idempotent resource release.
pub trait Dispose {
  fn dispose(&mut self);
}

/// Owning list whose items are disposed exactly once.
///
/// Dereferences to the inner `Vec`, so items can be pushed, indexed and
/// iterated mutably while the list is alive.
#[derive(Debug)]
pub struct DisposableList<T: Dispose> {
  items: Vec<T>,
  disposed: bool,
}

impl<T: Dispose> DisposableList<T> {
  pub fn new() -> Self {
    Self {
      items: Vec::new(),
      disposed: false,
    }
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      items: Vec::with_capacity(capacity),
      disposed: false,
    }
  }

  /// Dispose every item and empty the list.
  pub fn dispose(&mut self) {
    if self.disposed {
      return;
    }
    self.disposed = true;
    for item in &mut self.items {
      item.dispose();
    }
    self.items.clear();
  }

  pub fn is_disposed(&self) -> bool {
    self.disposed
  }
}

impl<T: Dispose> Default for DisposableList<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Dispose> Deref for DisposableList<T> {
  type Target = Vec<T>;

  fn deref(&self) -> &Vec<T> {
    &self.items
  }
}

impl<T: Dispose> DerefMut for DisposableList<T> {
  fn deref_mut(&mut self) -> &mut Vec<T> {
    &mut self.items
  }
}

impl<T: Dispose> Drop for DisposableList<T> {
  fn drop(&mut self) {
    self.dispose();
  }
}

// =============================================================================
// WorkingMesh / WorkingObject
// =============================================================================

/// Mutable copy of mesh geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkingMesh {
  pub positions: Vec<Vec3>,
  pub normals: Vec<Vec3>,
  pub uvs: Vec<Vec2>,
  pub indices: Vec<u32>,
}

impl WorkingMesh {
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  /// Copy of this mesh with positions and normals transformed.
  pub fn transformed(&self, transform: &DAffine3) -> WorkingMesh {
    WorkingMesh {
      positions: self
        .positions
        .iter()
        .map(|p| transform.transform_point3(p.as_dvec3()).as_vec3())
        .collect(),
      normals: self
        .normals
        .iter()
        .map(|n| {
          transform
            .transform_vector3(n.as_dvec3())
            .normalize_or_zero()
            .as_vec3()
        })
        .collect(),
      uvs: self.uvs.clone(),
      indices: self.indices.clone(),
    }
  }

  /// Append `other`, offsetting its indices.
  ///
  /// Leaves `self` unchanged if an offset index would not fit in `u32`.
  pub fn append(&mut self, other: &WorkingMesh) -> Result<(), MeshIndexOverflow> {
    let vertices = self.positions.len() + other.positions.len();
    let overflow = || MeshIndexOverflow { vertices };
    let base = u32::try_from(self.positions.len()).map_err(|_| overflow())?;
    let indices = other
      .indices
      .iter()
      .map(|i| i.checked_add(base).ok_or_else(overflow))
      .collect::<Result<Vec<u32>, _>>()?;

    self.positions.extend_from_slice(&other.positions);
    self.normals.extend_from_slice(&other.normals);
    self.uvs.extend_from_slice(&other.uvs);
    self.indices.extend(indices);
    Ok(())
  }

  /// Serializable copy for the asset store.
  pub fn to_asset(&self, name: &str, materials: &[String]) -> MeshAsset {
    MeshAsset {
      name: name.to_owned(),
      positions: self.positions.iter().map(|p| p.to_array()).collect(),
      normals: self.normals.iter().map(|n| n.to_array()).collect(),
      uvs: self.uvs.iter().map(|uv| uv.to_array()).collect(),
      indices: self.indices.clone(),
      materials: materials.to_vec(),
    }
  }

  fn release(&mut self) {
    *self = WorkingMesh::default();
  }
}

/// Renderer-agnostic geometry snapshot owned by a bake.
#[derive(Debug)]
pub struct WorkingObject {
  pub name: String,
  pub mesh: WorkingMesh,
  pub materials: Vec<String>,
  /// Local-to-world transform of `mesh`.
  pub transform: DAffine3,
  /// World-space bounds at conversion time.
  pub bounds: Aabb,
  allocation: Allocation,
}

impl WorkingObject {
  pub fn new(
    name: impl Into<String>,
    mesh: WorkingMesh,
    materials: Vec<String>,
    transform: DAffine3,
    bounds: Aabb,
    allocator: &Allocator,
  ) -> Self {
    Self {
      name: name.into(),
      mesh,
      materials,
      transform,
      bounds,
      allocation: allocator.allocate(),
    }
  }

  /// Snapshot a renderer's geometry.
  pub fn from_renderer(renderer: &Renderer, allocator: &Allocator) -> Self {
    let source = &renderer.mesh;
    let mesh = WorkingMesh {
      positions: source.positions.clone(),
      normals: source.normals.clone(),
      uvs: source.uvs.clone(),
      indices: source.indices.clone(),
    };
    Self::new(
      renderer.name.clone(),
      mesh,
      renderer.materials.clone(),
      renderer.transform,
      renderer.bounds,
      allocator,
    )
  }

  /// The allocator this object was allocated from.
  pub fn allocator(&self) -> &Allocator {
    self.allocation.allocator()
  }

  pub fn is_disposed(&self) -> bool {
    self.allocation.is_released()
  }
}

impl Dispose for WorkingObject {
  fn dispose(&mut self) {
    self.mesh.release();
    self.allocation.release();
  }
}

#[cfg(test)]
#[path = "working_test.rs"]
mod working_test;
