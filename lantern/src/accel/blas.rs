use log::debug;

use super::{BoundingBox, Bvh, BvhPrimitive};
use crate::{gpu, Material, Mesh, MeshTriangle};

/// Maximum number of triangles per BLAS leaf.
pub const BLAS_MAX_LEAF_SIZE: usize = 8;

/// Bottom-level acceleration structure of a single mesh.
///
/// Triangles are kept in the order the tree's leaves refer to them, so that
/// a leaf's range maps straight into the triangle buffer.
#[derive(Clone, Debug)]
pub struct Blas {
    bvh: Bvh,
    triangles: Vec<MeshTriangle>,
    emissive: Vec<u32>,
    materials: Vec<Material>,
}

impl Blas {
    pub fn build(mesh: &Mesh) -> Self {
        let triangles: Vec<_> = mesh.triangles().collect();

        debug!("Building BLAS; triangles={}", triangles.len());

        let primitives: Vec<_> = triangles
            .iter()
            .map(|triangle| BvhPrimitive::new(Self::triangle_bounds(triangle)))
            .collect();

        let bvh = Bvh::build(&primitives, BLAS_MAX_LEAF_SIZE);

        let triangles: Vec<_> = bvh
            .order()
            .iter()
            .map(|&idx| triangles[idx as usize])
            .collect();

        let emissive = triangles
            .iter()
            .enumerate()
            .filter(|(_, triangle)| {
                mesh.submeshes()[triangle.submesh as usize]
                    .material
                    .is_emissive()
            })
            .map(|(idx, _)| idx as u32)
            .collect();

        let materials = mesh
            .submeshes()
            .iter()
            .map(|submesh| submesh.material)
            .collect();

        Self {
            bvh,
            triangles,
            emissive,
            materials,
        }
    }

    /// Updates triangles' positions after mesh's submeshes have moved and
    /// recomputes the tree's bounds, keeping its topology.
    pub fn refit(&mut self, mesh: &Mesh) {
        let triangles: Vec<_> = mesh.triangles().collect();

        assert_eq!(
            triangles.len(),
            self.triangles.len(),
            "cannot refit BLAS: mesh's triangle count changed",
        );

        let bounds: Vec<_> =
            triangles.iter().map(Self::triangle_bounds).collect();

        for (slot, &idx) in self.triangles.iter_mut().zip(self.bvh.order()) {
            *slot = triangles[idx as usize];
        }

        self.bvh.refit(&bounds);
    }

    fn triangle_bounds(triangle: &MeshTriangle) -> BoundingBox {
        triangle.positions.into_iter().collect()
    }

    pub fn bvh(&self) -> &Bvh {
        &self.bvh
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bvh.bounds()
    }

    /// Triangles, in the order leaves refer to them.
    pub fn triangles(&self) -> &[MeshTriangle] {
        &self.triangles
    }

    /// Indices (into [`Self::triangles()`]) of emissive triangles.
    pub fn emissive(&self) -> &[u32] {
        &self.emissive
    }

    /// Materials, one per mesh's submesh.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn node_count(&self) -> u32 {
        self.bvh.nodes().len() as u32
    }

    pub fn serialize_nodes(
        &self,
        buffer: &mut Vec<glam::Vec4>,
        node_offset: u32,
        triangle_offset: u32,
    ) {
        self.bvh.serialize(buffer, node_offset, |first, count| {
            (first + triangle_offset, count)
        });
    }

    pub fn serialize_triangles(
        &self,
        buffer: &mut Vec<gpu::Triangle>,
        material_offset: u32,
    ) {
        buffer.extend(self.triangles.iter().map(|triangle| {
            triangle.serialize(material_offset + triangle.submesh)
        }));
    }
}
