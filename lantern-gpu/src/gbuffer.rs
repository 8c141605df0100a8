use bytemuck::{Pod, Zeroable};
use glam::{UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::{depth_difference, Surface, INVALID_ID};

/// Surface found during a bounce, kept around for the direct-lighting passes;
/// stored under the same index as the ray that found it.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct SurfaceRecord {
    /// xyz - world-space position, w - 1.0 if the record is valid
    pub position: Vec4,

    /// xyz - shading normal, w - unused
    pub normal: Vec4,

    /// xyz - albedo, w - unused
    pub albedo: Vec4,

    /// xyz - throughput of the path up to this surface, w - unused
    pub throughput: Vec4,

    pub pixel_idx: u32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl SurfaceRecord {
    pub fn new(surface: &Surface, throughput: Vec3, pixel_idx: u32) -> Self {
        Self {
            position: surface.position.extend(1.0),
            normal: surface.normal.extend(0.0),
            albedo: surface.albedo.extend(0.0),
            throughput: throughput.extend(0.0),
            pixel_idx,
            ..Default::default()
        }
    }

    pub fn invalid(pixel_idx: u32) -> Self {
        Self {
            pixel_idx,
            ..Default::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.position.w > 0.0
    }

    pub fn throughput(&self) -> Vec3 {
        self.throughput.xyz()
    }

    pub fn surface(&self) -> Surface {
        Surface {
            position: self.position.xyz(),
            prev_position: self.position.xyz(),
            normal: self.normal.xyz(),
            albedo: self.albedo.xyz(),
            ..Default::default()
        }
    }
}

/// Per-pixel data of the primary hits, written once per frame by the first
/// bounce.
pub struct GBuffer<'a> {
    pub normals: &'a mut [Vec4],
    pub depths: &'a mut [f32],
    pub ids: &'a mut [UVec2],
    pub positions: &'a mut [Vec4],
    pub albedos: &'a mut [Vec4],
    pub emissions: &'a mut [Vec4],
    pub motions: &'a mut [Vec2],
}

impl<'a> GBuffer<'a> {
    pub fn write_hit(&mut self, idx: usize, surface: &Surface, depth: f32) {
        self.normals[idx] = surface.normal.extend(0.0);
        self.depths[idx] = depth;
        self.ids[idx] = UVec2::new(surface.instance_id, surface.triangle_id);
        self.positions[idx] = surface.position.extend(1.0);
        self.albedos[idx] = surface.albedo.extend(1.0);
        self.emissions[idx] = surface.emission.extend(1.0);
    }

    /// Writes a pixel whose primary ray escaped into the sky; the sky's color
    /// becomes pixel's emission, so that demodulation leaves no illumination
    /// behind.
    pub fn write_miss(&mut self, idx: usize, sky: Vec3) {
        self.normals[idx] = Vec4::ZERO;
        self.depths[idx] = 0.0;
        self.ids[idx] = UVec2::splat(INVALID_ID);
        self.positions[idx] = Vec4::ZERO;
        self.albedos[idx] = Vec4::ONE;
        self.emissions[idx] = sky.extend(1.0);
        self.motions[idx] = Vec2::ZERO;
    }
}

/// Read-only view over the geometric part of a G-buffer; the renderer keeps
/// two of them, for the current and the previous frame.
#[derive(Clone, Copy)]
pub struct GeometryView<'a> {
    pub normals: &'a [Vec4],
    pub depths: &'a [f32],
    pub ids: &'a [UVec2],
}

impl<'a> GeometryView<'a> {
    pub fn is_valid(&self, idx: usize) -> bool {
        self.ids[idx].x != INVALID_ID
    }

    pub fn normal(&self, idx: usize) -> Vec3 {
        self.normals[idx].xyz()
    }

    pub fn depth(&self, idx: usize) -> f32 {
        self.depths[idx]
    }

    /// Returns whether pixel `idx` of this view and pixel `other_idx` of the
    /// other view look at similar surfaces.
    pub fn is_similar(
        &self,
        idx: usize,
        other: &GeometryView,
        other_idx: usize,
        normal_threshold: f32,
        depth_threshold: f32,
    ) -> bool {
        self.is_valid(idx)
            && other.is_valid(other_idx)
            && self.normal(idx).dot(other.normal(other_idx)) >= normal_threshold
            && depth_difference(self.depth(idx), other.depth(other_idx))
                <= depth_threshold
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn similarity() {
        let normals = [Vec4::Z, Vec4::Z, Vec4::X, Vec4::Z];
        let depths = [1.0, 1.05, 1.0, 2.0];
        let ids = [UVec2::ZERO; 4];
        let view = GeometryView {
            normals: &normals,
            depths: &depths,
            ids: &ids,
        };

        assert!(view.is_similar(0, &view, 1, 0.9, 0.1));
        assert!(!view.is_similar(0, &view, 2, 0.9, 0.1));
        assert!(!view.is_similar(0, &view, 3, 0.9, 0.1));

        let ids = [UVec2::splat(INVALID_ID); 4];
        let invalid = GeometryView { ids: &ids, ..view };

        assert!(!view.is_similar(0, &invalid, 0, 0.9, 0.1));
    }

    #[test]
    fn record() {
        let surface = Surface {
            position: vec3(1.0, 2.0, 3.0),
            normal: Vec3::Y,
            albedo: Vec3::ONE,
            ..Default::default()
        };

        let record = SurfaceRecord::new(&surface, Vec3::splat(0.5), 7);

        assert!(record.is_valid());
        assert!(!SurfaceRecord::invalid(7).is_valid());
        assert_eq!(surface.position, record.surface().position);
        assert_eq!(Vec3::splat(0.5), record.throughput());
    }
}
