use core::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct Material {
    /// rgb - base color, a - unused
    pub albedo: Vec4,

    /// rgb - emitted radiance (already multiplied by strength), a - unused
    pub emission: Vec4,
}

impl Material {
    pub fn albedo(&self) -> Vec3 {
        self.albedo.xyz()
    }

    pub fn emission(&self) -> Vec3 {
        self.emission.xyz()
    }

    pub fn is_emissive(&self) -> bool {
        self.emission.xyz().max_element() > 0.0
    }
}

/// Surface point found by tracing a ray, with everything the shading passes
/// need to know about it.
#[derive(Clone, Copy, Default)]
pub struct Surface {
    pub position: Vec3,

    /// Where this point was during the previous frame, used for motion
    /// vectors.
    pub prev_position: Vec3,

    /// Shading normal, always facing the incoming ray.
    pub normal: Vec3,

    pub uv: Vec2,
    pub albedo: Vec3,
    pub emission: Vec3,
    pub instance_id: u32,
    pub triangle_id: u32,
}

impl Surface {
    /// Evaluates the Lambertian BRDF, multiplied by the cosine term.
    pub fn brdf_cos(&self, dir_to_light: Vec3) -> Vec3 {
        self.albedo / PI * self.normal.dot(dir_to_light).max(0.0)
    }

    /// Returns ray's origin slightly offset from the surface, so that the ray
    /// doesn't self-intersect.
    pub fn spawn_point(&self) -> Vec3 {
        self.position + self.normal * 0.001
    }
}
