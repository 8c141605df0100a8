use bytemuck::{Pod, Zeroable};
use glam::{vec4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::INVALID_ID;

/// A ray travelling through the wavefront, one per pixel whose path is still
/// alive.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct Ray {
    /// xyz - origin, w - cone width
    pub origin: Vec4,

    /// xyz - direction, w - maximum distance
    pub direction: Vec4,

    /// xyz - path throughput, w - absorption coefficient
    pub throughput: Vec4,

    pub pixel_idx: u32,
    pub last_specular: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3, max_t: f32) -> Self {
        Self {
            origin: origin.extend(0.0),
            direction: direction.extend(max_t),
            throughput: Vec4::new(1.0, 1.0, 1.0, 0.0),
            ..Default::default()
        }
    }

    pub fn with_pixel(mut self, pixel_idx: u32) -> Self {
        self.pixel_idx = pixel_idx;
        self
    }

    pub fn with_cone_width(mut self, cone_width: f32) -> Self {
        self.origin.w = cone_width;
        self
    }

    pub fn with_throughput(mut self, throughput: Vec3) -> Self {
        self.throughput = throughput.extend(self.throughput.w);
        self
    }

    pub fn with_absorption(mut self, absorption: f32) -> Self {
        self.throughput.w = absorption;
        self
    }

    pub fn origin(&self) -> Vec3 {
        self.origin.xyz()
    }

    pub fn direction(&self) -> Vec3 {
        self.direction.xyz()
    }

    pub fn cone_width(&self) -> f32 {
        self.origin.w
    }

    pub fn max_t(&self) -> f32 {
        self.direction.w
    }

    pub fn throughput(&self) -> Vec3 {
        self.throughput.xyz()
    }

    pub fn absorption(&self) -> f32 {
        self.throughput.w
    }

    pub fn is_last_specular(&self) -> bool {
        self.last_specular != 0
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin() + self.direction() * t
    }
}

/// Result of tracing a [`Ray`] against the scene; stored under the same index
/// as the ray itself.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct ExtendResult {
    /// x, y - barycentric coordinates, z - distance
    pub bary_t: Vec4,
    pub instance_id: u32,
    pub primitive_id: u32,
    pub triangle_id: u32,
    pub _pad: u32,
}

impl ExtendResult {
    pub fn from_hit(hit: Hit) -> Self {
        Self {
            bary_t: vec4(hit.uv.x, hit.uv.y, hit.t, 0.0),
            instance_id: hit.instance_id,
            primitive_id: hit.primitive_id,
            triangle_id: hit.triangle_id,
            _pad: 0,
        }
    }

    pub fn hit(&self) -> Hit {
        Hit {
            t: self.bary_t.z,
            uv: self.bary_t.xy(),
            instance_id: self.instance_id,
            primitive_id: self.primitive_id,
            triangle_id: self.triangle_id,
        }
    }
}

/// Ray connecting a surface point with a light, traced for occlusion only.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct ShadowRay {
    /// xyz - origin, w - distance to the light
    pub origin: Vec4,

    /// xyz - direction, w - unused
    pub direction: Vec4,

    /// xyz - energy carried if the light is visible, w - unused
    pub energy: Vec4,

    pub pixel_idx: u32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

impl ShadowRay {
    pub fn new(
        origin: Vec3,
        direction: Vec3,
        t: f32,
        energy: Vec3,
        pixel_idx: u32,
    ) -> Self {
        Self {
            origin: origin.extend(t),
            direction: direction.extend(0.0),
            energy: energy.extend(0.0),
            pixel_idx,
            ..Default::default()
        }
    }

    pub fn origin(&self) -> Vec3 {
        self.origin.xyz()
    }

    pub fn direction(&self) -> Vec3 {
        self.direction.xyz()
    }

    pub fn t(&self) -> f32 {
        self.origin.w
    }

    pub fn energy(&self) -> Vec3 {
        self.energy.xyz()
    }
}

#[derive(Clone, Copy)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct Hit {
    pub t: f32,
    pub uv: Vec2,
    pub instance_id: u32,
    pub primitive_id: u32,
    pub triangle_id: u32,
}

impl Hit {
    pub fn none(max_t: f32) -> Self {
        Self {
            t: max_t,
            uv: Vec2::ZERO,
            instance_id: INVALID_ID,
            primitive_id: INVALID_ID,
            triangle_id: INVALID_ID,
        }
    }

    pub fn is_some(&self) -> bool {
        self.triangle_id != INVALID_ID
    }

    pub fn is_none(&self) -> bool {
        !self.is_some()
    }
}
