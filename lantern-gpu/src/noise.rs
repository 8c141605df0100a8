use core::f32::consts::PI;

use glam::{uvec2, vec2, vec3, UVec2, Vec2, Vec3, Vec4};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{unpack_unorm4, BLUE_NOISE_SIZE};

#[derive(Copy, Clone)]
pub struct WhiteNoise {
    state: u32,
}

impl WhiteNoise {
    pub fn new(seed: u32, id: UVec2) -> Self {
        Self {
            state: seed
                ^ 48619u32.wrapping_mul(id.x)
                ^ 95461u32.wrapping_mul(id.y),
        }
    }

    /// Creates a noise for a 1D invocation (e.g. one thread per ray).
    pub fn from_index(seed: u32, idx: u32) -> Self {
        Self::new(seed, uvec2(idx, idx.rotate_left(16)))
    }

    /// Generates a uniform sample in range `<0.0, 1.0>`.
    pub fn sample(&mut self) -> f32 {
        (self.sample_int() >> 8) as f32 / ((1u32 << 24) as f32)
    }

    /// Generates a uniform sample in range `<0, u32::MAX>`.
    pub fn sample_int(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(747796405)
            .wrapping_add(2891336453);

        let word = ((self.state >> ((self.state >> 28) + 4)) ^ self.state)
            .wrapping_mul(277803737);

        (word >> 22) ^ word
    }

    /// Generates a uniform sample in range `<0, max)`.
    pub fn sample_below(&mut self, max: u32) -> u32 {
        if max == 0 {
            0
        } else {
            self.sample_int() % max
        }
    }

    /// Generates a uniform sample inside of a disk.
    pub fn sample_disk(&mut self) -> Vec2 {
        let radius = self.sample().sqrt();
        let angle = self.sample() * PI * 2.0;

        vec2(angle.cos(), angle.sin()) * radius
    }

    /// Generates a cosine-weighted sample on a hemisphere around given normal.
    pub fn sample_hemisphere(&mut self, normal: Vec3) -> Vec3 {
        cosine_hemisphere(vec2(self.sample(), self.sample()), normal)
    }
}

/// Blue-noise texture, stored as packed RGBA8 values; the renderer switches a
/// different texture in every frame.
#[derive(Clone, Copy)]
pub struct BlueNoise<'a> {
    texels: &'a [u32],
}

impl<'a> BlueNoise<'a> {
    pub fn new(texels: &'a [u32]) -> Self {
        Self { texels }
    }

    pub fn sample(&self, screen_pos: UVec2) -> Vec4 {
        let pos = screen_pos % BLUE_NOISE_SIZE;
        let idx = pos.y * BLUE_NOISE_SIZE + pos.x;

        unpack_unorm4(self.texels[idx as usize])
    }
}

/// Maps a uniform sample from `<0.0, 1.0>^2` into a cosine-weighted direction
/// on a hemisphere around given normal.
pub fn cosine_hemisphere(u: Vec2, normal: Vec3) -> Vec3 {
    let radius = u.x.sqrt();
    let angle = 2.0 * PI * u.y;
    let (t, b) = orthonormal_basis(normal);

    let x = radius * angle.cos();
    let y = radius * angle.sin();
    let z = (1.0 - u.x).max(0.0).sqrt();

    (t * x + b * y + normal * z).normalize()
}

/// Returns two vectors that, together with `normal`, form an orthonormal
/// basis.
///
/// Thanks to:
/// - https://graphics.pixar.com/library/OrthonormalB/paper.pdf
pub fn orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    let sign = if normal.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + normal.z);
    let b = normal.x * normal.y * a;

    (
        vec3(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x),
        vec3(b, sign + normal.y * normal.y * a, -normal.y),
    )
}
