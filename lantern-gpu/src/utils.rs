use core::ops;

use glam::{vec3, Vec3};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;
use spirv_std::Image;

/// Storage texture the final, tonemapped frame is written into.
pub type TexRgba8<'a> = &'a Image!(2D, format = rgba8, sampled = false);

pub fn lerp<T>(a: T, b: T, t: f32) -> T
where
    T: ops::Add<Output = T>,
    T: ops::Sub<Output = T>,
    T: ops::Mul<f32, Output = T>,
    T: Copy,
{
    a + (b - a) * t.clamp(0.0, 1.0)
}

/// Returns luminance of given color-vector.
pub fn luminance(color: Vec3) -> f32 {
    color.dot(vec3(0.2126, 0.7152, 0.0722))
}

/// Returns how many workgroups are needed to cover `count` invocations.
pub fn div_ceil(count: u32, group_size: u32) -> u32 {
    (count + group_size - 1) / group_size
}

/// Packs a color into a single `u32`, eight bits per channel.
pub fn pack_unorm4(val: glam::Vec4) -> u32 {
    let val = val.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0 + 0.5;

    (val.x as u32)
        | ((val.y as u32) << 8)
        | ((val.z as u32) << 16)
        | ((val.w as u32) << 24)
}

/// See: [`pack_unorm4()`].
pub fn unpack_unorm4(val: u32) -> glam::Vec4 {
    glam::vec4(
        (val & 0xff) as f32,
        ((val >> 8) & 0xff) as f32,
        ((val >> 16) & 0xff) as f32,
        ((val >> 24) & 0xff) as f32,
    ) / 255.0
}

/// Returns relative difference between two depths, used to reject samples
/// that lie on different surfaces.
pub fn depth_difference(a: f32, b: f32) -> f32 {
    (a - b).abs() / a.abs().max(LANTERN_EPSILON_DEPTH)
}

const LANTERN_EPSILON_DEPTH: f32 = 0.001;

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::vec4;

    use super::*;

    #[test]
    fn unorm4() {
        let packed = pack_unorm4(vec4(1.0, 0.0, 0.5, 0.25));
        let unpacked = unpack_unorm4(packed);

        assert_relative_eq!(unpacked.x, 1.0);
        assert_relative_eq!(unpacked.y, 0.0);
        assert_relative_eq!(unpacked.z, 0.5, epsilon = 0.01);
        assert_relative_eq!(unpacked.w, 0.25, epsilon = 0.01);
    }

    #[test]
    fn workgroups() {
        assert_eq!(0, div_ceil(0, 256));
        assert_eq!(1, div_ceil(1, 256));
        assert_eq!(1, div_ceil(256, 256));
        assert_eq!(2, div_ceil(257, 256));
    }
}
