use core::f32::consts::PI;

use glam::{uvec2, UVec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

/// Equirectangular environment map.
#[derive(Clone, Copy)]
pub struct SkyView<'a> {
    texels: &'a [Vec4],
    size: UVec2,
}

impl<'a> SkyView<'a> {
    pub fn new(texels: &'a [Vec4], size: UVec2) -> Self {
        Self { texels, size }
    }

    pub fn sample(&self, dir: Vec3) -> Vec3 {
        if self.size.x == 0 || self.size.y == 0 {
            return Vec3::ZERO;
        }

        let u = 0.5 + dir.z.atan2(dir.x) / (2.0 * PI);
        let v = dir.y.clamp(-1.0, 1.0).acos() / PI;

        let pos = uvec2(
            ((u * self.size.x as f32) as u32).min(self.size.x - 1),
            ((v * self.size.y as f32) as u32).min(self.size.y - 1),
        );

        self.texels[(pos.y * self.size.x + pos.x) as usize].xyz()
    }
}

#[cfg(test)]
mod tests {
    use glam::vec4;

    use super::*;

    #[test]
    fn sample() {
        // Top half is bright, bottom half is dark
        let texels = [
            vec4(1.0, 1.0, 1.0, 1.0),
            vec4(1.0, 1.0, 1.0, 1.0),
            vec4(0.0, 0.0, 0.0, 1.0),
            vec4(0.0, 0.0, 0.0, 1.0),
        ];

        let sky = SkyView::new(&texels, uvec2(2, 2));

        assert_eq!(Vec3::ONE, sky.sample(Vec3::Y));
        assert_eq!(Vec3::ZERO, sky.sample(-Vec3::Y));
        assert_eq!(Vec3::ZERO, SkyView::new(&[], UVec2::ZERO).sample(Vec3::Y));
    }
}
