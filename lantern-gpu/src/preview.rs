use glam::{UVec2, Vec2, Vec3, Vec4};

use crate::{Camera, PreviewPassParams, SceneView, SkyView};

/// Cheap, single-pass visualizations rendered instead of the path tracer.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub enum PreviewMode {
    /// Primary hits lit by the sky, without any shadows.
    RayTrace,
    Albedo,
    Normal,
    Uv,
}

impl PreviewMode {
    pub fn from_u32(val: u32) -> Self {
        match val {
            1 => Self::Albedo,
            2 => Self::Normal,
            3 => Self::Uv,
            _ => Self::RayTrace,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::RayTrace => 0,
            Self::Albedo => 1,
            Self::Normal => 2,
            Self::Uv => 3,
        }
    }
}

pub fn preview(
    global_id: UVec2,
    params: &PreviewPassParams,
    camera: &Camera,
    scene: &SceneView,
    sky: &SkyView,
    output: &mut [Vec4],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let ray = camera.ray(global_id, Vec2::splat(0.5), params.max_t);
    let hit = scene.trace(ray.origin(), ray.direction(), ray.max_t());
    let mode = PreviewMode::from_u32(params.mode);

    let color = if hit.is_none() {
        if mode == PreviewMode::RayTrace {
            sky.sample(ray.direction()) * params.hdri_background
        } else {
            Vec3::ZERO
        }
    } else {
        let surface = scene.surface(hit, ray.direction());

        match mode {
            PreviewMode::RayTrace => {
                surface.emission
                    + surface.albedo
                        * sky.sample(surface.normal)
                        * params.hdri_lighting
            }
            PreviewMode::Albedo => surface.albedo,
            PreviewMode::Normal => surface.normal * 0.5 + 0.5,
            PreviewMode::Uv => surface.uv.extend(0.0),
        }
    };

    output[camera.screen_to_idx(global_id)] = color.extend(1.0);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec3, Vec4Swizzles};

    use super::*;
    use crate::testing::{camera, TestScene};

    fn render(mode: PreviewMode) -> Vec<Vec4> {
        let scene = TestScene::new();
        let camera = camera(uvec2(4, 4));
        let sky = [Vec4::splat(0.5)];
        let mut output = vec![Vec4::ZERO; 16];

        for y in 0..4 {
            for x in 0..4 {
                preview(
                    uvec2(x, y),
                    &PreviewPassParams {
                        mode: mode.to_u32(),
                        max_t: 1000.0,
                        hdri_lighting: 1.0,
                        hdri_background: 1.0,
                        sky_size: uvec2(1, 1),
                        ..Default::default()
                    },
                    &camera,
                    &scene.view(),
                    &SkyView::new(&sky, uvec2(1, 1)),
                    &mut output,
                );
            }
        }

        output
    }

    #[test]
    fn albedo() {
        for texel in render(PreviewMode::Albedo) {
            assert_relative_eq!(vec3(0.8, 0.8, 0.8), texel.xyz());
        }
    }

    #[test]
    fn normal() {
        for texel in render(PreviewMode::Normal) {
            assert_relative_eq!(vec3(0.5, 1.0, 0.5), texel.xyz());
        }
    }

    #[test]
    fn ray_trace() {
        for texel in render(PreviewMode::RayTrace) {
            assert_relative_eq!(vec3(0.4, 0.4, 0.4), texel.xyz());
        }
    }
}
