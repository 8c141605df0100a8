use bytemuck::{Pod, Zeroable};
use glam::{vec2, Vec2, Vec3};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{luminance, SceneView, Surface};

/// Entry of the light table, one per emissive triangle of each instance.
///
/// Entries are grouped by instance, in the same order as instances in the
/// TLAS.
#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, PartialEq))]
pub struct LightPickData {
    pub model_id: u32,
    pub instance_id: u32,

    /// Index of the emissive triangle within its model.
    pub primitive_id: u32,

    /// Number of emissive triangles in the model this light belongs to.
    pub lights_in_prim: u32,
}

/// Point sampled on a light's surface.
#[derive(Clone, Copy, Default)]
pub struct LightSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub area: f32,
    pub emission: Vec3,
}

/// Unshadowed contribution of a light towards a surface.
#[derive(Clone, Copy, Default)]
pub struct LightContribution {
    pub radiance: Vec3,
    pub direction: Vec3,
    pub distance: f32,
}

impl LightContribution {
    /// Returns the target function used by resampling.
    pub fn p_hat(&self) -> f32 {
        luminance(self.radiance)
    }
}

#[derive(Clone, Copy)]
pub struct LightsView<'a> {
    pub lights: &'a [LightPickData],
}

impl<'a> LightsView<'a> {
    pub fn new(lights: &'a [LightPickData]) -> Self {
        Self { lights }
    }

    pub fn len(&self) -> u32 {
        self.lights.len() as u32
    }

    /// Samples a point on given light; `uv` is a uniform sample from
    /// `<0.0, 1.0>^2`, so that the same point can be re-created later.
    pub fn sample(
        &self,
        scene: &SceneView,
        light_idx: u32,
        uv: Vec2,
    ) -> LightSample {
        let light = self.lights[light_idx as usize];
        let model = scene.models[light.model_id as usize];
        let xform = scene.transforms[light.instance_id as usize];

        let triangle = scene.triangles
            [(model.triangle_offset + light.primitive_id) as usize];

        let material = scene.materials[triangle.material_id() as usize];
        let world = xform.world_from_object();
        let su = uv.x.sqrt();
        let bary = vec2(su * (1.0 - uv.y), su * uv.y);
        let [p0, p1, p2] = triangle.positions();
        let p0 = world.transform_point3(p0);
        let p1 = world.transform_point3(p1);
        let p2 = world.transform_point3(p2);
        let cross = (p1 - p0).cross(p2 - p0);

        LightSample {
            position: world.transform_point3(triangle.point(bary)),
            normal: cross.normalize_or_zero(),
            area: cross.length() * 0.5,
            emission: material.emission(),
        }
    }

    /// Returns light's unshadowed contribution towards given surface.
    ///
    /// Lights are two-sided.
    pub fn contribution(
        surface: &Surface,
        light: &LightSample,
    ) -> LightContribution {
        let to_light = light.position - surface.position;
        let distance_sq = to_light.length_squared();

        if distance_sq <= 0.0 {
            return Default::default();
        }

        let distance = distance_sq.sqrt();
        let direction = to_light / distance;
        let cos_light = light.normal.dot(direction).abs();

        LightContribution {
            radiance: surface.brdf_cos(direction)
                * light.emission
                * (cos_light * light.area / distance_sq),
            direction,
            distance,
        }
    }
}
