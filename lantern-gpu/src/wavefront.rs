//! Kernels of the wavefront path tracer.
//!
//! Per frame the renderer runs [`generate()`] once, then, per bounce:
//! [`extend()`], [`shade()`], [`direct_illumination()`] (plus, on the first
//! bounce, the resampling passes), [`compact()`] and [`connect()`]; finally
//! [`finalize()`] turns the radiance into the denoiser's input.
//!
//! Rays of bounce `b` are read from batch `b % 2` and their continuations are
//! written into batch `(b + 1) % 2`.

use glam::{UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{
    atomic_add, emit_shadow_ray, sample_lights, BlueNoise, BouncePassParams,
    Camera, DispatchArgs, ExtendResult, FinalizePassParams, GBuffer,
    GeneratePassParams, LightsView, Ray, RayCounters, SceneView, ShadowRay,
    SkyView, SurfaceRecord, WhiteNoise, INVALID_ID, LANTERN_EPSILON,
};

/// Per-frame buffers reset to their blank values by [`generate()`].
pub struct FrameBlanks<'a> {
    pub normals: &'a mut [Vec4],
    pub ids: &'a mut [UVec2],
    pub history: &'a mut [f32],
    pub moments: &'a mut [Vec2],
    pub illumination: &'a mut [Vec4],
}

pub fn generate(
    global_id: UVec2,
    params: &GeneratePassParams,
    camera: &Camera,
    blue_noise: &BlueNoise,
    counters: &mut RayCounters,
    args: &mut DispatchArgs,
    rays: &mut [Ray],
    radiance: &mut [Vec4],
    blanks: &mut FrameBlanks,
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    if global_id == UVec2::ZERO {
        *counters = RayCounters::new(camera.width() * camera.height());
        *args = DispatchArgs::new(counters);
    }

    let idx = camera.screen_to_idx(global_id);
    let jitter = blue_noise.sample(global_id).xy();

    rays[idx] = camera
        .ray(global_id, jitter, params.max_t)
        .with_pixel(idx as u32);

    radiance[idx] = Vec4::ZERO;
    blanks.normals[idx] = Vec4::ZERO;
    blanks.ids[idx] = UVec2::splat(INVALID_ID);
    blanks.history[idx] = 0.0;
    blanks.moments[idx] = Vec2::ZERO;
    blanks.illumination[idx] = Vec4::ZERO;
}

pub fn extend(
    id: u32,
    scene: &SceneView,
    counters: &mut RayCounters,
    rays: &[Ray],
    results: &mut [ExtendResult],
) {
    if id >= counters.active_rays {
        return;
    }

    let ray = rays[id as usize];
    let hit = scene.trace(ray.origin(), ray.direction(), ray.max_t());

    results[id as usize] = ExtendResult::from_hit(hit);

    if hit.is_some() {
        atomic_add(&mut counters.hits, 1);
    }
}

/// Evaluates what the ray found and either terminates its path or spawns the
/// path's continuation into the other ray batch.
pub fn shade(
    id: u32,
    params: &BouncePassParams,
    noise: &mut WhiteNoise,
    prev_camera: &Camera,
    camera: &Camera,
    scene: &SceneView,
    sky: &SkyView,
    counters: &mut RayCounters,
    rays: &[Ray],
    results: &[ExtendResult],
    next_rays: &mut [Ray],
    surfaces: &mut [SurfaceRecord],
    radiance: &mut [Vec4],
    gbuffer: &mut GBuffer,
) {
    if id >= counters.active_rays {
        return;
    }

    let ray = rays[id as usize];
    let hit = results[id as usize].hit();
    let pixel_idx = ray.pixel_idx as usize;

    if hit.is_none() {
        let strength = if params.is_primary() {
            params.hdri_background
        } else {
            params.hdri_lighting
        };

        let color = sky.sample(ray.direction()) * strength;

        radiance[pixel_idx] += (ray.throughput() * color).extend(0.0);
        surfaces[id as usize] = SurfaceRecord::invalid(ray.pixel_idx);

        if params.is_primary() {
            gbuffer.write_miss(pixel_idx, color);
        }

        atomic_add(&mut counters.terminated_rays, 1);
        return;
    }

    let surface = scene.surface(hit, ray.direction());
    let throughput = ray.throughput() * (-ray.absorption() * hit.t).exp();

    if params.is_primary() || ray.is_last_specular() {
        radiance[pixel_idx] += (throughput * surface.emission).extend(0.0);
    }

    if params.is_primary() {
        gbuffer.write_hit(pixel_idx, &surface, hit.t);

        gbuffer.motions[pixel_idx] = camera.world_to_screen(surface.position)
            - prev_camera.world_to_screen(surface.prev_position);
    }

    surfaces[id as usize] =
        SurfaceRecord::new(&surface, throughput, ray.pixel_idx);

    if params.bounce + 1 >= params.max_bounces {
        atomic_add(&mut counters.terminated_rays, 1);
        return;
    }

    // Cosine-weighted sampling cancels out Lambert's cosine and 1/pi
    let mut throughput = throughput * surface.albedo;

    if params.bounce >= 2 {
        let survival = throughput.max_element().clamp(0.05, 0.95);

        if noise.sample() > survival {
            atomic_add(&mut counters.terminated_rays, 1);
            return;
        }

        throughput /= survival;
    }

    if throughput.max_element() <= 0.0 {
        atomic_add(&mut counters.terminated_rays, 1);
        return;
    }

    let direction = noise.sample_hemisphere(surface.normal);
    let next_idx = atomic_add(&mut counters.next_rays, 1);

    next_rays[next_idx as usize] =
        Ray::new(surface.spawn_point(), direction, params.max_t)
            .with_pixel(ray.pixel_idx)
            .with_cone_width(ray.cone_width() + hit.t * camera.cone_spread())
            .with_throughput(throughput)
            .with_absorption(ray.absorption());
}

/// Samples direct lighting for surfaces found by [`shade()`].
///
/// On the first bounce with resampling enabled the reservoir is stored for
/// the temporal and spatial passes instead of being shaded right away.
pub fn direct_illumination(
    id: u32,
    params: &BouncePassParams,
    noise: &mut WhiteNoise,
    scene: &SceneView,
    lights: &LightsView,
    counters: &mut RayCounters,
    surfaces: &[SurfaceRecord],
    reservoirs: &mut [crate::LightReservoirData],
    shadow_rays: &mut [ShadowRay],
) {
    if id >= counters.active_rays {
        return;
    }

    let record = surfaces[id as usize];

    if !record.is_valid() {
        if params.is_primary() && params.has_reuse() {
            crate::LightReservoir::default()
                .write(reservoirs, record.pixel_idx as usize);
        }

        return;
    }

    let surface = record.surface();

    let reservoir = sample_lights(
        noise,
        scene,
        lights,
        &surface,
        params.ris_candidates,
    );

    if params.is_primary() && params.has_reuse() {
        reservoir.write(reservoirs, record.pixel_idx as usize);
        return;
    }

    emit_shadow_ray(
        scene,
        lights,
        &surface,
        record.throughput(),
        record.pixel_idx,
        &reservoir,
        counters,
        shadow_rays,
    );
}

/// Hands the counters over to the next bounce; runs as a single invocation.
pub fn compact(counters: &mut RayCounters, args: &mut DispatchArgs) {
    counters.advance();
    *args = DispatchArgs::new(counters);
}

pub fn connect(
    id: u32,
    scene: &SceneView,
    counters: &RayCounters,
    shadow_rays: &[ShadowRay],
    radiance: &mut [Vec4],
) {
    if id >= counters.active_shadow_rays {
        return;
    }

    let ray = shadow_rays[id as usize];

    if !scene.is_occluded(ray.origin(), ray.direction(), ray.t()) {
        radiance[ray.pixel_idx as usize] += ray.energy().extend(0.0);
    }
}

/// Buffers read and written by [`finalize()`].
pub struct FinalizeBuffers<'a> {
    pub radiance: &'a [Vec4],
    pub albedos: &'a [Vec4],
    pub emissions: &'a [Vec4],
    pub prev_illumination: &'a [Vec4],
    pub illumination: &'a mut [Vec4],
    pub history: &'a mut [f32],
    pub output: &'a mut [Vec4],
}

/// Converts the frame's radiance into the denoiser's raw illumination, or
/// into the running average when frames are being accumulated.
pub fn finalize(
    global_id: UVec2,
    params: &FinalizePassParams,
    camera: &Camera,
    buffers: &mut FinalizeBuffers,
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let radiance = buffers.radiance[idx].xyz();

    if params.accumulated_frames > 0 {
        let n = params.accumulated_frames as f32;

        let color = if params.accumulated_frames <= 1 {
            radiance
        } else {
            buffers.prev_illumination[idx].xyz() * ((n - 1.0) / n)
                + radiance / n
        };

        // The average is modulated, so it can't seed the denoiser's history
        // once accumulation stops
        buffers.illumination[idx] = color.extend(1.0);
        buffers.history[idx] = 0.0;
        buffers.output[idx] = color.extend(1.0);
    } else {
        let illumination = if params.demodulate != 0 {
            demodulate(
                radiance,
                buffers.albedos[idx].xyz(),
                buffers.emissions[idx].xyz(),
            )
        } else {
            radiance
        };

        buffers.illumination[idx] = illumination.extend(1.0);
        buffers.history[idx] = 1.0;
        buffers.output[idx] = radiance.extend(1.0);
    }
}

/// Strips surface's albedo and emission off its radiance, leaving just the
/// incoming illumination; channels with no albedo carry no illumination.
pub fn demodulate(radiance: Vec3, albedo: Vec3, emission: Vec3) -> Vec3 {
    let lit = (radiance - emission).max(Vec3::ZERO);

    Vec3::new(
        safe_div(lit.x, albedo.x),
        safe_div(lit.y, albedo.y),
        safe_div(lit.z, albedo.z),
    )
}

fn safe_div(a: f32, b: f32) -> f32 {
    if b > LANTERN_EPSILON {
        a / b
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec3};

    use super::*;
    use crate::testing::{TestFrame, TestScene};

    #[test]
    fn every_ray_is_either_continued_or_terminated() {
        let scene = TestScene::new();
        let mut frame = TestFrame::new(16, 16);

        frame.generate();

        let mut bounce = 0;

        while bounce < 4 {
            let active = frame.counters.active_rays;

            frame.extend(&scene);
            frame.shade(&scene, bounce, 4);

            assert_eq!(
                active,
                frame.counters.next_rays + frame.counters.terminated_rays,
                "bounce {bounce}"
            );

            frame.direct_illumination(&scene, bounce, false);
            frame.compact();

            assert_eq!(
                DispatchArgs::new(&frame.counters),
                frame.args,
                "bounce {bounce}"
            );

            frame.connect(&scene);
            bounce += 1;
        }

        // Last bounce never continues any path
        assert_eq!(0, frame.counters.active_rays);
    }

    #[test]
    fn primary_bounce_writes_gbuffer() {
        let scene = TestScene::new();
        let mut frame = TestFrame::new(16, 16);

        frame.generate();
        frame.extend(&scene);

        // Camera looks straight at the floor, so every primary ray hits
        assert_eq!(256, frame.counters.hits);

        frame.shade(&scene, 0, 4);

        for idx in 0..256 {
            assert_ne!(INVALID_ID, frame.ids[idx].x);
            assert_relative_eq!(frame.normals[idx].xyz(), Vec3::Y);
            assert!(frame.depths[idx] >= 2.99, "{}", frame.depths[idx]);
            assert_relative_eq!(frame.motions[idx], Vec2::ZERO);
        }
    }

    #[test]
    fn zero_active_rays_is_a_noop() {
        let scene = TestScene::new();
        let mut frame = TestFrame::new(4, 4);

        frame.generate();
        frame.counters = RayCounters::new(0);
        frame.extend(&scene);
        frame.shade(&scene, 0, 4);

        assert_eq!(0, frame.counters.hits);
        assert_eq!(0, frame.counters.next_rays);
        assert_eq!(0, frame.counters.terminated_rays);
    }

    #[test]
    fn lit_floor_receives_light() {
        let scene = TestScene::new();
        let mut frame = TestFrame::new(8, 8);

        frame.render(&scene, 2, false);

        let center = frame.radiance[4 * 8 + 4].xyz();

        assert!(center.max_element() > 0.0, "{center}");
    }

    #[test]
    fn accumulation() {
        let camera = crate::testing::camera(uvec2(1, 1));
        let radiance = [vec3(1.0, 1.0, 1.0).extend(0.0)];
        let albedos = [Vec4::ONE];
        let emissions = [Vec4::ZERO];
        let prev_illumination = [vec3(3.0, 3.0, 3.0).extend(1.0)];
        let mut illumination = [Vec4::ZERO];
        let mut history = [0.0];
        let mut output = [Vec4::ZERO];

        let mut run = |accumulated_frames| {
            let mut buffers = FinalizeBuffers {
                radiance: &radiance,
                albedos: &albedos,
                emissions: &emissions,
                prev_illumination: &prev_illumination,
                illumination: &mut illumination,
                history: &mut history,
                output: &mut output,
            };

            finalize(
                UVec2::ZERO,
                &FinalizePassParams {
                    accumulated_frames,
                    demodulate: 1,
                    ..Default::default()
                },
                &camera,
                &mut buffers,
            );

            (buffers.output[0].x, buffers.history[0])
        };

        // (3 * 3 + 1) / 4
        let (output, history) = run(4);

        assert_relative_eq!(output, 2.5);
        assert_eq!(0.0, history);

        // First accumulated frame ignores whatever was there before
        assert_relative_eq!(run(1).0, 1.0);

        // No accumulation - the frame is written outright
        let (output, history) = run(0);

        assert_relative_eq!(output, 1.0);
        assert_eq!(1.0, history);
    }

    #[test]
    fn demodulation() {
        assert_relative_eq!(
            demodulate(
                vec3(1.5, 1.0, 0.5),
                vec3(0.5, 0.0, 0.25),
                vec3(0.5, 0.0, 0.0),
            ),
            vec3(2.0, 0.0, 2.0),
        );
    }
}
