//! Reservoir-based spatio-temporal importance resampling of direct lighting.
//!
//! The primary bounce streams a handful of light candidates into a reservoir
//! per pixel ([`sample_lights()`]), which is then merged with the previous
//! frame's reservoir ([`restir_temporal()`]) and with reservoirs of nearby
//! pixels ([`restir_spatial()`]); finally [`restir_shade()`] turns whatever
//! got picked into a shadow ray.

use glam::{UVec2, Vec3};

use crate::{
    atomic_add, Camera, GeometryView, LightPick, LightReservoir,
    LightReservoirData, LightsView, RayCounters, RestirPassParams, SceneView,
    ShadowRay, Surface, SurfaceRecord, WhiteNoise, INVALID_ID,
};

/// Evaluates the target function of given pick at given surface.
pub fn evaluate_pick(
    scene: &SceneView,
    lights: &LightsView,
    surface: &Surface,
    pick: LightPick,
) -> f32 {
    if pick.light_idx >= lights.len() {
        return 0.0;
    }

    let light = lights.sample(scene, pick.light_idx, pick.uv);

    LightsView::contribution(surface, &light).p_hat()
}

/// Streams `candidates` uniformly-chosen lights through a reservoir.
///
/// With a single candidate this degenerates into plain uniform light
/// sampling, which is what the renderer uses when resampling is disabled.
pub fn sample_lights(
    noise: &mut WhiteNoise,
    scene: &SceneView,
    lights: &LightsView,
    surface: &Surface,
    candidates: u32,
) -> LightReservoir {
    let mut reservoir = LightReservoir::default();
    let count = lights.len();

    if count == 0 {
        return reservoir;
    }

    let inv_source_pdf = count as f32;
    let mut i = 0;

    while i < candidates.max(1) {
        let pick = LightPick {
            light_idx: noise.sample_below(count),
            uv: glam::vec2(noise.sample(), noise.sample()),
        };

        let p_hat = evaluate_pick(scene, lights, surface, pick);

        reservoir.update(noise, pick, p_hat, p_hat * inv_source_pdf);
        i += 1;
    }

    reservoir.finalize();
    reservoir
}

/// Turns reservoir's pick into a shadow ray, provided the pick contributes
/// anything.
pub fn emit_shadow_ray(
    scene: &SceneView,
    lights: &LightsView,
    surface: &Surface,
    throughput: Vec3,
    pixel_idx: u32,
    reservoir: &LightReservoir,
    counters: &mut RayCounters,
    shadow_rays: &mut [ShadowRay],
) {
    if reservoir.is_empty()
        || reservoir.w <= 0.0
        || reservoir.sample.light_idx >= lights.len()
    {
        return;
    }

    let light = lights.sample(
        scene,
        reservoir.sample.light_idx,
        reservoir.sample.uv,
    );

    let contribution = LightsView::contribution(surface, &light);
    let energy = throughput * contribution.radiance * reservoir.w;

    if energy.max_element() <= 0.0 {
        return;
    }

    let origin = surface.spawn_point();
    let to_light = light.position - origin;
    let distance = to_light.length();

    if distance <= 0.0 {
        return;
    }

    let idx = atomic_add(&mut counters.shadow_rays, 1);

    shadow_rays[idx as usize] = ShadowRay::new(
        origin,
        to_light / distance,
        distance * 0.999,
        energy,
        pixel_idx,
    );
}

/// Merges pixel's reservoir with the reservoir its surface had during the
/// previous frame.
pub fn restir_temporal(
    global_id: UVec2,
    params: &RestirPassParams,
    noise: &mut WhiteNoise,
    camera: &Camera,
    scene: &SceneView,
    lights: &LightsView,
    surfaces: &[SurfaceRecord],
    motions: &[glam::Vec2],
    curr_geometry: &GeometryView,
    prev_geometry: &GeometryView,
    prev_reservoirs: &[LightReservoirData],
    curr_reservoirs: &mut [LightReservoirData],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let record = surfaces[idx];

    if !record.is_valid() {
        return;
    }

    let surface = record.surface();
    let curr = LightReservoir::read(curr_reservoirs, idx);
    let prev_pos = (global_id.as_vec2() + 0.5 - motions[idx])
        .floor()
        .as_ivec2();

    let mut merged = LightReservoir::default();

    merged.merge(noise, &curr, curr.p_hat);

    if camera.contains(prev_pos) {
        let prev_idx = camera.screen_to_idx(prev_pos.as_uvec2());

        let is_similar = curr_geometry.is_similar(
            idx,
            prev_geometry,
            prev_idx,
            params.normal_threshold,
            params.depth_threshold,
        );

        if is_similar {
            let mut prev = LightReservoir::read(prev_reservoirs, prev_idx);

            if prev.sample.light_idx != INVALID_ID {
                prev.clamp_m(
                    params.current_light_clamp
                        * params.ris_candidates.max(1) as f32,
                );

                let p_hat =
                    evaluate_pick(scene, lights, &surface, prev.sample);

                merged.merge(noise, &prev, p_hat);
            }
        }
    }

    merged.finalize();
    merged.write(curr_reservoirs, idx);
}

/// Merges pixel's reservoir with reservoirs of randomly chosen, similar
/// neighbours.
///
/// Result is written into a separate buffer, so that neighbours read their
/// inputs unaffected by this pass.
pub fn restir_spatial(
    global_id: UVec2,
    params: &RestirPassParams,
    noise: &mut WhiteNoise,
    camera: &Camera,
    scene: &SceneView,
    lights: &LightsView,
    surfaces: &[SurfaceRecord],
    geometry: &GeometryView,
    input: &[LightReservoirData],
    output: &mut [LightReservoirData],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let record = surfaces[idx];
    let center = LightReservoir::read(input, idx);

    if !record.is_valid() {
        center.write(output, idx);
        return;
    }

    let surface = record.surface();
    let mut merged = LightReservoir::default();
    let mut i = 0;

    merged.merge(noise, &center, center.p_hat);

    while i < params.num_spatial_samples {
        i += 1;

        let offset = noise.sample_disk() * params.spatial_radius;
        let pos = (global_id.as_vec2() + 0.5 + offset).floor().as_ivec2();

        if !camera.contains(pos) || pos == global_id.as_ivec2() {
            continue;
        }

        let neighbour_idx = camera.screen_to_idx(pos.as_uvec2());

        let is_similar = geometry.is_similar(
            idx,
            geometry,
            neighbour_idx,
            params.normal_threshold,
            params.depth_threshold,
        );

        if !is_similar {
            continue;
        }

        let neighbour = LightReservoir::read(input, neighbour_idx);
        let p_hat = evaluate_pick(scene, lights, &surface, neighbour.sample);

        merged.merge(noise, &neighbour, p_hat);
    }

    merged.finalize();
    merged.write(output, idx);
}

/// Shades pixel's primary surface using its final reservoir; the reservoir is
/// also copied into `target`, where the next frame expects to find it.
pub fn restir_shade(
    global_id: UVec2,
    camera: &Camera,
    scene: &SceneView,
    lights: &LightsView,
    surfaces: &[SurfaceRecord],
    source: &[LightReservoirData],
    target: &mut [LightReservoirData],
    counters: &mut RayCounters,
    shadow_rays: &mut [ShadowRay],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let record = surfaces[idx];
    let reservoir = LightReservoir::read(source, idx);

    reservoir.write(target, idx);

    if !record.is_valid() {
        return;
    }

    emit_shadow_ray(
        scene,
        lights,
        &record.surface(),
        record.throughput(),
        record.pixel_idx,
        &reservoir,
        counters,
        shadow_rays,
    );
}
