//! SVGF-style denoiser: temporal reprojection, variance estimation, a few
//! iterations of an edge-aware A-Trous wavelet filter and remodulation.

use glam::{ivec2, vec2, IVec2, UVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{
    lerp, luminance, AtrousPassParams, Camera, GeometryView,
    ModulatePassParams, ReprojectPassParams, WeightsPassParams,
};

/// Buffers the A-Trous iterations ping-pong between.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub enum FilterBuffer {
    Weighted,
    Atrous,
}

impl FilterBuffer {
    /// Returns the buffer iteration `i` reads from.
    pub fn atrous_source(iteration: u32) -> Self {
        if iteration % 2 == 0 {
            Self::Weighted
        } else {
            Self::Atrous
        }
    }

    /// Returns the buffer iteration `i` writes into.
    pub fn atrous_destination(iteration: u32) -> Self {
        Self::atrous_source(iteration + 1)
    }

    /// Returns the buffer holding the result after `iterations` iterations.
    pub fn modulate_source(iterations: u32) -> Self {
        Self::atrous_source(iterations)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub enum DenoiserDebugView {
    None,
    Variance,
    Weights,
}

impl DenoiserDebugView {
    pub fn from_u32(val: u32) -> Self {
        match val {
            1 => Self::Variance,
            2 => Self::Weights,
            _ => Self::None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Variance => 1,
            Self::Weights => 2,
        }
    }
}

/// Current frame's view of the denoiser's buffers touched by
/// [`reproject()`].
pub struct ReprojectBuffers<'a> {
    pub motions: &'a [Vec2],
    pub illumination: &'a mut [Vec4],
    pub moments: &'a mut [Vec2],
    pub history: &'a mut [f32],
    pub prev_illumination: &'a [Vec4],
    pub prev_moments: &'a [Vec2],
    pub prev_history: &'a [f32],
}

/// Blends pixel's raw illumination with what its surface looked like during
/// the previous frame.
pub fn reproject(
    global_id: UVec2,
    params: &ReprojectPassParams,
    camera: &Camera,
    geometry: &GeometryView,
    prev_geometry: &GeometryView,
    buffers: &mut ReprojectBuffers,
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let color = buffers.illumination[idx].xyz();
    let lum = luminance(color);
    let moments = vec2(lum, lum * lum);

    let prev_pos = (global_id.as_vec2() + 0.5 - buffers.motions[idx])
        .floor()
        .as_ivec2();

    let mut prev_idx = 0;

    // Zero history marks pixels the denoiser didn't produce (e.g. ones coming
    // from accumulation)
    let is_valid = camera.contains(prev_pos) && {
        prev_idx = camera.screen_to_idx(prev_pos.as_uvec2());

        buffers.prev_history[prev_idx] > 0.0
            && geometry.ids[idx] == prev_geometry.ids[prev_idx]
            && geometry.is_similar(
                idx,
                prev_geometry,
                prev_idx,
                params.normal_threshold,
                params.depth_threshold,
            )
    };

    if is_valid {
        let history =
            (buffers.prev_history[prev_idx] + 1.0).min(params.history_cap);

        let alpha = params.alpha.max(1.0 / history);
        let moments_alpha = params.moments_alpha.max(1.0 / history);

        let color =
            lerp(buffers.prev_illumination[prev_idx].xyz(), color, alpha);

        buffers.illumination[idx] = color.extend(1.0);

        buffers.moments[idx] =
            lerp(buffers.prev_moments[prev_idx], moments, moments_alpha);

        buffers.history[idx] = history;
    } else {
        buffers.moments[idx] = moments;
        buffers.history[idx] = 1.0;
    }
}

/// Estimates per-pixel variance and packs it along the illumination.
pub fn calculate_weights(
    global_id: UVec2,
    params: &WeightsPassParams,
    camera: &Camera,
    geometry: &GeometryView,
    illumination: &[Vec4],
    moments: &[Vec2],
    history: &[f32],
    weighted: &mut [Vec4],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let color = illumination[idx].xyz();

    let variance = if history[idx] < params.history_cap
        && geometry.is_valid(idx)
    {
        spatial_variance(global_id, params, camera, geometry, moments)
    } else {
        variance(moments[idx])
    };

    weighted[idx] = match DenoiserDebugView::from_u32(params.debug) {
        DenoiserDebugView::None => color.extend(variance),
        DenoiserDebugView::Variance => Vec3::splat(variance).extend(variance),

        DenoiserDebugView::Weights => {
            let weight = 1.0
                / (params.phi_illumination * variance.max(0.0).sqrt() + 1.0);

            Vec3::splat(weight).extend(variance)
        }
    };
}

fn variance(moments: Vec2) -> f32 {
    (moments.y - moments.x * moments.x).max(0.0)
}

/// Short histories don't carry enough temporal samples, so their variance
/// is estimated from a 3x3 neighbourhood instead.
fn spatial_variance(
    global_id: UVec2,
    params: &WeightsPassParams,
    camera: &Camera,
    geometry: &GeometryView,
    moments: &[Vec2],
) -> f32 {
    let idx = camera.screen_to_idx(global_id);
    let normal = geometry.normal(idx);
    let mut sum = Vec2::ZERO;
    let mut sum_w = 0.0;
    let mut dy = -1;

    while dy <= 1 {
        let mut dx = -1;

        while dx <= 1 {
            let pos = global_id.as_ivec2() + ivec2(dx, dy);

            if camera.contains(pos) {
                let sample_idx = camera.screen_to_idx(pos.as_uvec2());

                if geometry.is_valid(sample_idx) {
                    let w = normal
                        .dot(geometry.normal(sample_idx))
                        .max(0.0)
                        .powf(params.phi_normal);

                    sum += moments[sample_idx] * w;
                    sum_w += w;
                }
            }

            dx += 1;
        }

        dy += 1;
    }

    if sum_w > 0.0 {
        variance(sum / sum_w)
    } else {
        variance(moments[idx])
    }
}

const KERNEL: [f32; 3] = [3.0 / 8.0, 1.0 / 4.0, 1.0 / 16.0];

/// Runs a single iteration of the A-Trous filter, with taps placed `step`
/// pixels apart.
pub fn atrous(
    global_id: UVec2,
    params: &AtrousPassParams,
    camera: &Camera,
    geometry: &GeometryView,
    input: &[Vec4],
    output: &mut [Vec4],
    illumination: &mut [Vec4],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let center = input[idx];

    let filtered = if geometry.is_valid(idx) {
        filter(global_id, params, camera, geometry, input)
    } else {
        center
    };

    output[idx] = filtered;

    if params.feedback != 0 {
        illumination[idx] = filtered.xyz().extend(1.0);
    }
}

fn filter(
    global_id: UVec2,
    params: &AtrousPassParams,
    camera: &Camera,
    geometry: &GeometryView,
    input: &[Vec4],
) -> Vec4 {
    let idx = camera.screen_to_idx(global_id);
    let center = input[idx];
    let center_lum = luminance(center.xyz());
    let center_normal = geometry.normal(idx);
    let center_depth = geometry.depth(idx);
    let depth_gradient = depth_gradient(global_id, camera, geometry);
    let step = params.step.max(1) as i32;

    let lum_sigma =
        params.phi_illumination * center.w.max(0.0).sqrt() + 0.0001;

    let mut sum = Vec3::ZERO;
    let mut sum_variance = 0.0;
    let mut sum_w = 0.0;
    let mut dy = -2;

    while dy <= 2 {
        let mut dx = -2;

        while dx <= 2 {
            let offset = ivec2(dx, dy);
            let pos = global_id.as_ivec2() + offset * step;

            if camera.contains(pos) {
                let sample_idx = camera.screen_to_idx(pos.as_uvec2());

                if geometry.is_valid(sample_idx) {
                    let sample = input[sample_idx];

                    let kernel = KERNEL[dx.unsigned_abs() as usize]
                        * KERNEL[dy.unsigned_abs() as usize];

                    let w_normal = center_normal
                        .dot(geometry.normal(sample_idx))
                        .max(0.0)
                        .powf(params.phi_normal);

                    let w_depth = (center_depth - geometry.depth(sample_idx))
                        .abs()
                        / (depth_gradient
                            * (step as f32)
                            * offset.as_vec2().length()
                            + 0.0001);

                    let w_lum = (center_lum - luminance(sample.xyz())).abs()
                        / lum_sigma;

                    let w = kernel * w_normal * (-w_lum - w_depth).exp();

                    sum += sample.xyz() * w;
                    sum_variance += sample.w * w * w;
                    sum_w += w;
                }
            }

            dx += 1;
        }

        dy += 1;
    }

    if sum_w > 0.0 {
        (sum / sum_w).extend(sum_variance / (sum_w * sum_w))
    } else {
        center
    }
}

fn depth_gradient(
    global_id: UVec2,
    camera: &Camera,
    geometry: &GeometryView,
) -> f32 {
    let depth_at = |offset: IVec2| {
        let pos = global_id.as_ivec2() + offset;

        if camera.contains(pos) {
            let idx = camera.screen_to_idx(pos.as_uvec2());

            if geometry.is_valid(idx) {
                return geometry.depth(idx);
            }
        }

        geometry.depth(camera.screen_to_idx(global_id))
    };

    let dx = (depth_at(ivec2(1, 0)) - depth_at(ivec2(-1, 0))).abs();
    let dy = (depth_at(ivec2(0, 1)) - depth_at(ivec2(0, -1))).abs();

    dx.max(dy) * 0.5
}

/// Puts albedo and emission back onto the filtered illumination.
pub fn modulate(
    global_id: UVec2,
    params: &ModulatePassParams,
    camera: &Camera,
    filtered: &[Vec4],
    albedos: &[Vec4],
    emissions: &[Vec4],
    output: &mut [Vec4],
) {
    if !camera.contains(global_id.as_ivec2()) {
        return;
    }

    let idx = camera.screen_to_idx(global_id);
    let color = filtered[idx].xyz();

    let color = if params.debug != 0 || params.demodulate == 0 {
        color
    } else {
        color * albedos[idx].xyz() + emissions[idx].xyz()
    };

    output[idx] = color.extend(1.0);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::{uvec2, vec4};
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::testing::camera;
    use crate::{FinalizeBuffers, FinalizePassParams, INVALID_ID};

    #[test]
    fn atrous_ping_pong() {
        use FilterBuffer::*;

        let sources: Vec<_> = (0..4).map(FilterBuffer::atrous_source).collect();
        let targets: Vec<_> =
            (0..4).map(FilterBuffer::atrous_destination).collect();

        assert_eq!(vec![Weighted, Atrous, Weighted, Atrous], sources);
        assert_eq!(vec![Atrous, Weighted, Atrous, Weighted], targets);

        // Zero iterations leave the weighted illumination untouched
        assert_eq!(Weighted, FilterBuffer::modulate_source(0));
        assert_eq!(Atrous, FilterBuffer::modulate_source(5));
        assert_eq!(Weighted, FilterBuffer::modulate_source(4));
    }

    struct Buffers {
        normals: Vec<Vec4>,
        depths: Vec<f32>,
        ids: Vec<UVec2>,
        prev_ids: Vec<UVec2>,
        motions: Vec<Vec2>,
        illumination: [Vec<Vec4>; 2],
        moments: [Vec<Vec2>; 2],
        history: [Vec<f32>; 2],
        weighted: Vec<Vec4>,
        atrous: Vec<Vec4>,
        output: Vec<Vec4>,
    }

    /// Runs the whole denoiser on a static, noisy image; returns the output.
    fn run_frame(
        camera: &Camera,
        buffers: &mut Buffers,
        input: &[Vec4],
        iterations: u32,
    ) -> Vec<Vec4> {
        let size = camera.screen_size();
        let pixels: Vec<_> = (0..size.y)
            .flat_map(|y| (0..size.x).map(move |x| uvec2(x, y)))
            .collect();

        let geometry = GeometryView {
            normals: &buffers.normals,
            depths: &buffers.depths,
            ids: &buffers.ids,
        };

        let prev_geometry = GeometryView {
            ids: &buffers.prev_ids,
            ..geometry
        };

        buffers.illumination.swap(0, 1);
        buffers.moments.swap(0, 1);
        buffers.history.swap(0, 1);

        let [illumination, prev_illumination] = &mut buffers.illumination;
        let [moments, prev_moments] = &mut buffers.moments;
        let [history, prev_history] = &mut buffers.history;

        illumination.copy_from_slice(input);

        for &pos in &pixels {
            reproject(
                pos,
                &ReprojectPassParams {
                    alpha: 0.05,
                    moments_alpha: 0.2,
                    normal_threshold: 0.4,
                    depth_threshold: 0.1,
                    history_cap: 4.0,
                    ..Default::default()
                },
                camera,
                &geometry,
                &prev_geometry,
                &mut ReprojectBuffers {
                    motions: &buffers.motions,
                    illumination,
                    moments,
                    history,
                    prev_illumination,
                    prev_moments,
                    prev_history,
                },
            );
        }

        for &pos in &pixels {
            calculate_weights(
                pos,
                &WeightsPassParams {
                    history_cap: 4.0,
                    phi_normal: 128.0,
                    phi_illumination: 4.0,
                    debug: 0,
                },
                camera,
                &geometry,
                illumination,
                moments,
                history,
                &mut buffers.weighted,
            );
        }

        for iteration in 0..iterations {
            let (input, output) =
                match FilterBuffer::atrous_source(iteration) {
                    FilterBuffer::Weighted => {
                        (&buffers.weighted, &mut buffers.atrous)
                    }
                    FilterBuffer::Atrous => {
                        (&buffers.atrous, &mut buffers.weighted)
                    }
                };

            for &pos in &pixels {
                atrous(
                    pos,
                    &AtrousPassParams {
                        step: 1 << iteration,
                        feedback: (iteration == 0) as u32,
                        phi_normal: 128.0,
                        phi_illumination: 4.0,
                    },
                    camera,
                    &geometry,
                    input,
                    output,
                    illumination,
                );
            }
        }

        let filtered = match FilterBuffer::modulate_source(iterations) {
            FilterBuffer::Weighted => &buffers.weighted,
            FilterBuffer::Atrous => &buffers.atrous,
        };

        let albedos = vec![Vec4::ONE; pixels.len()];
        let emissions = vec![Vec4::ZERO; pixels.len()];

        for &pos in &pixels {
            modulate(
                pos,
                &ModulatePassParams {
                    demodulate: 1,
                    ..Default::default()
                },
                camera,
                filtered,
                &albedos,
                &emissions,
                &mut buffers.output,
            );
        }

        let output = buffers.output.clone();

        buffers.prev_ids = buffers.ids.clone();
        output
    }

    fn buffers(len: usize) -> Buffers {
        Buffers {
            normals: vec![Vec4::Y; len],
            depths: vec![3.0; len],
            ids: vec![UVec2::ZERO; len],
            prev_ids: vec![UVec2::ZERO; len],
            motions: vec![Vec2::ZERO; len],
            illumination: [vec![Vec4::ZERO; len], vec![Vec4::ZERO; len]],
            moments: [vec![Vec2::ZERO; len], vec![Vec2::ZERO; len]],
            history: [vec![0.0; len], vec![0.0; len]],
            weighted: vec![Vec4::ZERO; len],
            atrous: vec![Vec4::ZERO; len],
            output: vec![Vec4::ZERO; len],
        }
    }

    fn noisy_image(len: usize) -> Vec<Vec4> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1234);

        (0..len)
            .map(|_| Vec3::splat(rng.gen_range(0.0..2.0)).extend(1.0))
            .collect()
    }

    #[test]
    fn restarts_after_accumulation() {
        let camera = camera(uvec2(1, 1));
        let radiance = [Vec4::ONE];
        let albedos = [vec4(0.5, 0.5, 0.5, 1.0)];
        let emissions = [Vec4::ZERO];
        let normals = [Vec4::Y];
        let depths = [3.0];
        let ids = [UVec2::ZERO];
        let motions = [Vec2::ZERO];

        let geometry = GeometryView {
            normals: &normals,
            depths: &depths,
            ids: &ids,
        };

        let mut illumination = [[Vec4::ONE], [Vec4::ZERO]];
        let mut history = [[0.0], [0.0]];
        let mut output = [Vec4::ZERO];

        let mut run_finalize = |accumulated_frames,
                                illumination: &mut [[Vec4; 1]; 2],
                                history: &mut [[f32; 1]; 2]| {
            let [illumination, prev_illumination] = illumination;

            crate::finalize(
                UVec2::ZERO,
                &FinalizePassParams {
                    accumulated_frames,
                    demodulate: 1,
                    ..Default::default()
                },
                &camera,
                &mut FinalizeBuffers {
                    radiance: &radiance,
                    albedos: &albedos,
                    emissions: &emissions,
                    prev_illumination: prev_illumination.as_slice(),
                    illumination: illumination.as_mut_slice(),
                    history: history[0].as_mut_slice(),
                    output: &mut output,
                },
            );
        };

        // Accumulating frames leave their (modulated) average behind
        illumination.swap(0, 1);
        history.swap(0, 1);
        run_finalize(49, &mut illumination, &mut history);

        assert_relative_eq!(illumination[0][0].x, 1.0);

        // Camera moves, so the denoiser takes over again
        illumination.swap(0, 1);
        history.swap(0, 1);
        run_finalize(0, &mut illumination, &mut history);

        assert_relative_eq!(illumination[0][0].x, 2.0);

        let [curr_illumination, prev_illumination] = &mut illumination;
        let [curr_history, prev_history] = &mut history;
        let mut moments = [Vec2::ZERO];

        reproject(
            UVec2::ZERO,
            &ReprojectPassParams {
                alpha: 0.05,
                moments_alpha: 0.2,
                normal_threshold: 0.6,
                depth_threshold: 0.1,
                history_cap: 4.0,
                ..Default::default()
            },
            &camera,
            &geometry,
            &geometry,
            &mut ReprojectBuffers {
                motions: &motions,
                illumination: curr_illumination.as_mut_slice(),
                moments: &mut moments,
                history: curr_history.as_mut_slice(),
                prev_illumination: prev_illumination.as_slice(),
                prev_moments: &[Vec2::ZERO],
                prev_history: prev_history.as_slice(),
            },
        );

        assert_eq!(1.0, curr_history[0]);
        assert_relative_eq!(moments[0].x, 2.0);

        let mut denoised = [Vec4::ZERO];

        modulate(
            UVec2::ZERO,
            &ModulatePassParams {
                demodulate: 1,
                ..Default::default()
            },
            &camera,
            curr_illumination.as_slice(),
            &albedos,
            &emissions,
            &mut denoised,
        );

        assert_relative_eq!(denoised[0].x, 1.0);
    }

    #[test]
    fn static_scene_converges() {
        let camera = camera(uvec2(16, 16));
        let input = noisy_image(256);
        let mut buffers = buffers(256);
        let mut prev = run_frame(&camera, &mut buffers, &input, 5);

        for _ in 0..60 {
            let curr = run_frame(&camera, &mut buffers, &input, 5);
            let diff = curr
                .iter()
                .zip(&prev)
                .map(|(a, b)| (*a - *b).abs().max_element())
                .fold(0.0, f32::max);

            prev = curr;

            if diff < 1e-4 {
                return;
            }
        }

        panic!("denoiser didn't converge");
    }

    #[test]
    fn filtering_reduces_noise() {
        let camera = camera(uvec2(16, 16));
        let input = noisy_image(256);
        let output = run_frame(&camera, &mut buffers(256), &input, 5);

        let spread = |image: &[Vec4]| {
            let mean =
                image.iter().map(|c| c.x).sum::<f32>() / image.len() as f32;

            image.iter().map(|c| (c.x - mean).powi(2)).sum::<f32>()
                / image.len() as f32
        };

        assert!(spread(&output) < spread(&input) * 0.5);
    }

    #[test]
    fn disocclusion_resets_history() {
        let camera = camera(uvec2(4, 4));
        let mut buffers = buffers(16);
        let input = vec![Vec4::ONE; 16];

        for _ in 0..6 {
            run_frame(&camera, &mut buffers, &input, 0);
        }

        assert_relative_eq!(buffers.history[0][5], 4.0);

        buffers.ids[5] = uvec2(1, 0);
        run_frame(&camera, &mut buffers, &input, 0);

        assert_relative_eq!(buffers.history[0][5], 1.0);
        assert_relative_eq!(buffers.history[0][6], 4.0);
    }

    #[test]
    fn modulation() {
        let camera = camera(uvec2(1, 1));
        let mut output = [Vec4::ZERO];

        let mut run = |demodulate, debug| {
            modulate(
                UVec2::ZERO,
                &ModulatePassParams {
                    demodulate,
                    debug,
                    ..Default::default()
                },
                &camera,
                &[Vec4::splat(2.0)],
                &[Vec4::splat(0.5)],
                &[Vec4::splat(0.25)],
                &mut output,
            );

            output[0].x
        };

        assert_relative_eq!(run(1, 0), 1.25);
        assert_relative_eq!(run(0, 0), 2.0);
        assert_relative_eq!(run(1, 1), 2.0);
    }

    #[test]
    fn sky_pixels_are_left_alone() {
        let camera = camera(uvec2(3, 3));
        let normals = vec![Vec4::Y; 9];
        let depths = vec![3.0; 9];
        let mut ids = vec![UVec2::ZERO; 9];
        let input: Vec<_> = (0..9).map(|i| Vec4::splat(i as f32)).collect();
        let mut output = vec![Vec4::ZERO; 9];
        let mut illumination = vec![Vec4::ZERO; 9];

        ids[4] = UVec2::splat(INVALID_ID);

        atrous(
            uvec2(1, 1),
            &AtrousPassParams {
                step: 1,
                feedback: 0,
                phi_normal: 128.0,
                phi_illumination: 4.0,
            },
            &camera,
            &GeometryView {
                normals: &normals,
                depths: &depths,
                ids: &ids,
            },
            &input,
            &mut output,
            &mut illumination,
        );

        assert_eq!(input[4], output[4]);
        assert_eq!(Vec4::ZERO, illumination[4]);
    }
}
