use super::PassContext;
use crate::gpu::FilterBuffer;
use crate::{gpu, Bound, BufferRoles, ShaderId, Stage, StageSchedule};

#[derive(Debug)]
pub struct DenoiserPass;

impl DenoiserPass {
    /// Whether the denoiser runs for given frame: accumulated frames are
    /// averaged instead.
    pub fn is_active(ctx: &PassContext) -> bool {
        ctx.settings.denoiser.reprojection && ctx.accumulated_frames <= 1
    }

    pub fn schedule(schedule: &mut StageSchedule, ctx: &PassContext) {
        let b = ctx.buffers;
        let settings = &ctx.settings.denoiser;

        let geometry = [
            b.normals.curr_slot(),
            b.depths.curr_slot(),
            b.ids.curr_slot(),
        ];

        schedule.push(
            Stage::new("denoise_reproject", ShaderId::DenoiseReproject)
                .reads(
                    BufferRoles::CAMERAS
                        | BufferRoles::GBUFFER
                        | BufferRoles::PREV_GBUFFER
                        | BufferRoles::ILLUMINATION
                        | BufferRoles::PREV_ILLUMINATION,
                )
                .writes(BufferRoles::ILLUMINATION)
                .bind([b.cameras.slot])
                .bind(geometry)
                .bind([
                    b.normals.prev_slot(),
                    b.depths.prev_slot(),
                    b.ids.prev_slot(),
                    b.motions.slot,
                    b.illumination.curr_slot(),
                    b.moments.curr_slot(),
                    b.history.curr_slot(),
                    b.illumination.prev_slot(),
                    b.moments.prev_slot(),
                    b.history.prev_slot(),
                ])
                .params(&gpu::ReprojectPassParams {
                    alpha: settings.alpha,
                    moments_alpha: settings.moments_alpha,
                    normal_threshold: 1.0 - settings.normal_threshold,
                    depth_threshold: settings.depth_threshold,
                    history_cap: settings.history_cap as f32,
                    _pad0: 0,
                    _pad1: 0,
                    _pad2: 0,
                })
                .per_pixel(ctx.screen),
        );

        let (filtered, filtered_role) = if settings.denoising {
            Self::schedule_filter(schedule, ctx)
        } else {
            (b.illumination.curr_slot(), BufferRoles::ILLUMINATION)
        };

        schedule.push(
            Stage::new("denoise_modulate", ShaderId::DenoiseModulate)
                .reads(BufferRoles::CAMERAS | BufferRoles::GBUFFER | filtered_role)
                .writes(BufferRoles::FINAL)
                .bind([
                    b.cameras.slot,
                    filtered,
                    b.albedos.slot,
                    b.emissions.slot,
                    b.final_radiance.slot,
                ])
                .params(&gpu::ModulatePassParams {
                    demodulate: settings.demodulate as u32,
                    debug: settings.debug.to_u32(),
                    _pad0: 0,
                    _pad1: 0,
                })
                .per_pixel(ctx.screen),
        );
    }

    /// Schedules variance estimation and the A-Trous iterations, returning
    /// the slot (and role) holding the filtered illumination.
    fn schedule_filter(
        schedule: &mut StageSchedule,
        ctx: &PassContext,
    ) -> (u32, BufferRoles) {
        let b = ctx.buffers;
        let settings = &ctx.settings.denoiser;

        let geometry = [
            b.normals.curr_slot(),
            b.depths.curr_slot(),
            b.ids.curr_slot(),
        ];

        schedule.push(
            Stage::new("denoise_weights", ShaderId::DenoiseWeights)
                .reads(
                    BufferRoles::CAMERAS
                        | BufferRoles::GBUFFER
                        | BufferRoles::ILLUMINATION,
                )
                .writes(BufferRoles::WEIGHTED)
                .bind([b.cameras.slot])
                .bind(geometry)
                .bind([
                    b.illumination.curr_slot(),
                    b.moments.curr_slot(),
                    b.history.curr_slot(),
                    b.weighted.slot,
                ])
                .params(&gpu::WeightsPassParams {
                    history_cap: settings.history_cap as f32,
                    phi_normal: settings.phi_normal,
                    phi_illumination: settings.phi_illumination,
                    debug: settings.debug.to_u32(),
                })
                .per_pixel(ctx.screen),
        );

        let filter_buffer = |buffer| match buffer {
            FilterBuffer::Weighted => (b.weighted, BufferRoles::WEIGHTED),
            FilterBuffer::Atrous => (b.atrous, BufferRoles::ATROUS),
        };

        for iteration in 0..settings.filter_iterations {
            let (input, input_role): (Bound, _) =
                filter_buffer(FilterBuffer::atrous_source(iteration));

            let (output, output_role) =
                filter_buffer(FilterBuffer::atrous_destination(iteration));

            // First iteration's output becomes the history the next frame
            // reprojects
            let feedback = iteration == 0;

            let writes = if feedback {
                output_role | BufferRoles::ILLUMINATION
            } else {
                output_role
            };

            schedule.push(
                Stage::new(
                    format!("denoise_atrous_{iteration}"),
                    ShaderId::DenoiseAtrous,
                )
                .reads(BufferRoles::CAMERAS | BufferRoles::GBUFFER | input_role)
                .writes(writes)
                .bind([b.cameras.slot])
                .bind(geometry)
                .bind([input.slot, output.slot, b.illumination.curr_slot()])
                .params(&gpu::AtrousPassParams {
                    step: 1 << iteration,
                    feedback: feedback as u32,
                    phi_normal: settings.phi_normal,
                    phi_illumination: settings.phi_illumination,
                })
                .per_pixel(ctx.screen),
            );
        }

        let (filtered, role) = filter_buffer(FilterBuffer::modulate_source(
            settings.filter_iterations,
        ));

        (filtered.slot, role)
    }
}
