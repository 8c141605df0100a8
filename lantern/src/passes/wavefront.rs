use glam::uvec3;
use log::trace;

use super::{PassContext, RestirPass};
use crate::{gpu, BufferRoles, Dispatch, ShaderId, Stage, StageSchedule};

/// Generate, then `max_bounces` rounds of extend / shade / direct lighting /
/// compact / connect, then finalize.
#[derive(Debug)]
pub struct WavefrontPass;

impl WavefrontPass {
    pub fn schedule(schedule: &mut StageSchedule, ctx: &PassContext) {
        let b = ctx.buffers;
        let settings = ctx.settings;
        let scene = b.scene.slots();

        schedule.push(
            Stage::new("wavefront_generate", ShaderId::WavefrontGenerate)
                .reads(BufferRoles::CAMERAS | BufferRoles::BLUE_NOISE)
                .writes(
                    BufferRoles::COUNTERS
                        | BufferRoles::DISPATCH_ARGS
                        | BufferRoles::RAYS
                        | BufferRoles::RADIANCE
                        | BufferRoles::GBUFFER
                        | BufferRoles::ILLUMINATION,
                )
                .bind([
                    b.cameras.slot,
                    crate::slots::BLUE_NOISE,
                    b.counters.slot,
                    b.args.slot,
                    b.rays[0].slot,
                    b.radiance.slot,
                    b.normals.curr_slot(),
                    b.ids.curr_slot(),
                    b.history.curr_slot(),
                    b.moments.curr_slot(),
                    b.illumination.curr_slot(),
                ])
                .params(&gpu::GeneratePassParams {
                    seed: ctx.seed,
                    frame: ctx.frame,
                    max_t: ctx.max_t,
                    _pad: 0,
                })
                .per_pixel(ctx.screen),
        );

        let reuse = settings.restir.mode.has_reuse();

        for bounce in 0..settings.max_bounces {
            trace!("Scheduling bounce {bounce}");

            let rays = b.rays[(bounce % 2) as usize];
            let next_rays = b.rays[((bounce + 1) % 2) as usize];

            let params = gpu::BouncePassParams {
                seed: ctx.seed,
                bounce,
                max_bounces: settings.max_bounces,
                reuse: reuse as u32,
                ris_candidates: settings
                    .restir
                    .mode
                    .candidates(settings.restir.ris_candidates),
                max_t: ctx.max_t,
                hdri_lighting: settings.hdri_lighting_strength,
                hdri_background: settings.hdri_background_strength,
                sky_size: b.sky_size,
                _pad0: 0,
                _pad1: 0,
            };

            let rays_indirect = Dispatch::Indirect {
                args: b.args.handle,
                offset: gpu::DispatchArgs::RAYS_OFFSET,
            };

            schedule.push(
                Stage::new(
                    format!("wavefront_extend_{bounce}"),
                    ShaderId::WavefrontExtend,
                )
                .reads(
                    BufferRoles::SCENE
                        | BufferRoles::COUNTERS
                        | BufferRoles::DISPATCH_ARGS
                        | BufferRoles::RAYS,
                )
                .writes(BufferRoles::HITS | BufferRoles::COUNTERS)
                .bind(scene)
                .bind([b.counters.slot, rays.slot, b.hits.slot])
                .dispatch(rays_indirect),
            );

            schedule.push(
                Stage::new(
                    format!("wavefront_shade_{bounce}"),
                    ShaderId::WavefrontShade,
                )
                .reads(
                    BufferRoles::CAMERAS
                        | BufferRoles::SCENE
                        | BufferRoles::SKY
                        | BufferRoles::COUNTERS
                        | BufferRoles::DISPATCH_ARGS
                        | BufferRoles::RAYS
                        | BufferRoles::HITS,
                )
                .writes(
                    BufferRoles::COUNTERS
                        | BufferRoles::RAYS
                        | BufferRoles::SURFACES
                        | BufferRoles::RADIANCE
                        | BufferRoles::GBUFFER,
                )
                .bind([b.cameras.slot])
                .bind(scene)
                .bind([
                    b.sky.slot,
                    b.counters.slot,
                    rays.slot,
                    b.hits.slot,
                    next_rays.slot,
                    b.surfaces.slot,
                    b.radiance.slot,
                    b.normals.curr_slot(),
                    b.depths.curr_slot(),
                    b.ids.curr_slot(),
                    b.positions.slot,
                    b.albedos.slot,
                    b.emissions.slot,
                    b.motions.slot,
                ])
                .params(&params)
                .dispatch(rays_indirect),
            );

            schedule.push(
                Stage::new(
                    format!("wavefront_direct_illumination_{bounce}"),
                    ShaderId::WavefrontDirectIllumination,
                )
                .reads(
                    BufferRoles::SCENE
                        | BufferRoles::LIGHTS
                        | BufferRoles::COUNTERS
                        | BufferRoles::DISPATCH_ARGS
                        | BufferRoles::SURFACES,
                )
                .writes(
                    BufferRoles::COUNTERS
                        | BufferRoles::RESERVOIRS
                        | BufferRoles::SHADOW_RAYS,
                )
                .bind(scene)
                .bind([
                    b.scene.lights.slot,
                    b.counters.slot,
                    b.surfaces.slot,
                    b.reservoirs.curr_slot(),
                    b.shadow_rays.slot,
                ])
                .params(&params)
                .dispatch(rays_indirect),
            );

            if bounce == 0 && reuse {
                RestirPass::schedule(schedule, ctx);
            }

            schedule.push(
                Stage::new(
                    format!("wavefront_compact_{bounce}"),
                    ShaderId::WavefrontCompact,
                )
                .reads(BufferRoles::COUNTERS)
                .writes(BufferRoles::COUNTERS | BufferRoles::DISPATCH_ARGS)
                .bind([b.counters.slot, b.args.slot])
                .dispatch(Dispatch::Grid(uvec3(1, 1, 1))),
            );

            schedule.push(
                Stage::new(
                    format!("wavefront_connect_{bounce}"),
                    ShaderId::WavefrontConnect,
                )
                .reads(
                    BufferRoles::SCENE
                        | BufferRoles::COUNTERS
                        | BufferRoles::DISPATCH_ARGS
                        | BufferRoles::SHADOW_RAYS
                        | BufferRoles::RADIANCE,
                )
                .writes(BufferRoles::RADIANCE)
                .bind(scene)
                .bind([b.counters.slot, b.shadow_rays.slot, b.radiance.slot])
                .indirect(b.args.handle, gpu::DispatchArgs::SHADOW_RAYS_OFFSET),
            );
        }

        schedule.push(
            Stage::new("wavefront_finalize", ShaderId::WavefrontFinalize)
                .reads(
                    BufferRoles::CAMERAS
                        | BufferRoles::RADIANCE
                        | BufferRoles::GBUFFER
                        | BufferRoles::PREV_ILLUMINATION,
                )
                .writes(BufferRoles::ILLUMINATION | BufferRoles::FINAL)
                .bind([
                    b.cameras.slot,
                    b.radiance.slot,
                    b.albedos.slot,
                    b.emissions.slot,
                    b.illumination.prev_slot(),
                    b.illumination.curr_slot(),
                    b.history.curr_slot(),
                    b.final_radiance.slot,
                ])
                .params(&gpu::FinalizePassParams {
                    accumulated_frames: ctx.accumulated_frames.saturating_sub(1),
                    demodulate: settings.denoiser.demodulate as u32,
                    _pad0: 0,
                    _pad1: 0,
                })
                .per_pixel(ctx.screen),
        );
    }
}
