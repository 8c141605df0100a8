use super::PassContext;
use crate::{gpu, BufferRoles, ShaderId, Stage, StageSchedule};

/// Temporal and spatial reuse of the primary bounce's light reservoirs,
/// followed by shading of whatever light each pixel ended up with.
///
/// Runs on the primary bounce, between direct illumination (which fills the
/// current reservoirs with fresh candidates) and compaction (which hands the
/// shadow rays emitted here over to connect).
#[derive(Debug)]
pub struct RestirPass;

impl RestirPass {
    pub fn schedule(schedule: &mut StageSchedule, ctx: &PassContext) {
        let b = ctx.buffers;
        let restir = &ctx.settings.restir;
        let scene = b.scene.slots();

        let params = gpu::RestirPassParams {
            seed: ctx.seed,
            ris_candidates: restir.mode.candidates(restir.ris_candidates),
            current_light_clamp: restir.current_light_clamp,
            normal_threshold: 1.0 - restir.normal_threshold,
            depth_threshold: restir.depth_threshold,
            num_spatial_samples: restir.num_spatial_samples,
            spatial_radius: restir.spatial_radius,
            _pad: 0,
        };

        let common = BufferRoles::CAMERAS
            | BufferRoles::SCENE
            | BufferRoles::LIGHTS
            | BufferRoles::SURFACES;

        if restir.mode.temporal() {
            schedule.push(
                Stage::new("restir_temporal", ShaderId::RestirTemporal)
                    .reads(
                        common
                            | BufferRoles::GBUFFER
                            | BufferRoles::PREV_GBUFFER
                            | BufferRoles::RESERVOIRS
                            | BufferRoles::PREV_RESERVOIRS,
                    )
                    .writes(BufferRoles::RESERVOIRS)
                    .bind([b.cameras.slot])
                    .bind(scene)
                    .bind([
                        b.scene.lights.slot,
                        b.surfaces.slot,
                        b.motions.slot,
                        b.normals.curr_slot(),
                        b.depths.curr_slot(),
                        b.ids.curr_slot(),
                        b.normals.prev_slot(),
                        b.depths.prev_slot(),
                        b.ids.prev_slot(),
                        b.reservoirs.prev_slot(),
                        b.reservoirs.curr_slot(),
                    ])
                    .params(&params)
                    .per_pixel(ctx.screen),
            );
        }

        let spatial = restir.mode.spatial();

        if spatial {
            schedule.push(
                Stage::new("restir_spatial", ShaderId::RestirSpatial)
                    .reads(
                        common | BufferRoles::GBUFFER | BufferRoles::RESERVOIRS,
                    )
                    .writes(BufferRoles::RESERVOIR_SCRATCH)
                    .bind([b.cameras.slot])
                    .bind(scene)
                    .bind([
                        b.scene.lights.slot,
                        b.surfaces.slot,
                        b.normals.curr_slot(),
                        b.depths.curr_slot(),
                        b.ids.curr_slot(),
                        b.reservoirs.curr_slot(),
                        b.reservoir_scratch.slot,
                    ])
                    .params(&params)
                    .per_pixel(ctx.screen),
            );
        }

        // Current reservoirs must end up holding the shaded reservoir, since
        // they become the next frame's previous ones
        let (source, target, source_role, target_role) = if spatial {
            (
                b.reservoir_scratch.slot,
                b.reservoirs.curr_slot(),
                BufferRoles::RESERVOIR_SCRATCH,
                BufferRoles::RESERVOIRS,
            )
        } else {
            (
                b.reservoirs.curr_slot(),
                b.reservoir_scratch.slot,
                BufferRoles::RESERVOIRS,
                BufferRoles::RESERVOIR_SCRATCH,
            )
        };

        schedule.push(
            Stage::new("restir_shade", ShaderId::RestirShade)
                .reads(common | source_role | BufferRoles::COUNTERS)
                .writes(
                    target_role
                        | BufferRoles::COUNTERS
                        | BufferRoles::SHADOW_RAYS,
                )
                .bind([b.cameras.slot])
                .bind(scene)
                .bind([
                    b.scene.lights.slot,
                    b.surfaces.slot,
                    source,
                    target,
                    b.counters.slot,
                    b.shadow_rays.slot,
                ])
                .per_pixel(ctx.screen),
        );
    }
}
