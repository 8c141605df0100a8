use super::PassContext;
use crate::{gpu, BufferRoles, ShaderId, Stage, StageSchedule};

/// Single-dispatch visualization of primary hits, run instead of the
/// wavefront (and the denoiser).
#[derive(Debug)]
pub struct PreviewPass;

impl PreviewPass {
    pub fn schedule(
        schedule: &mut StageSchedule,
        ctx: &PassContext,
        mode: gpu::PreviewMode,
    ) {
        let b = ctx.buffers;

        schedule.push(
            Stage::new("preview", ShaderId::Preview)
                .reads(
                    BufferRoles::CAMERAS | BufferRoles::SCENE | BufferRoles::SKY,
                )
                .writes(BufferRoles::FINAL)
                .bind([b.cameras.slot])
                .bind(b.scene.slots())
                .bind([b.sky.slot, b.final_radiance.slot])
                .params(&gpu::PreviewPassParams {
                    mode: mode.to_u32(),
                    max_t: ctx.max_t,
                    hdri_lighting: ctx.settings.hdri_lighting_strength,
                    hdri_background: ctx.settings.hdri_background_strength,
                    sky_size: b.sky_size,
                    _pad0: 0,
                    _pad1: 0,
                })
                .per_pixel(ctx.screen),
        );
    }
}
