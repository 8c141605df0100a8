use glam::UVec2;

use super::PassContext;
use crate::{gpu, slots, BufferRoles, ShaderId, Stage, StageSchedule};

/// Bloom (optional) and tonemapping of the frame's final radiance into the
/// output texture.
#[derive(Debug)]
pub struct PostPass;

impl PostPass {
    pub fn schedule(
        schedule: &mut StageSchedule,
        ctx: &PassContext,
        passthrough: bool,
    ) {
        let b = ctx.buffers;
        let bloom = &ctx.settings.bloom;
        let tonemap = &ctx.settings.tonemap;
        let mip_size = |mip| gpu::bloom_mip_size(ctx.screen, mip);

        if bloom.enabled {
            let params = |src_size: UVec2, dst_size: UVec2, first: bool| {
                gpu::BloomPassParams {
                    src_size,
                    dst_size,
                    threshold: bloom.brightness_threshold,
                    radius: bloom.radius,
                    first: first as u32,
                    _pad: 0,
                }
            };

            for mip in 0..gpu::NUM_BLOOM_MIPS {
                let (input, input_role, src_size) = if mip == 0 {
                    (b.final_radiance.slot, BufferRoles::FINAL, ctx.screen)
                } else {
                    (
                        b.bloom[mip as usize - 1].slot,
                        BufferRoles::BLOOM,
                        mip_size(mip - 1),
                    )
                };

                schedule.push(
                    Stage::new(
                        format!("bloom_downsample_{mip}"),
                        ShaderId::BloomDownsample,
                    )
                    .reads(input_role)
                    .writes(BufferRoles::BLOOM)
                    .bind([input, b.bloom[mip as usize].slot])
                    .params(&params(src_size, mip_size(mip), mip == 0))
                    .per_pixel(mip_size(mip)),
                );
            }

            for mip in (1..gpu::NUM_BLOOM_MIPS).rev() {
                schedule.push(
                    Stage::new(
                        format!("bloom_upsample_{mip}"),
                        ShaderId::BloomUpsample,
                    )
                    .reads(BufferRoles::BLOOM)
                    .writes(BufferRoles::BLOOM)
                    .bind([
                        b.bloom[mip as usize].slot,
                        b.bloom[mip as usize - 1].slot,
                    ])
                    .params(&params(mip_size(mip), mip_size(mip - 1), false))
                    .per_pixel(mip_size(mip - 1)),
                );
            }
        }

        let reads = if bloom.enabled {
            BufferRoles::CAMERAS | BufferRoles::FINAL | BufferRoles::BLOOM
        } else {
            BufferRoles::CAMERAS | BufferRoles::FINAL
        };

        schedule.push(
            Stage::new("tonemap", ShaderId::Tonemap)
                .reads(reads)
                .writes(BufferRoles::OUTPUT)
                .bind([
                    b.cameras.slot,
                    b.final_radiance.slot,
                    b.bloom[0].slot,
                    slots::OUTPUT,
                ])
                .params(&gpu::TonemapPassParams {
                    method: tonemap.method.to_u32(),
                    bloom: bloom.enabled as u32,
                    passthrough: passthrough as u32,
                    bloom_intensity: bloom.intensity,
                    exposure: tonemap.exposure,
                    gamma: tonemap.gamma,
                    max_luminance: tonemap.max_luminance,
                    reinhard_constant: tonemap.reinhard_constant,
                    shoulder_strength: tonemap.shoulder_strength,
                    linear_strength: tonemap.linear_strength,
                    linear_angle: tonemap.linear_angle,
                    toe_strength: tonemap.toe_strength,
                    toe_numerator: tonemap.toe_numerator,
                    toe_denominator: tonemap.toe_denominator,
                    linear_white: tonemap.linear_white,
                    _pad: 0,
                })
                .per_pixel(ctx.screen),
        );
    }
}
