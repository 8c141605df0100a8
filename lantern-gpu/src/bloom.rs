//! Bloom: a chain of downsamples, starting with a bright-pass, followed by a
//! chain of tent-filtered upsamples back up to the first mip.

use glam::{ivec2, IVec2, UVec2, Vec3, Vec4, Vec4Swizzles};

use crate::{luminance, BloomPassParams};

/// Returns size of given bloom mip, for a screen of given size.
pub fn bloom_mip_size(screen: UVec2, mip: u32) -> UVec2 {
    (screen >> (mip + 1)).max(UVec2::ONE)
}

fn load(texels: &[Vec4], size: UVec2, pos: IVec2) -> Vec3 {
    let pos = pos.clamp(IVec2::ZERO, size.as_ivec2() - 1).as_uvec2();

    texels[(pos.y * size.x + pos.x) as usize].xyz()
}

/// Produces a single texel of the next, twice smaller mip.
pub fn bloom_downsample(
    global_id: UVec2,
    params: &BloomPassParams,
    input: &[Vec4],
    output: &mut [Vec4],
) {
    if global_id.x >= params.dst_size.x || global_id.y >= params.dst_size.y {
        return;
    }

    let origin = (global_id * 2).as_ivec2();
    let mut sum = Vec3::ZERO;
    let mut sum_w = 0.0;
    let mut i = 0;

    while i < 4 {
        let offset = ivec2((i % 2) as i32, (i / 2) as i32);
        let mut color = load(input, params.src_size, origin + offset);
        let mut w = 1.0;

        if params.first != 0 {
            color = bright_pass(color, params.threshold);

            // Karis average keeps single, extremely bright texels from
            // blowing up into flickering squares
            w = 1.0 / (1.0 + luminance(color));
        }

        sum += color * w;
        sum_w += w;
        i += 1;
    }

    output[(global_id.y * params.dst_size.x + global_id.x) as usize] =
        (sum / sum_w).extend(1.0);
}

fn bright_pass(color: Vec3, threshold: f32) -> Vec3 {
    let lum = luminance(color);

    if lum <= threshold || lum <= 0.0 {
        Vec3::ZERO
    } else {
        color * ((lum - threshold) / lum)
    }
}

/// Adds a tent-filtered, upsampled texel of the smaller mip into the larger
/// one.
pub fn bloom_upsample(
    global_id: UVec2,
    params: &BloomPassParams,
    input: &[Vec4],
    output: &mut [Vec4],
) {
    if global_id.x >= params.dst_size.x || global_id.y >= params.dst_size.y {
        return;
    }

    let center = (global_id / 2).as_ivec2();
    let radius = params.radius.max(1.0) as i32;
    let mut sum = Vec3::ZERO;
    let mut dy: i32 = -1;

    while dy <= 1 {
        let mut dx: i32 = -1;

        while dx <= 1 {
            let w = (2 - dx.abs()) as f32 * (2 - dy.abs()) as f32 / 16.0;

            sum += load(
                input,
                params.src_size,
                center + ivec2(dx, dy) * radius,
            ) * w;

            dx += 1;
        }

        dy += 1;
    }

    let idx = (global_id.y * params.dst_size.x + global_id.x) as usize;

    output[idx] += sum.extend(0.0);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::uvec2;

    use super::*;

    #[test]
    fn mip_sizes() {
        assert_eq!(uvec2(960, 540), bloom_mip_size(uvec2(1920, 1080), 0));
        assert_eq!(uvec2(480, 270), bloom_mip_size(uvec2(1920, 1080), 1));
        assert_eq!(uvec2(1, 1), bloom_mip_size(uvec2(1920, 1080), 11));
    }

    #[test]
    fn bright_pass_drops_dim_texels() {
        let input = vec![Vec4::splat(1.0); 16];
        let mut output = vec![Vec4::ZERO; 4];

        let params = BloomPassParams {
            src_size: uvec2(4, 4),
            dst_size: uvec2(2, 2),
            threshold: 6.0,
            first: 1,
            ..Default::default()
        };

        for pos in [uvec2(0, 0), uvec2(1, 0), uvec2(0, 1), uvec2(1, 1)] {
            bloom_downsample(pos, &params, &input, &mut output);
        }

        assert!(output.iter().all(|c| c.xyz() == Vec3::ZERO));
    }

    #[test]
    fn downsample_averages() {
        let input: Vec<_> =
            [1.0, 3.0, 5.0, 7.0].into_iter().map(Vec4::splat).collect();

        let mut output = vec![Vec4::ZERO];

        bloom_downsample(
            UVec2::ZERO,
            &BloomPassParams {
                src_size: uvec2(2, 2),
                dst_size: uvec2(1, 1),
                ..Default::default()
            },
            &input,
            &mut output,
        );

        assert_relative_eq!(4.0, output[0].x);
    }

    #[test]
    fn upsample_of_constant_is_constant() {
        let input = vec![Vec4::splat(2.0); 4];
        let mut output = vec![Vec4::splat(1.0); 16];

        let params = BloomPassParams {
            src_size: uvec2(2, 2),
            dst_size: uvec2(4, 4),
            radius: 2.0,
            ..Default::default()
        };

        for y in 0..4 {
            for x in 0..4 {
                bloom_upsample(uvec2(x, y), &params, &input, &mut output);
            }
        }

        for texel in output {
            assert_relative_eq!(3.0, texel.x);
        }
    }
}
