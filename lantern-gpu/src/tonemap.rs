use glam::{Vec3, Vec4, Vec4Swizzles};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

use crate::{luminance, TonemapPassParams};

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub enum TonemapMethod {
    Linear,
    Reinhard,
    ReinhardSq,
    AcesFilmic,
}

impl TonemapMethod {
    pub fn from_u32(val: u32) -> Self {
        match val {
            1 => Self::Reinhard,
            2 => Self::ReinhardSq,
            3 => Self::AcesFilmic,
            _ => Self::Linear,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::Linear => 0,
            Self::Reinhard => 1,
            Self::ReinhardSq => 2,
            Self::AcesFilmic => 3,
        }
    }
}

/// Maps a linear HDR color into the displayable range.
pub fn tonemap(params: &TonemapPassParams, color: Vec3) -> Vec3 {
    if params.passthrough != 0 {
        return color;
    }

    let color = color.max(Vec3::ZERO) * params.exposure;

    let color = match TonemapMethod::from_u32(params.method) {
        TonemapMethod::Linear => color,
        TonemapMethod::Reinhard => reinhard(color, params.max_luminance),

        TonemapMethod::ReinhardSq => {
            reinhard_sq(color, params.reinhard_constant)
        }

        TonemapMethod::AcesFilmic => {
            let white = Vec3::splat(params.linear_white);

            filmic(params, color) / filmic(params, white)
        }
    };

    color
        .clamp(Vec3::ZERO, Vec3::ONE)
        .powf(1.0 / params.gamma.max(0.0001))
}

/// Extended Reinhard on luminance; luminances of `max_luminance` and above
/// map into white.
fn reinhard(color: Vec3, max_luminance: f32) -> Vec3 {
    let lum = luminance(color);

    if lum <= 0.0 {
        return Vec3::ZERO;
    }

    let max_sq = (max_luminance * max_luminance).max(0.0001);
    let mapped = lum * (1.0 + lum / max_sq) / (1.0 + lum);

    color * (mapped / lum)
}

fn reinhard_sq(color: Vec3, constant: f32) -> Vec3 {
    let mapped = color / (color + Vec3::splat(constant.max(0.0001)));

    mapped * mapped
}

fn filmic(params: &TonemapPassParams, x: Vec3) -> Vec3 {
    let a = params.shoulder_strength;
    let b = params.linear_strength;
    let c = params.linear_angle;
    let d = params.toe_strength;
    let e = params.toe_numerator;
    let f = params.toe_denominator;

    ((x * (a * x + c * b) + d * e) / (x * (a * x + b) + d * f)) - e / f
}

/// Composes the final color of given pixel: frame's radiance with bloom on
/// top, tonemapped.
pub fn compose(
    params: &TonemapPassParams,
    radiance: Vec4,
    bloom: Vec4,
) -> Vec4 {
    let mut color = radiance.xyz();

    if params.bloom != 0 {
        color += bloom.xyz() * params.bloom_intensity;
    }

    tonemap(params, color).extend(1.0)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn params(method: TonemapMethod) -> TonemapPassParams {
        TonemapPassParams {
            method: method.to_u32(),
            exposure: 1.0,
            gamma: 1.0,
            max_luminance: 1.0,
            reinhard_constant: 1.0,
            shoulder_strength: 0.22,
            linear_strength: 0.3,
            linear_angle: 0.1,
            toe_strength: 0.2,
            toe_numerator: 0.01,
            toe_denominator: 0.3,
            linear_white: 11.2,
            ..Default::default()
        }
    }

    #[test]
    fn linear() {
        let params = params(TonemapMethod::Linear);

        assert_relative_eq!(
            Vec3::splat(0.5),
            tonemap(&params, Vec3::splat(0.5)),
        );

        assert_relative_eq!(Vec3::ONE, tonemap(&params, Vec3::splat(5.0)));
        assert_relative_eq!(Vec3::ZERO, tonemap(&params, -Vec3::ONE));
    }

    #[test]
    fn reinhard_maps_max_luminance_into_white() {
        let params = params(TonemapMethod::Reinhard);

        assert_relative_eq!(
            Vec3::ONE,
            tonemap(&params, Vec3::ONE),
            epsilon = 0.0001
        );

        let half = tonemap(&params, Vec3::splat(0.5));

        assert!(half.x > 0.0 && half.x < 1.0);
    }

    #[test]
    fn filmic_maps_linear_white_into_white() {
        let params = params(TonemapMethod::AcesFilmic);

        assert_relative_eq!(
            Vec3::ONE,
            tonemap(&params, Vec3::splat(11.2)),
            epsilon = 0.0001
        );
    }

    #[test]
    fn curves_are_monotonic() {
        for method in [
            TonemapMethod::Linear,
            TonemapMethod::Reinhard,
            TonemapMethod::ReinhardSq,
            TonemapMethod::AcesFilmic,
        ] {
            let params = params(method);
            let mut prev = -1.0;

            for i in 0..100 {
                let value = tonemap(&params, Vec3::splat(i as f32 * 0.1)).x;

                assert!(value >= prev, "{method:?} at {i}");
                prev = value;
            }
        }
    }

    #[test]
    fn bloom() {
        let mut params = params(TonemapMethod::Linear);

        params.bloom_intensity = 0.5;

        let radiance = Vec4::splat(0.25);
        let bloom = Vec4::splat(0.5);

        assert_relative_eq!(0.25, compose(&params, radiance, bloom).x);

        params.bloom = 1;

        assert_relative_eq!(0.5, compose(&params, radiance, bloom).x);
    }
}
