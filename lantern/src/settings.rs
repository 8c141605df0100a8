use std::path::PathBuf;

use glam::{uvec2, UVec2};

use crate::gpu;
pub use crate::gpu::{DenoiserDebugView as DenoiserDebug, TonemapMethod};

/// Runtime configuration, passed into every [`crate::Renderer::render()`]
/// call; can be freely changed between frames.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub render_mode: RenderMode,
    pub max_bounces: u32,
    pub accumulation: bool,

    /// Maximum number of frames accumulated while the camera stays still;
    /// zero means no limit.
    pub max_accumulated_frames: u32,

    /// Rays are traced up to this many scene-diagonals away from their
    /// origin.
    pub tracing_distance_multiplier: f32,

    pub hdri_lighting_strength: f32,
    pub hdri_background_strength: f32,
    pub restir: RestirSettings,
    pub denoiser: DenoiserSettings,
    pub tonemap: TonemapSettings,
    pub bloom: BloomSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::PathTrace,
            max_bounces: 5,
            accumulation: true,
            max_accumulated_frames: 512,
            tracing_distance_multiplier: 300.0,
            hdri_lighting_strength: 0.6,
            hdri_background_strength: 0.75,
            restir: Default::default(),
            denoiser: Default::default(),
            tonemap: Default::default(),
            bloom: Default::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    #[default]
    PathTrace,

    /// Single-pass, primary-hit preview lit only by the sky.
    RayTrace,

    Albedo,
    Normal,
    Uv,
}

impl RenderMode {
    /// Returns the preview mode to run instead of the path tracer, if any.
    pub(crate) fn preview(self) -> Option<gpu::PreviewMode> {
        match self {
            RenderMode::PathTrace => None,
            RenderMode::RayTrace => Some(gpu::PreviewMode::RayTrace),
            RenderMode::Albedo => Some(gpu::PreviewMode::Albedo),
            RenderMode::Normal => Some(gpu::PreviewMode::Normal),
            RenderMode::Uv => Some(gpu::PreviewMode::Uv),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RestirSettings {
    pub mode: RestirMode,
    pub ris_candidates: u32,

    /// Previous frame's reservoir can contribute at most this many times the
    /// current frame's candidates.
    pub current_light_clamp: f32,

    /// Maximum deviation (`1 - cos`) between normals of neighbours whose
    /// reservoirs get reused.
    pub normal_threshold: f32,

    pub depth_threshold: f32,
    pub num_spatial_samples: u32,
    pub spatial_radius: f32,
}

impl Default for RestirSettings {
    fn default() -> Self {
        Self {
            mode: RestirMode::RisTemporalSpatial,
            ris_candidates: 16,
            current_light_clamp: 20.0,
            normal_threshold: 0.25,
            depth_threshold: 0.1,
            num_spatial_samples: 5,
            spatial_radius: 30.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestirMode {
    /// Picks a single, uniformly chosen light.
    Off,

    Ris,
    RisTemporal,
    RisSpatial,

    #[default]
    RisTemporalSpatial,
}

impl RestirMode {
    pub fn temporal(self) -> bool {
        matches!(self, Self::RisTemporal | Self::RisTemporalSpatial)
    }

    pub fn spatial(self) -> bool {
        matches!(self, Self::RisSpatial | Self::RisTemporalSpatial)
    }

    /// Whether primary hits resolve their direct lighting through the
    /// resampling passes.
    pub fn has_reuse(self) -> bool {
        self.temporal() || self.spatial()
    }

    /// Returns how many candidates are streamed through each reservoir.
    pub fn candidates(self, ris_candidates: u32) -> u32 {
        if self == Self::Off {
            1
        } else {
            ris_candidates.max(1)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiserSettings {
    pub reprojection: bool,
    pub denoising: bool,
    pub alpha: f32,
    pub moments_alpha: f32,

    /// Maximum deviation (`1 - cos`) between normals of a pixel and its
    /// reprojected counterpart.
    pub normal_threshold: f32,

    pub depth_threshold: f32,
    pub phi_normal: f32,
    pub phi_illumination: f32,
    pub filter_iterations: u32,
    pub history_cap: u32,
    pub debug: DenoiserDebug,
    pub demodulate: bool,
}

impl Default for DenoiserSettings {
    fn default() -> Self {
        Self {
            reprojection: true,
            denoising: true,
            alpha: 0.05,
            moments_alpha: 0.2,
            normal_threshold: 0.4,
            depth_threshold: 0.1,
            phi_normal: 128.0,
            phi_illumination: 4.0,
            filter_iterations: 5,
            history_cap: 4,
            debug: DenoiserDebug::None,
            demodulate: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TonemapSettings {
    pub method: TonemapMethod,
    pub exposure: f32,
    pub gamma: f32,
    pub max_luminance: f32,
    pub reinhard_constant: f32,
    pub shoulder_strength: f32,
    pub linear_strength: f32,
    pub linear_angle: f32,
    pub toe_strength: f32,
    pub toe_numerator: f32,
    pub toe_denominator: f32,
    pub linear_white: f32,
}

impl Default for TonemapSettings {
    fn default() -> Self {
        Self {
            method: TonemapMethod::AcesFilmic,
            exposure: 0.2,
            gamma: 1.9,
            max_luminance: 1.0,
            reinhard_constant: 1.0,
            shoulder_strength: 0.22,
            linear_strength: 0.3,
            linear_angle: 0.1,
            toe_strength: 0.2,
            toe_numerator: 0.01,
            toe_denominator: 0.3,
            linear_white: 11.2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BloomSettings {
    pub enabled: bool,
    pub intensity: f32,
    pub radius: f32,
    pub brightness_threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            intensity: 0.75,
            radius: 2.0,
            brightness_threshold: 6.0,
        }
    }
}

/// Startup-only configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub size: UVec2,

    /// Directory with compiled shaders and their `manifest.txt`, as produced
    /// by `lantern-shader-builder`.
    pub shader_dir: PathBuf,

    /// Directory with `product_0.png` ..= `product_31.png`; when missing,
    /// blue noise gets generated.
    pub blue_noise_dir: Option<PathBuf>,

    /// Equirectangular environment map; when missing, a plain gradient gets
    /// used.
    pub skybox: Option<PathBuf>,

    /// Whether to collect per-pass GPU timings.
    pub timings: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            size: uvec2(1280, 720),
            shader_dir: PathBuf::from("target/lantern-shaders"),
            blue_noise_dir: None,
            skybox: None,
            timings: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = RenderSettings::default();

        assert_eq!(RenderMode::PathTrace, settings.render_mode);
        assert_eq!(5, settings.max_bounces);
        assert!(settings.accumulation);
        assert_eq!(512, settings.max_accumulated_frames);
        assert_eq!(300.0, settings.tracing_distance_multiplier);
        assert_eq!(0.6, settings.hdri_lighting_strength);
        assert_eq!(0.75, settings.hdri_background_strength);

        assert_eq!(RestirMode::RisTemporalSpatial, settings.restir.mode);
        assert_eq!(16, settings.restir.ris_candidates);
        assert_eq!(20.0, settings.restir.current_light_clamp);
        assert_eq!(0.25, settings.restir.normal_threshold);
        assert_eq!(0.1, settings.restir.depth_threshold);
        assert_eq!(5, settings.restir.num_spatial_samples);
        assert_eq!(30.0, settings.restir.spatial_radius);

        assert!(settings.denoiser.reprojection);
        assert!(settings.denoiser.denoising);
        assert_eq!(0.05, settings.denoiser.alpha);
        assert_eq!(0.2, settings.denoiser.moments_alpha);
        assert_eq!(0.4, settings.denoiser.normal_threshold);
        assert_eq!(128.0, settings.denoiser.phi_normal);
        assert_eq!(4.0, settings.denoiser.phi_illumination);
        assert_eq!(5, settings.denoiser.filter_iterations);
        assert_eq!(4, settings.denoiser.history_cap);
        assert_eq!(DenoiserDebug::None, settings.denoiser.debug);
        assert!(settings.denoiser.demodulate);

        assert_eq!(0.2, settings.tonemap.exposure);
        assert_eq!(1.9, settings.tonemap.gamma);
        assert_eq!(11.2, settings.tonemap.linear_white);

        assert!(settings.bloom.enabled);
        assert_eq!(0.75, settings.bloom.intensity);
        assert_eq!(2.0, settings.bloom.radius);
        assert_eq!(6.0, settings.bloom.brightness_threshold);
    }

    #[test]
    fn restir_modes() {
        assert!(!RestirMode::Off.has_reuse());
        assert!(!RestirMode::Ris.has_reuse());
        assert!(RestirMode::RisTemporal.temporal());
        assert!(!RestirMode::RisTemporal.spatial());
        assert!(RestirMode::RisSpatial.spatial());
        assert!(RestirMode::RisTemporalSpatial.has_reuse());

        assert_eq!(1, RestirMode::Off.candidates(16));
        assert_eq!(16, RestirMode::Ris.candidates(16));
    }
}
