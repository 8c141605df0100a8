use bytemuck::{Pod, Zeroable};
use glam::UVec2;

/// Index of the previous-frame camera in the cameras buffer.
pub const CAMERA_PREV: usize = 0;

/// Index of the current-frame camera in the cameras buffer.
pub const CAMERA_CURR: usize = 1;

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct GeneratePassParams {
    pub seed: u32,
    pub frame: u32,
    pub max_t: f32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct BouncePassParams {
    pub seed: u32,
    pub bounce: u32,
    pub max_bounces: u32,

    /// Whether the primary bounce's direct lighting is resolved by the
    /// temporal / spatial resampling passes instead of the bounce itself.
    pub reuse: u32,

    pub ris_candidates: u32,
    pub max_t: f32,
    pub hdri_lighting: f32,
    pub hdri_background: f32,
    pub sky_size: UVec2,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl BouncePassParams {
    pub fn is_primary(&self) -> bool {
        self.bounce == 0
    }

    pub fn has_reuse(&self) -> bool {
        self.reuse != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct RestirPassParams {
    pub seed: u32,
    pub ris_candidates: u32,
    pub current_light_clamp: f32,
    pub normal_threshold: f32,
    pub depth_threshold: f32,
    pub num_spatial_samples: u32,
    pub spatial_radius: f32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct FinalizePassParams {
    /// Number of accumulated frames, including the current one; zero when
    /// accumulation is disabled.
    pub accumulated_frames: u32,

    pub demodulate: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct ReprojectPassParams {
    pub alpha: f32,
    pub moments_alpha: f32,
    pub normal_threshold: f32,
    pub depth_threshold: f32,
    pub history_cap: f32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub _pad2: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct WeightsPassParams {
    pub history_cap: f32,
    pub phi_normal: f32,
    pub phi_illumination: f32,
    pub debug: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct AtrousPassParams {
    pub step: u32,

    /// Whether this iteration's output should be also written back into the
    /// illumination history.
    pub feedback: u32,

    pub phi_normal: f32,
    pub phi_illumination: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct ModulatePassParams {
    pub demodulate: u32,
    pub debug: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct BloomPassParams {
    pub src_size: UVec2,
    pub dst_size: UVec2,
    pub threshold: f32,
    pub radius: f32,

    /// Whether this is the first downsample, which also applies the
    /// bright-pass and Karis average.
    pub first: u32,

    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct TonemapPassParams {
    pub method: u32,
    pub bloom: u32,
    pub passthrough: u32,
    pub bloom_intensity: f32,
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
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct PreviewPassParams {
    pub mode: u32,
    pub max_t: f32,
    pub hdri_lighting: f32,
    pub hdri_background: f32,
    pub sky_size: UVec2,
    pub _pad0: u32,
    pub _pad1: u32,
}
