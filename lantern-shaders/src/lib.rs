#![cfg_attr(target_arch = "spirv", no_std)]

pub mod bloom_downsample;
pub mod bloom_upsample;
pub mod denoise_atrous;
pub mod denoise_modulate;
pub mod denoise_reproject;
pub mod denoise_weights;
pub mod preview;
pub mod restir_shade;
pub mod restir_spatial;
pub mod restir_temporal;
pub mod tonemap;
pub mod wavefront_compact;
pub mod wavefront_connect;
pub mod wavefront_direct_illumination;
pub mod wavefront_extend;
pub mod wavefront_finalize;
pub mod wavefront_generate;
pub mod wavefront_shade;
