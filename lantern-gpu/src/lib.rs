//! Common structs, algorithms etc. used by Lantern's shaders and renderer.
//!
//! Every kernel is written as a plain per-invocation function operating on
//! slices, so that the shaders crate only has to map bindings into arguments
//! and so that all of the algorithms can be tested on the CPU.

#![cfg_attr(target_arch = "spirv", no_std)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::too_many_arguments)]

mod bloom;
mod bvh_view;
mod camera;
mod counters;
mod denoise;
mod gbuffer;
mod lights;
mod material;
mod noise;
mod passes;
mod preview;
mod ray;
mod reservoir;
mod restir;
mod scene;
mod sky;
#[cfg(test)]
mod testing;
mod tonemap;
mod utils;
mod wavefront;

pub use self::bloom::*;
pub use self::bvh_view::*;
pub use self::camera::*;
pub use self::counters::*;
pub use self::denoise::*;
pub use self::gbuffer::*;
pub use self::lights::*;
pub use self::material::*;
pub use self::noise::*;
pub use self::passes::*;
pub use self::preview::*;
pub use self::ray::*;
pub use self::reservoir::*;
pub use self::restir::*;
pub use self::scene::*;
pub use self::sky::*;
pub use self::tonemap::*;
pub use self::utils::*;
pub use self::wavefront::*;

pub mod prelude {
    pub use core::f32::consts::PI;

    pub use spirv_std::glam::*;
    #[cfg(target_arch = "spirv")]
    pub use spirv_std::num_traits::Float;
    pub use spirv_std::{spirv, Image};

    pub use crate::*;
}

/// Number of threads per workgroup for passes that run one thread per ray.
pub const WORKGROUP_SIZE_1D: u32 = 256;

/// Number of threads per workgroup (per axis) for passes that run one thread
/// per pixel.
pub const WORKGROUP_SIZE_2D: u32 = 16;

/// Number of blue-noise textures cycled through, one per frame.
pub const NUM_BLUE_NOISE: u32 = 32;

/// Width and height of a single blue-noise texture.
pub const BLUE_NOISE_SIZE: u32 = 64;

/// Number of mip levels in the bloom chain.
pub const NUM_BLOOM_MIPS: u32 = 12;

/// Sentinel used for "no instance", "no triangle", "no light" etc.
pub const INVALID_ID: u32 = u32::MAX;

pub const LANTERN_EPSILON: f32 = 0.0001;
