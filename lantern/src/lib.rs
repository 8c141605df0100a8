//! Lantern: real-time wavefront path tracer with ReSTIR direct lighting and
//! an SVGF-style denoiser.
//!
//! The host describes the world through [`Mesh`]es and [`Instance`]s, hands
//! over a [`FrameInput`] each frame and gets back a tonemapped image living
//! in the output slot of the descriptor table.

mod accel;
mod backend;
mod blue_noise;
mod buffers;
mod camera;
mod error;
mod mesh;
mod passes;
mod renderer;
mod resources;
mod screenshot;
mod settings;
mod shaders;
mod sky;
mod stages;
mod timings;

pub use lantern_gpu as gpu;

pub use self::accel::*;
pub use self::backend::*;
pub use self::buffers::*;
pub use self::camera::*;
pub use self::error::*;
pub use self::mesh::*;
pub use self::passes::*;
pub use self::renderer::*;
pub use self::resources::*;
pub use self::screenshot::*;
pub use self::settings::*;
pub use self::shaders::*;
pub use self::sky::*;
pub use self::stages::*;
pub use self::timings::total as total_timings;
