//! Builders turning the frame's settings into stages.
//!
//! Each pass only describes its dispatches (what they bind, read and write);
//! ordering is checked by [`crate::StageSchedule::validate()`] and recording
//! happens in [`crate::StageSchedule::record()`].

mod denoiser;
mod post;
mod preview;
mod restir;
mod wavefront;

use glam::UVec2;

pub use self::denoiser::*;
pub use self::post::*;
pub use self::preview::*;
pub use self::restir::*;
pub use self::wavefront::*;
use crate::{FrameBuffers, RenderSettings};

/// Everything the passes need to know about the frame being built.
#[derive(Clone, Copy, Debug)]
pub struct PassContext<'a> {
    pub buffers: &'a FrameBuffers,
    pub settings: &'a RenderSettings,
    pub screen: UVec2,

    /// Per-frame random seed.
    pub seed: u32,

    /// Total number of frames rendered so far.
    pub frame: u32,

    /// Maximum distance traced by any ray.
    pub max_t: f32,

    /// Accumulated-frame counter, already bumped for this frame; zero when
    /// accumulation is disabled.
    pub accumulated_frames: u32,
}
