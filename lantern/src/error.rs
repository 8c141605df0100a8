use std::io;
use std::path::PathBuf;

use glam::UVec2;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Recoverable errors; broken invariants (zero-sized buffers, switching into
/// an unknown slot, a scene without lights etc.) panic instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("couldn't find any suitable GPU adapter")]
    AdapterNotFound,

    #[error("couldn't request GPU device")]
    RequestDevice(#[source] wgpu::RequestDeviceError),

    #[error("couldn't compile shader `{entry}`: {message}")]
    ShaderCompile { entry: String, message: String },

    #[error("couldn't find shader `{0}`")]
    ShaderNotFound(String),

    #[error("crop {crop} is larger than the frame ({frame})")]
    InvalidCrop { crop: UVec2, frame: UVec2 },

    #[error("couldn't save screenshot to `{path}`")]
    Screenshot {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
