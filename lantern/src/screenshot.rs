use std::path::PathBuf;

use glam::UVec2;
use log::info;

use crate::{padded_bytes_per_row, Error, Result, TextureFormat};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenshotRequest {
    pub path: PathBuf,

    /// Size of a centered region to save instead of the whole frame; `None`
    /// (or a zero-sized crop) saves everything.
    pub crop: Option<UVec2>,
}

impl ScreenshotRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            crop: None,
        }
    }

    pub fn with_crop(mut self, crop: UVec2) -> Self {
        self.crop = Some(crop);
        self
    }

    /// Returns the region of a frame of given size this screenshot covers, as
    /// `(offset, size)`.
    pub fn region(&self, frame: UVec2) -> Result<(UVec2, UVec2)> {
        let Some(crop) = self.crop.filter(|crop| crop.x > 0 && crop.y > 0)
        else {
            return Ok((UVec2::ZERO, frame));
        };

        if crop.x > frame.x || crop.y > frame.y {
            return Err(Error::InvalidCrop { crop, frame });
        }

        Ok(((frame - crop) / 2, crop))
    }

    /// Saves a frame read back from the output texture, i.e. RGBA8 rows
    /// padded to the copy alignment.
    pub(crate) fn save(&self, frame: UVec2, bytes: &[u8]) -> Result<()> {
        let (offset, size) = self.region(frame)?;
        let row = padded_bytes_per_row(frame.x, TextureFormat::Rgba8Unorm);

        let mut pixels = Vec::with_capacity((size.x * size.y * 4) as usize);

        for y in offset.y..(offset.y + size.y) {
            let start = (y * row + offset.x * 4) as usize;
            let end = start + (size.x * 4) as usize;

            pixels.extend_from_slice(&bytes[start..end]);
        }

        let wrap = |source: Error| Error::Screenshot {
            path: self.path.clone(),
            source: Box::new(source),
        };

        let image = image::RgbaImage::from_raw(size.x, size.y, pixels)
            .ok_or_else(|| wrap(Error::InvalidCrop { crop: size, frame }))?;

        image
            .save_with_format(&self.path, image::ImageFormat::Png)
            .map_err(|err| wrap(err.into()))?;

        info!(
            "Saved screenshot to `{}` ({}x{})",
            self.path.display(),
            size.x,
            size.y,
        );

        Ok(())
    }
}
