use std::path::Path;

use glam::{uvec2, vec3, UVec2, Vec4};
use log::{info, warn};

use crate::Result;

/// Equirectangular environment map, lighting rays that escape the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Sky {
    pub texels: Vec<Vec4>,
    pub size: UVec2,
}

impl Sky {
    /// Loads the map from given file (any format `image` can decode, HDR
    /// included), falling back to [`Self::gradient()`] when that fails.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::gradient();
        };

        match Self::load_file(path) {
            Ok(sky) => sky,
            Err(err) => {
                warn!(
                    "Couldn't load skybox from `{}`, using a gradient: {err}",
                    path.display(),
                );

                Self::gradient()
            }
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let image = image::open(path)?.to_rgba32f();
        let size = uvec2(image.width(), image.height());

        info!(
            "Loaded skybox from `{}`; size={}x{}",
            path.display(),
            size.x,
            size.y,
        );

        let texels = image
            .pixels()
            .map(|pixel| Vec4::from_array(pixel.0))
            .collect();

        Ok(Self { texels, size })
    }

    /// Plain sky: blue at the zenith fading into white at the horizon, with a
    /// dark ground below.
    pub fn gradient() -> Self {
        let size = uvec2(64, 32);
        let zenith = vec3(0.3, 0.5, 0.9);
        let horizon = vec3(1.0, 1.0, 1.0);
        let ground = vec3(0.1, 0.1, 0.1);

        let texels = (0..size.y)
            .flat_map(|y| {
                let v = (y as f32 + 0.5) / size.y as f32;

                let color = if v < 0.5 {
                    horizon.lerp(zenith, 1.0 - v * 2.0)
                } else {
                    ground
                };

                (0..size.x).map(move |_| color.extend(1.0))
            })
            .collect();

        Self { texels, size }
    }
}
