use std::path::Path;

use glam::uvec2;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{gpu, Result};

/// Loads `product_0.png` ..= `product_31.png` from given directory; textures
/// that cannot be loaded get replaced with generated noise.
///
/// Texels are packed as RGBA8, the way the kernels unpack them.
pub fn load(dir: Option<&Path>) -> Vec<Vec<u32>> {
    (0..gpu::NUM_BLUE_NOISE)
        .map(|idx| {
            let Some(dir) = dir else {
                return generate(idx);
            };

            let path = dir.join(format!("product_{idx}.png"));

            match load_one(&path) {
                Ok(texels) => texels,
                Err(err) => {
                    warn!(
                        "Couldn't load blue noise from `{}`, generating it: \
                         {err}",
                        path.display(),
                    );

                    generate(idx)
                }
            }
        })
        .collect()
}

fn load_one(path: &Path) -> Result<Vec<u32>> {
    let image = image::open(path)?.to_rgba8();
    let size = uvec2(image.width(), image.height());

    if size != glam::UVec2::splat(gpu::BLUE_NOISE_SIZE) {
        warn!(
            "Blue noise `{}` is {}x{}, expected {}x{}; it will be cropped \
             or wrapped around",
            path.display(),
            size.x,
            size.y,
            gpu::BLUE_NOISE_SIZE,
            gpu::BLUE_NOISE_SIZE,
        );
    }

    info!("Loaded blue noise from `{}`", path.display());

    let texels = (0..gpu::BLUE_NOISE_SIZE)
        .flat_map(|y| (0..gpu::BLUE_NOISE_SIZE).map(move |x| (x, y)))
        .map(|(x, y)| {
            let pixel = image.get_pixel(x % size.x, y % size.y);

            u32::from_le_bytes(pixel.0)
        })
        .collect();

    Ok(texels)
}

/// Generates a texture of white noise; a stand-in for when actual blue noise
/// is not available.
pub fn generate(idx: u32) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(idx as u64);

    (0..gpu::BLUE_NOISE_SIZE * gpu::BLUE_NOISE_SIZE)
        .map(|_| rng.gen())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated() {
        let noise = load(None);

        assert_eq!(gpu::NUM_BLUE_NOISE as usize, noise.len());

        for texels in &noise {
            assert_eq!(64 * 64, texels.len());
        }

        assert_ne!(noise[0], noise[1]);
        assert_eq!(noise[3], generate(3));
    }

    #[test]
    fn loaded() {
        let dir = std::env::temp_dir()
            .join(format!("lantern-blue-noise-{}", std::process::id()));

        std::fs::create_dir_all(&dir).unwrap();

        let image = image::RgbaImage::from_fn(64, 64, |x, y| {
            image::Rgba([x as u8, y as u8, 0, 255])
        });

        image.save(dir.join("product_0.png")).unwrap();

        let noise = load(Some(&dir));

        assert_eq!(u32::from_le_bytes([5, 7, 0, 255]), noise[0][7 * 64 + 5]);

        // Missing files are generated
        assert_eq!(generate(1), noise[1]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
