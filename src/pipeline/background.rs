//! Softened page backdrop: Gaussian blur with edge clamping, then a
//! translucent white veil so overlaid text stays legible.

use image::imageops;
use image::{Rgb, RgbImage};

use crate::config::BackgroundConfig;

pub struct BackgroundCompositor {
    config: BackgroundConfig,
}

impl BackgroundCompositor {
    pub fn new(config: BackgroundConfig) -> Self {
        Self { config }
    }

    /// Returns an image with the same dimensions as `source`.
    pub fn compose(&self, source: &RgbImage) -> RgbImage {
        let _span = tracing::debug_span!(
            "compose_background",
            width = source.width(),
            height = source.height(),
            sigma = self.config.blur_sigma,
        )
        .entered();

        // Kernel weights are renormalized over in-bounds taps, so uniform
        // areas and borders keep their brightness.
        let blurred = if self.config.blur_sigma > 0.0 {
            imageops::blur(source, self.config.blur_sigma)
        } else {
            source.clone()
        };

        veil(blurred, self.config.overlay_opacity)
    }
}

/// Source-over composite of white at `opacity` onto every pixel.
fn veil(mut img: RgbImage, opacity: f32) -> RgbImage {
    let alpha = opacity.clamp(0.0, 1.0);
    if alpha == 0.0 {
        return img;
    }
    for Rgb(channels) in img.pixels_mut() {
        for c in channels.iter_mut() {
            let v = alpha * 255.0 + (1.0 - alpha) * f32::from(*c);
            *c = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    img
}
