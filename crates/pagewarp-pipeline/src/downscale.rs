//! Fixed-factor downscaling to bound detector cost.
//!
//! The corner detector runs on a much smaller copy of the source image
//! (0.1× by default) and scales detected coordinates back up by the
//! inverse factor. Catmull-Rom resampling keeps edges crisp enough for
//! Canny to find them at the reduced resolution.

use image::imageops::{self, FilterType};

use crate::types::RgbaImage;

/// Downscale an image by a uniform factor.
///
/// A factor of 1.0 (or anything ≥ 1.0, or non-finite) returns the
/// image unchanged -- the detector never upscales. Output dimensions
/// are clamped to at least 1×1 so extreme factors cannot produce an
/// empty buffer.
#[must_use = "returns the downscaled image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn downscale(image: &RgbaImage, factor: f64) -> RgbaImage {
    if !factor.is_finite() || factor <= 0.0 || factor >= 1.0 {
        return image.clone();
    }

    let width = ((f64::from(image.width()) * factor).round() as u32).max(1);
    let height = ((f64::from(image.height()) * factor).round() as u32).max(1);

    imageops::resize(image, width, height, FilterType::CatmullRom)
}
