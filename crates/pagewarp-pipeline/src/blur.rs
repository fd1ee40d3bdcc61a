//! Gaussian blur for noise suppression and background estimation.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. The detector blurs
//! the downscaled grayscale image before Canny; the background-flatten
//! filter blurs a color image channel by channel.
//!
//! Configuration expresses blur strength as an odd kernel size in
//! pixels; [`kernel_sigma`] converts that to the sigma the underlying
//! separable filter expects.

use image::GrayImage;

use crate::types::RgbaImage;

/// Sigma equivalent for an odd Gaussian kernel size.
///
/// Uses the conventional derivation `0.3·((k−1)/2 − 1) + 0.8`, so a
/// 3×3 kernel maps to σ = 0.8 and a 61×61 kernel to σ = 9.5.
#[must_use]
pub fn kernel_sigma(kernel: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let half = (kernel.saturating_sub(1)) as f32 / 2.0;
    0.3f32.mul_add(half - 1.0, 0.8)
}

/// Apply Gaussian blur to a grayscale image.
///
/// Non-positive sigma values return the image unchanged, since the
/// underlying `imageproc` function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Apply Gaussian blur to an RGBA image by blurring each channel
/// independently.
///
/// `imageproc::filter::gaussian_blur_f32` only accepts `GrayImage`, so
/// this splits the RGBA image into four single-channel images, blurs
/// each, and reassembles. Gaussian blur is a linear per-channel
/// operation, so the result is equivalent to blurring in color space.
///
/// Non-positive sigma values return the image unchanged.
#[must_use = "returns the blurred RGBA image"]
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width(), image.height());

    let channels: [GrayImage; 4] = std::array::from_fn(|c| {
        GrayImage::from_fn(w, h, |x, y| image::Luma([image.get_pixel(x, y).0[c]]))
    });

    let blurred: [GrayImage; 4] =
        std::array::from_fn(|c| imageproc::filter::gaussian_blur_f32(&channels[c], sigma));

    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            blurred[0].get_pixel(x, y).0[0],
            blurred[1].get_pixel(x, y).0[0],
            blurred[2].get_pixel(x, y).0[0],
            blurred[3].get_pixel(x, y).0[0],
        ])
    })
}
