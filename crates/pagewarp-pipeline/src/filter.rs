//! Post-filters applied to the rectified page image.
//!
//! [`apply_filter`] is a pure function: one new image per call, same
//! dimensions as the input, no cross-call state. Re-applying a
//! different [`FilterKind`] to the same rectified image never
//! compounds with a previous filter.
//!
//! `BackgroundFlatten` estimates the page background (median blur to
//! erase text, then a large Gaussian blur), divides it out of the
//! source to normalize illumination, and finishes with a linear
//! contrast remap that deepens the blacks. `AdaptiveBinarize` is the
//! classic local-mean threshold producing black/white output.

use image::Rgba;
use tracing::debug;

use crate::blur;
use crate::grayscale;
use crate::types::{
    Dimensions, FilterConfig, FilterKind, GrayImage, PipelineError, RgbaImage,
};

/// Scale constant of the contrast curve
/// `f = 131·(c+127) / (127·(131−c))`. Empirical tuning value.
const CONTRAST_CURVE_SCALE: f64 = 131.0;

/// Pivot of the contrast curve; input value 127 is a fixed point of
/// the remap.
const CONTRAST_CURVE_PIVOT: f64 = 127.0;

/// Apply the selected post-filter to a rectified image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the image has a zero
/// dimension. Degenerate but non-empty input produces (possibly
/// degenerate) output rather than an error.
pub fn apply_filter(
    image: &RgbaImage,
    kind: FilterKind,
    config: &FilterConfig,
) -> Result<RgbaImage, PipelineError> {
    let dims = Dimensions::of(image);
    if dims.is_degenerate() {
        return Err(PipelineError::InvalidArgument(format!(
            "cannot filter a {}x{} image",
            dims.width, dims.height,
        )));
    }

    let out = match kind {
        // Defensive copy: the caller may mutate the result, which must
        // not alias the rectified image it came from.
        FilterKind::None => image.clone(),
        FilterKind::BackgroundFlatten => background_flatten(image, config),
        FilterKind::AdaptiveBinarize => adaptive_binarize(image, config),
    };
    debug!(%kind, width = out.width(), height = out.height(), "filter applied");
    Ok(out)
}

/// Normalize uneven illumination by dividing out a blurred background
/// estimate, then boost contrast.
fn background_flatten(image: &RgbaImage, config: &FilterConfig) -> RgbaImage {
    // Median blur with a large kernel removes fine detail (text),
    // leaving an estimate of the paper color behind it. The window is
    // kept within the image bounds for very small inputs.
    let radius = (config.median_kernel.saturating_sub(1) / 2)
        .min(image.width().saturating_sub(1))
        .min(image.height().saturating_sub(1));
    let flattened = imageproc::filter::median_filter(image, radius, radius);

    // A much larger Gaussian blur smooths that estimate into a slowly
    // varying illumination field.
    let background = blur::gaussian_blur_rgba(
        &flattened,
        blur::kernel_sigma(config.background_blur_kernel),
    );

    let mean = mean_intensity(&background);
    debug!(mean, "background illumination estimated");

    let lut = contrast_brightness_lut(config.contrast, config.brightness);

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let src = image.get_pixel(x, y).0;
        let bg = background.get_pixel(x, y).0;
        let mut out = [0u8; 4];
        for c in 0..3 {
            // src / background × mean: a pixel matching its local
            // background lands on the global mean.
            let divisor = f64::from(bg[c]).max(1.0);
            let normalized = f64::from(src[c]) / divisor * mean;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let quantized = normalized.round().clamp(0.0, 255.0) as usize;
            out[c] = lut[quantized.min(255)];
        }
        out[3] = src[3];
        Rgba(out)
    })
}

/// Mean luminance of an RGBA image, using the standard weights.
fn mean_intensity(image: &RgbaImage) -> f64 {
    let count = f64::from(image.width()) * f64::from(image.height());
    if count == 0.0 {
        return 0.0;
    }
    let sum: f64 = image
        .pixels()
        .map(|p| {
            0.299f64.mul_add(
                f64::from(p.0[0]),
                0.587f64.mul_add(f64::from(p.0[1]), 0.114 * f64::from(p.0[2])),
            )
        })
        .sum();
    sum / count
}

/// Build the 256-entry lookup table for the brightness shift and
/// contrast remap.
///
/// Brightness is applied first in shadow/highlight form: a positive
/// shift raises the floor, a negative one lowers the ceiling. The
/// contrast remap is `out = in·f + 127·(1−f)` with
/// `f = 131·(c+127) / (127·(131−c))`, so 127 maps to itself and the
/// curve steepens around it.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn contrast_brightness_lut(contrast: f64, brightness: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let mut v = i as f64;

        if brightness != 0.0 {
            let (shadow, highlight) = if brightness > 0.0 {
                (brightness, 255.0)
            } else {
                (0.0, 255.0 + brightness)
            };
            v = v.mul_add((highlight - shadow) / 255.0, shadow);
        }

        if contrast != 0.0 {
            let f = CONTRAST_CURVE_SCALE * (contrast + CONTRAST_CURVE_PIVOT)
                / (CONTRAST_CURVE_PIVOT * (CONTRAST_CURVE_SCALE - contrast));
            v = v.mul_add(f, CONTRAST_CURVE_PIVOT * (1.0 - f));
        }

        *entry = v.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Local-mean adaptive threshold: black/white output where each pixel
/// is compared against the mean of its neighbourhood minus a constant
/// offset.
fn adaptive_binarize(image: &RgbaImage, config: &FilterConfig) -> RgbaImage {
    let gray = grayscale::to_grayscale(image);
    let integral = integral_image(&gray);
    let radius = config.binarize_block.saturating_sub(1) / 2;

    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let local_mean = region_mean(&integral, gray.width(), gray.height(), x, y, radius);
        let threshold = local_mean - config.binarize_offset;
        let value = if f64::from(gray.get_pixel(x, y).0[0]) > threshold {
            255
        } else {
            0
        };
        Rgba([value, value, value, image.get_pixel(x, y).0[3]])
    })
}

/// Summed-area table with a zero-padded border: entry
/// `[y·(w+1) + x]` holds the sum of all pixels in `[0,x) × [0,y)`.
fn integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += u64::from(gray.get_pixel(x, y).0[0]);
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean pixel value in the square neighbourhood of radius `radius`
/// centred on `(cx, cy)`, clamped to the image bounds.
#[allow(clippy::cast_precision_loss)]
fn region_mean(integral: &[u64], width: u32, height: u32, cx: u32, cy: u32, radius: u32) -> f64 {
    let stride = (width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1).min(width)) as usize;
    let y2 = ((cy + radius + 1).min(height)) as usize;

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return f64::from(u8::MAX) / 2.0;
    }

    let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}
