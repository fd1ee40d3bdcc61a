//! Byte decoding and grayscale conversion.
//!
//! The pipeline proper operates on in-memory [`RgbaImage`] values; the
//! photo source hands those over directly or as encoded bytes (PNG,
//! JPEG, BMP, WebP). Grayscale conversion uses the standard luminance
//! weights `0.299·R + 0.587·G + 0.114·B`.

use crate::types::{GrayImage, PipelineError, RgbaImage};

/// Decode encoded image bytes into an RGBA buffer.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if `bytes` is empty and
/// [`PipelineError::Decode`] if the format is unrecognized or the data
/// is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::InvalidArgument(
            "image byte buffer is empty".to_string(),
        ));
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Convert an RGBA image to single-channel grayscale.
#[must_use = "returns the grayscale image"]
pub fn to_grayscale(image: &RgbaImage) -> GrayImage {
    image::imageops::grayscale(image)
}
