//! pagewarp-pipeline: Pure page-geometry pipeline (sans-IO).
//!
//! Turns a photographed document page into an upright, legible image
//! through: corner detection (downscale -> grayscale -> blur -> Canny
//! -> contour trace -> polygon approximation) -> perspective
//! rectification -> optional post-filter.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! image buffers and returns structured data. Loading photos, session
//! orchestration, and persistence live in the neighbouring crates.

pub mod approx;
pub mod blur;
pub mod contour;
pub mod detect;
pub mod downscale;
pub mod edge;
pub mod filter;
pub mod geometry;
pub mod grayscale;
pub mod rectify;
pub mod types;

pub use detect::{DetectionStages, detect_corners, detect_corners_staged};
pub use filter::apply_filter;
pub use geometry::{order_corners, target_rect_size};
pub use rectify::rectify;
pub use types::{
    Contour, Corners, DetectorConfig, Dimensions, FilterConfig, FilterKind, GrayImage,
    PipelineError, Point, RectifyConfig, RgbaImage,
};

/// Run the full pipeline in one call: detect corners (unless a manual
/// override is supplied), rectify, and filter.
///
/// Interactive embedders drive the stages individually through a
/// session; this is the batch entry point.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the image has a zero
/// dimension.
pub fn scan_page(
    image: &RgbaImage,
    manual_corners: Option<Corners>,
    filter_kind: FilterKind,
) -> Result<ScanResult, PipelineError> {
    let corners = match manual_corners {
        Some(c) => c,
        None => detect_corners(image, &DetectorConfig::default())?,
    };
    let rectified = rectify(image, &corners, &RectifyConfig::default())?;
    let filtered = apply_filter(&rectified, filter_kind, &FilterConfig::default())?;
    Ok(ScanResult {
        corners,
        rectified,
        filtered,
        filter_kind,
    })
}

/// Output of [`scan_page`]: everything the persistence layer stores,
/// plus the intermediate rectified image for re-filtering.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// The corners used for rectification (detected or manual).
    pub corners: Corners,
    /// The rectified page before filtering.
    pub rectified: RgbaImage,
    /// The final filtered page.
    pub filtered: RgbaImage,
    /// The filter that produced `filtered`.
    pub filter_kind: FilterKind,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    /// A 1000×800 black image containing a white quadrilateral with
    /// known corners.
    fn synthetic_page() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(1000, 800, Rgba([0, 0, 0, 255]));
        let polygon = [
            imageproc::point::Point::new(100i32, 50i32),
            imageproc::point::Point::new(900, 80),
            imageproc::point::Point::new(880, 750),
            imageproc::point::Point::new(120, 700),
        ];
        imageproc::drawing::draw_polygon_mut(&mut img, &polygon, Rgba([255, 255, 255, 255]));
        img
    }

    #[test]
    fn scan_page_end_to_end_with_manual_corners() {
        // With the exact corners supplied, the rectified dimensions
        // are fully determined by target_rect_size.
        let img = synthetic_page();
        let corners = Corners {
            top_left: Point::new(100.0, 50.0),
            top_right: Point::new(900.0, 80.0),
            bottom_right: Point::new(880.0, 750.0),
            bottom_left: Point::new(120.0, 700.0),
        };
        let result = scan_page(&img, Some(corners), FilterKind::None).unwrap();

        let (w, h) = target_rect_size(&corners);
        // Short sides win: bottom edge ≈ 762, left edge ≈ 651.
        assert!((761.0..763.0).contains(&w), "width {w}");
        assert!((650.0..652.0).contains(&h), "height {h}");
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            assert_eq!(result.rectified.width(), w.ceil() as u32);
            assert_eq!(result.rectified.height(), h.ceil() as u32);
        }

        // FilterKind::None passes the rectified image through.
        assert_eq!(result.filtered, result.rectified);
        assert_eq!(result.filter_kind, FilterKind::None);

        // The rectified interior is the white page.
        let mid = result
            .rectified
            .get_pixel(result.rectified.width() / 2, result.rectified.height() / 2);
        assert_eq!(mid.0[0], 255);
    }

    #[test]
    fn scan_page_detects_when_no_override_given() {
        let img = synthetic_page();
        let result = scan_page(&img, None, FilterKind::None).unwrap();

        // Detected corners track the drawn quadrilateral, so the
        // rectified page is close to the manual-corner dimensions.
        assert!(
            (result.rectified.width() as i64 - 762).abs() < 50,
            "unexpected rectified width {}",
            result.rectified.width(),
        );
        assert!(
            (result.rectified.height() as i64 - 651).abs() < 50,
            "unexpected rectified height {}",
            result.rectified.height(),
        );
    }

    #[test]
    fn scan_page_rejects_empty_image() {
        let empty = RgbaImage::new(0, 0);
        assert!(matches!(
            scan_page(&empty, None, FilterKind::None),
            Err(PipelineError::InvalidArgument(_)),
        ));
    }
}
