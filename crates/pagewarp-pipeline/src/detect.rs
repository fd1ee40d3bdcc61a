//! Page corner detection.
//!
//! Produces candidate [`Corners`] from a raw photo:
//!
//! 1. Downscale by a fixed factor (0.1× by default) to bound cost
//! 2. Grayscale + small Gaussian blur to suppress noise
//! 3. Canny edge detection (dual-threshold hysteresis)
//! 4. Trace all closed contours in the edge map
//! 5. Sort contours by enclosed area, descending
//! 6. Simplify each in turn; accept the first that reduces to exactly
//!    four vertices and encloses more than the minimum area
//! 7. Order the vertices and scale them back to source resolution
//!
//! "No page found" is not an error: detection degrades to the full
//! image bounds so the user can still adjust corners manually. The
//! only hard failure is a zero-dimension input.

use image::Rgba;
use tracing::{debug, info};

use crate::blur;
use crate::contour;
use crate::downscale;
use crate::edge;
use crate::geometry;
use crate::grayscale;
use crate::types::{
    Contour, Corners, DetectorConfig, Dimensions, GrayImage, PipelineError, Point, RgbaImage,
};

/// Intermediate rasters and vector data captured during detection.
///
/// All coordinates are in the downscaled working space. Diagnostics
/// are display-only; nothing here feeds back into detection.
#[derive(Debug, Clone)]
pub struct DetectionStages {
    /// The downscaled working image.
    pub downscaled: RgbaImage,
    /// Grayscale + Gaussian blur, as fed to the edge detector.
    pub blurred: GrayImage,
    /// Binary Canny edge map.
    pub edges: GrayImage,
    /// All traced contours, sorted by enclosed area descending.
    pub contours: Vec<Contour>,
    /// The accepted four-vertex candidate, if any (pre-ordering).
    pub candidate: Option<Contour>,
}

/// Palette for the contour overlay, cycled per contour.
const OVERLAY_COLORS: [[u8; 4]; 7] = [
    [255, 255, 255, 255],
    [0, 255, 255, 255],
    [255, 0, 255, 255],
    [255, 255, 0, 255],
    [0, 0, 255, 255],
    [0, 255, 0, 255],
    [255, 0, 0, 255],
];

impl DetectionStages {
    /// Render the traced contours onto a black canvas, one palette
    /// color per contour, largest first. Intended for debug display
    /// next to the edge map.
    #[must_use]
    pub fn contour_overlay(&self) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(
            self.edges.width(),
            self.edges.height(),
            Rgba([0, 0, 0, 255]),
        );
        for (i, traced) in self.contours.iter().enumerate() {
            let color = Rgba(OVERLAY_COLORS[i % OVERLAY_COLORS.len()]);
            for p in traced.points() {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (x, y) = (p.x.round() as u32, p.y.round() as u32);
                if x < canvas.width() && y < canvas.height() {
                    canvas.put_pixel(x, y, color);
                }
            }
        }
        canvas
    }
}

/// Detect the page corners in a photo.
///
/// Returns the detected corners, or the full image bounds when no
/// four-vertex candidate is found.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the image has a zero
/// dimension.
pub fn detect_corners(
    image: &RgbaImage,
    config: &DetectorConfig,
) -> Result<Corners, PipelineError> {
    detect_corners_staged(image, config).map(|(corners, _)| corners)
}

/// Detect the page corners, also returning the intermediate stages
/// for diagnostic display.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the image has a zero
/// dimension.
pub fn detect_corners_staged(
    image: &RgbaImage,
    config: &DetectorConfig,
) -> Result<(Corners, DetectionStages), PipelineError> {
    let dims = Dimensions::of(image);
    if dims.is_degenerate() {
        return Err(PipelineError::InvalidArgument(format!(
            "cannot detect corners in a {}x{} image",
            dims.width, dims.height,
        )));
    }

    let downscaled = downscale::downscale(image, config.downscale_factor);
    let blurred = blur::gaussian_blur(
        &grayscale::to_grayscale(&downscaled),
        blur::kernel_sigma(config.blur_kernel),
    );
    let edges = edge::canny(&blurred, config.canny_low, config.canny_high);
    let contours = contour::sort_by_area_desc(contour::trace_contours(&edges));
    debug!(
        contour_count = contours.len(),
        width = edges.width(),
        height = edges.height(),
        "edge map traced",
    );

    let candidate = find_quad_candidate(&contours, config);

    let corners = match &candidate {
        Some(quad) => {
            let scale_x = f64::from(dims.width) / f64::from(downscaled.width());
            let scale_y = f64::from(dims.height) / f64::from(downscaled.height());
            let scaled: Vec<Point> = quad
                .points()
                .iter()
                .map(|p| Point::new(p.x * scale_x, p.y * scale_y))
                .collect();
            let corners = geometry::order_corners(&scaled)?;
            info!(
                top_left = ?corners.top_left,
                top_right = ?corners.top_right,
                bottom_right = ?corners.bottom_right,
                bottom_left = ?corners.bottom_left,
                "page candidate found",
            );
            corners
        }
        None => {
            info!("no page candidate found, falling back to full image bounds");
            Corners::full_image(dims)
        }
    };

    let stages = DetectionStages {
        downscaled,
        blurred,
        edges,
        contours,
        candidate,
    };
    Ok((corners, stages))
}

/// Walk the area-sorted contours and return the first that simplifies
/// to exactly four vertices while enclosing more than the minimum raw
/// area.
fn find_quad_candidate(contours: &[Contour], config: &DetectorConfig) -> Option<Contour> {
    for traced in contours {
        let simplified =
            crate::approx::approx_polygon(traced, config.approx_tolerance_ratio * traced.perimeter());
        if simplified.len() == 4 && traced.area() > config.min_area {
            debug!(
                raw_points = traced.len(),
                raw_area = traced.area(),
                "accepted quadrilateral candidate",
            );
            return Some(simplified);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 1000×800 black image with a white quadrilateral at known
    /// corner positions.
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
    fn zero_dimension_image_is_invalid_argument() {
        let empty = RgbaImage::new(0, 0);
        let result = detect_corners(&empty, &DetectorConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn blank_image_falls_back_to_full_bounds() {
        let img = RgbaImage::from_pixel(400, 300, Rgba([128, 128, 128, 255]));
        let corners = detect_corners(&img, &DetectorConfig::default()).unwrap();
        assert_eq!(
            corners,
            Corners::full_image(Dimensions {
                width: 400,
                height: 300
            }),
        );
    }

    #[test]
    fn synthetic_page_corners_detected_near_truth() {
        let img = synthetic_page();
        let (corners, stages) =
            detect_corners_staged(&img, &DetectorConfig::default()).unwrap();

        let candidate = stages.candidate.as_ref().unwrap();
        assert_eq!(candidate.len(), 4);
        assert!(
            candidate.area() > 150.0,
            "candidate area {} too small",
            candidate.area(),
        );

        // Detection ran at 0.1×, so allow generous slack after the
        // 10× scale correction.
        let tolerance = 40.0;
        let truth = [
            (corners.top_left, Point::new(100.0, 50.0)),
            (corners.top_right, Point::new(900.0, 80.0)),
            (corners.bottom_right, Point::new(880.0, 750.0)),
            (corners.bottom_left, Point::new(120.0, 700.0)),
        ];
        for (detected, expected) in truth {
            assert!(
                detected.distance(expected) < tolerance,
                "detected {detected:?} too far from {expected:?}",
            );
        }
    }

    #[test]
    fn stages_expose_downscaled_rasters() {
        let img = synthetic_page();
        let (_, stages) = detect_corners_staged(&img, &DetectorConfig::default()).unwrap();
        assert_eq!(stages.downscaled.width(), 100);
        assert_eq!(stages.downscaled.height(), 80);
        assert_eq!(stages.edges.width(), 100);
        assert_eq!(stages.blurred.height(), 80);
        assert!(!stages.contours.is_empty());

        // The edge map must actually contain edges for this input.
        let edge_count: u32 = stages.edges.pixels().map(|p| u32::from(p.0[0] > 0)).sum();
        assert!(edge_count > 0);
    }

    #[test]
    fn contour_overlay_marks_contour_pixels() {
        let img = synthetic_page();
        let (_, stages) = detect_corners_staged(&img, &DetectorConfig::default()).unwrap();
        let overlay = stages.contour_overlay();
        assert_eq!(overlay.width(), stages.edges.width());
        assert_eq!(overlay.height(), stages.edges.height());
        let lit: u32 = overlay
            .pixels()
            .map(|p| u32::from(p.0[0] > 0 || p.0[1] > 0 || p.0[2] > 0))
            .sum();
        assert!(lit > 0, "overlay should mark traced contour pixels");
    }

    #[test]
    fn contours_are_sorted_largest_first() {
        let img = synthetic_page();
        let (_, stages) = detect_corners_staged(&img, &DetectorConfig::default()).unwrap();
        for pair in stages.contours.windows(2) {
            assert!(pair[0].area() >= pair[1].area());
        }
    }

    #[test]
    fn tiny_quad_is_rejected_by_area_threshold() {
        // A 30×30 white square downscales to 3×3 -- area well under 150.
        let mut img = RgbaImage::from_pixel(1000, 800, Rgba([0, 0, 0, 255]));
        for y in 400..430 {
            for x in 400..430 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let corners = detect_corners(&img, &DetectorConfig::default()).unwrap();
        assert_eq!(
            corners,
            Corners::full_image(Dimensions {
                width: 1000,
                height: 800
            }),
        );
    }
}
