//! Perspective rectification.
//!
//! Maps the detected (or manually adjusted) page quadrilateral onto an
//! upright rectangle. The homography is solved exactly from the four
//! corner correspondences (8 degrees of freedom), and the source is
//! resampled through the inverse transform with bilinear
//! interpolation. Pixels mapping outside the source take a
//! configurable background fill.
//!
//! All coordinate arithmetic happens in `f64`; pixel values are
//! quantized back to bytes only when the output buffer is written.

use image::Rgba;
use nalgebra::{DMatrix, DVector, Matrix3, RowDVector, Vector3};
use tracing::{debug, warn};

use crate::geometry;
use crate::types::{Corners, Dimensions, PipelineError, Point, RectifyConfig, RgbaImage};

/// Rectify the quadrilateral described by `corners` into an upright
/// rectangle.
///
/// The output size comes from [`geometry::target_rect_size`], clamped
/// to at least 1×1 so a near-degenerate quadrilateral shrinks to a
/// sliver instead of failing. A fully degenerate quadrilateral (three
/// or more collinear corners, for which no homography exists) falls
/// back to the full image bounds.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] if the source image has
/// a zero dimension.
pub fn rectify(
    image: &RgbaImage,
    corners: &Corners,
    config: &RectifyConfig,
) -> Result<RgbaImage, PipelineError> {
    let dims = Dimensions::of(image);
    if dims.is_degenerate() {
        return Err(PipelineError::InvalidArgument(format!(
            "cannot rectify a {}x{} image",
            dims.width, dims.height,
        )));
    }

    if let Some(out) = try_warp(image, corners, config) {
        return Ok(out);
    }

    // No homography exists for these corners. Fall back to the full
    // image bounds, which always admit one for a non-degenerate image.
    warn!("degenerate corner quadrilateral, falling back to full image bounds");
    let fallback = Corners::full_image(dims);
    try_warp(image, &fallback, config).ok_or_else(|| {
        PipelineError::InvalidArgument("homography is singular even for full image bounds".into())
    })
}

/// Attempt the warp for one set of corners. Returns `None` when no
/// projective transform exists for them.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn try_warp(image: &RgbaImage, corners: &Corners, config: &RectifyConfig) -> Option<RgbaImage> {
    let (width, height) = geometry::target_rect_size(corners);
    // Clamp before ceil: a near-zero dimension becomes a 1px sliver.
    let width = width.max(1.0);
    let height = height.max(1.0);
    let out_w = width.ceil() as u32;
    let out_h = height.ceil() as u32;

    let src = corners.to_array();
    let dst = [
        Point::new(0.0, 0.0),
        Point::new(width, 0.0),
        Point::new(width, height),
        Point::new(0.0, height),
    ];

    let forward = perspective_transform(&src, &dst)?;
    let inverse = forward.try_inverse()?;
    debug!(out_w, out_h, "rectifying through projective transform");

    let background = Rgba(config.background);
    let mut out = RgbaImage::new(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            let mapped = inverse * Vector3::new(f64::from(x), f64::from(y), 1.0);
            let pixel = if mapped.z.abs() < f64::EPSILON {
                background
            } else {
                sample_bilinear(image, mapped.x / mapped.z, mapped.y / mapped.z, background)
            };
            out.put_pixel(x, y, pixel);
        }
    }
    Some(out)
}

/// Solve the projective transform mapping each `src[i]` to `dst[i]`.
///
/// Sets up the standard 8×8 linear system for the homography
/// coefficients and solves it by LU decomposition. Returns `None` for
/// degenerate correspondences (e.g. collinear points).
fn perspective_transform(src: &[Point; 4], dst: &[Point; 4]) -> Option<Matrix3<f64>> {
    let mut a = DMatrix::<f64>::zeros(8, 8);
    let mut b = DVector::<f64>::zeros(8);

    for i in 0..4 {
        let s = src[i];
        let d = dst[i];

        a.set_row(
            i * 2,
            &RowDVector::from_row_slice(&[
                s.x,
                s.y,
                1.0,
                0.0,
                0.0,
                0.0,
                -s.x * d.x,
                -s.y * d.x,
            ]),
        );
        b[i * 2] = d.x;

        a.set_row(
            i * 2 + 1,
            &RowDVector::from_row_slice(&[
                0.0,
                0.0,
                0.0,
                s.x,
                s.y,
                1.0,
                -s.x * d.y,
                -s.y * d.y,
            ]),
        );
        b[i * 2 + 1] = d.y;
    }

    let h = a.lu().solve(&b)?;
    Some(Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0,
    ))
}

/// Bilinear sample at a fractional source coordinate.
///
/// Coordinates outside `[0, w−1] × [0, h−1]` return the background
/// fill; in-bounds samples clamp their neighbourhood at the border.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_bilinear(image: &RgbaImage, x: f64, y: f64, background: Rgba<u8>) -> Rgba<u8> {
    let max_x = f64::from(image.width() - 1);
    let max_y = f64::from(image.height() - 1);
    if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
        return background;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    let p00 = image.get_pixel(x0, y0).0;
    let p10 = image.get_pixel(x1, y0).0;
    let p01 = image.get_pixel(x0, y1).0;
    let p11 = image.get_pixel(x1, y1).0;

    let mut blended = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]).mul_add(1.0 - fx, f64::from(p10[c]) * fx);
        let bottom = f64::from(p01[c]).mul_add(1.0 - fx, f64::from(p11[c]) * fx);
        let value = top.mul_add(1.0 - fy, bottom * fy);
        blended[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(blended)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation)]
    fn gradient_image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            let r = ((x * 255) / w.max(1)) as u8;
            let g = ((y * 255) / h.max(1)) as u8;
            image::Rgba([r, g, 64, 255])
        })
    }

    #[test]
    fn zero_dimension_source_is_invalid_argument() {
        let empty = RgbaImage::new(0, 0);
        let corners = Corners::full_image(Dimensions {
            width: 10,
            height: 10,
        });
        let result = rectify(&empty, &corners, &RectifyConfig::default());
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
    }

    #[test]
    fn full_bounds_round_trip_is_identity() {
        let img = gradient_image(64, 48);
        let corners = Corners::full_image(Dimensions::of(&img));
        let out = rectify(&img, &corners, &RectifyConfig::default()).unwrap();

        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 48);
        for y in 0..48 {
            for x in 0..64 {
                let a = img.get_pixel(x, y).0;
                let b = out.get_pixel(x, y).0;
                for c in 0..4 {
                    let diff = i16::from(a[c]) - i16::from(b[c]);
                    assert!(
                        diff.abs() <= 2,
                        "pixel ({x},{y}) channel {c}: {} vs {}",
                        a[c],
                        b[c],
                    );
                }
            }
        }
    }

    #[test]
    fn identity_homography_for_unit_square() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        let m = perspective_transform(&square, &square).unwrap();
        let p = m * Vector3::new(0.25, 0.75, 1.0);
        assert!((p.x / p.z - 0.25).abs() < 1e-9);
        assert!((p.y / p.z - 0.75).abs() < 1e-9);
    }

    #[test]
    fn homography_maps_control_points_exactly() {
        let src = [
            Point::new(100.0, 50.0),
            Point::new(900.0, 80.0),
            Point::new(880.0, 750.0),
            Point::new(120.0, 700.0),
        ];
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(762.0, 0.0),
            Point::new(762.0, 651.0),
            Point::new(0.0, 651.0),
        ];
        let m = perspective_transform(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(&dst) {
            let p = m * Vector3::new(s.x, s.y, 1.0);
            assert!((p.x / p.z - d.x).abs() < 1e-6, "x mismatch for {s:?}");
            assert!((p.y / p.z - d.y).abs() < 1e-6, "y mismatch for {s:?}");
        }
    }

    #[test]
    fn collinear_points_have_no_homography() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
            Point::new(30.0, 30.0),
        ];
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!(perspective_transform(&src, &dst).is_none());
    }

    #[test]
    fn axis_aligned_subrect_is_cropped() {
        // White rectangle from (20,20) to (80,60) on black background.
        let mut img = RgbaImage::from_pixel(100, 100, image::Rgba([0, 0, 0, 255]));
        for y in 20..60 {
            for x in 20..80 {
                img.put_pixel(x, y, image::Rgba([255, 255, 255, 255]));
            }
        }
        let corners = Corners {
            top_left: Point::new(20.0, 20.0),
            top_right: Point::new(80.0, 20.0),
            bottom_right: Point::new(80.0, 60.0),
            bottom_left: Point::new(20.0, 60.0),
        };
        let out = rectify(&img, &corners, &RectifyConfig::default()).unwrap();
        assert_eq!(out.width(), 60);
        assert_eq!(out.height(), 40);

        // Interior pixels (away from the boundary) must be white.
        for y in 2..38 {
            for x in 2..58 {
                assert_eq!(
                    out.get_pixel(x, y).0[0],
                    255,
                    "interior pixel ({x},{y}) not white",
                );
            }
        }
    }

    #[test]
    fn output_dimensions_are_ceil_of_target_size() {
        let corners = Corners {
            top_left: Point::new(100.0, 50.0),
            top_right: Point::new(900.0, 80.0),
            bottom_right: Point::new(880.0, 750.0),
            bottom_left: Point::new(120.0, 700.0),
        };
        let img = gradient_image(1000, 800);
        let out = rectify(&img, &corners, &RectifyConfig::default()).unwrap();

        let (w, h) = geometry::target_rect_size(&corners);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            assert_eq!(out.width(), w.ceil() as u32);
            assert_eq!(out.height(), h.ceil() as u32);
        }
    }

    #[test]
    fn sliver_quad_clamps_to_one_pixel_wide() {
        let img = gradient_image(100, 100);
        let corners = Corners {
            top_left: Point::new(10.0, 10.0),
            top_right: Point::new(10.2, 10.0),
            bottom_right: Point::new(10.2, 40.0),
            bottom_left: Point::new(10.0, 40.0),
        };
        let out = rectify(&img, &corners, &RectifyConfig::default()).unwrap();
        assert_eq!(out.width(), 1);
        assert_eq!(out.height(), 30);
    }

    #[test]
    fn collinear_corners_fall_back_to_full_bounds() {
        let img = gradient_image(40, 30);
        let corners = Corners {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(10.0, 10.0),
            bottom_right: Point::new(20.0, 20.0),
            bottom_left: Point::new(30.0, 30.0),
        };
        let out = rectify(&img, &corners, &RectifyConfig::default()).unwrap();
        assert_eq!(out.width(), 40);
        assert_eq!(out.height(), 30);
    }

    #[test]
    fn out_of_bounds_samples_take_background_fill() {
        // Corners extend 20px above and left of the source, so the
        // top-left of the output has no source data.
        let img = RgbaImage::from_pixel(100, 100, image::Rgba([255, 255, 255, 255]));
        let corners = Corners {
            top_left: Point::new(-20.0, -20.0),
            top_right: Point::new(50.0, -20.0),
            bottom_right: Point::new(50.0, 50.0),
            bottom_left: Point::new(-20.0, 50.0),
        };
        let config = RectifyConfig {
            background: [0, 0, 0, 255],
        };
        let out = rectify(&img, &corners, &config).unwrap();
        assert_eq!(out.width(), 70);
        assert_eq!(out.height(), 70);

        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255], "expected background");
        assert_eq!(
            out.get_pixel(65, 65).0,
            [255, 255, 255, 255],
            "expected source data",
        );
    }

    #[test]
    fn custom_background_fill_is_used() {
        let img = RgbaImage::from_pixel(10, 10, image::Rgba([255, 255, 255, 255]));
        let corners = Corners {
            top_left: Point::new(-5.0, -5.0),
            top_right: Point::new(5.0, -5.0),
            bottom_right: Point::new(5.0, 5.0),
            bottom_left: Point::new(-5.0, 5.0),
        };
        let config = RectifyConfig {
            background: [0, 0, 255, 255],
        };
        let out = rectify(&img, &corners, &config).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn bilinear_sample_blends_neighbours() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));
        img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        img.put_pixel(1, 1, image::Rgba([255, 255, 0, 255]));

        let p = sample_bilinear(&img, 0.5, 0.5, Rgba([0, 0, 0, 0]));
        // Equal-weight average of the four corners.
        assert_eq!(p.0[0], 128);
        assert_eq!(p.0[1], 128);
        assert_eq!(p.0[2], 64);
        assert_eq!(p.0[3], 255);
    }

    #[test]
    fn bilinear_sample_outside_bounds_is_background() {
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([200, 200, 200, 255]));
        let bg = Rgba([1, 2, 3, 4]);
        assert_eq!(sample_bilinear(&img, -0.1, 1.0, bg), bg);
        assert_eq!(sample_bilinear(&img, 1.0, -0.1, bg), bg);
        assert_eq!(sample_bilinear(&img, 3.1, 1.0, bg), bg);
        assert_eq!(sample_bilinear(&img, 1.0, 3.1, bg), bg);
        // The last valid coordinate is in bounds.
        assert_eq!(sample_bilinear(&img, 3.0, 3.0, bg).0, [200, 200, 200, 255]);
    }
}
