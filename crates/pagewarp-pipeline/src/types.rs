//! Shared types for the pagewarp page-geometry pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference source and
/// rectified images without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An ordered sequence of points approximating a closed boundary found
/// in an edge map. The closing edge (last point back to first) is
/// implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a new contour from a vector of boundary points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the contour.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all boundary points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Enclosed area via the shoelace formula, treating the contour as
    /// a closed polygon. Always non-negative; winding does not matter.
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.0.len();
        if n < 3 {
            return 0.0;
        }
        let mut doubled = 0.0;
        for i in 0..n {
            let a = self.0[i];
            let b = self.0[(i + 1) % n];
            doubled += a.x.mul_add(b.y, -(b.x * a.y));
        }
        doubled.abs() / 2.0
    }

    /// Closed arc length: the sum of all edge lengths including the
    /// implicit closing edge.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        let n = self.0.len();
        if n < 2 {
            return 0.0;
        }
        (0..n).map(|i| self.0[i].distance(self.0[(i + 1) % n])).sum()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an RGBA image buffer.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The four corners of a detected page, ordered clockwise from the top
/// left. Forms a simple quadrilateral; consumers tolerate
/// near-degenerate values by falling back to full image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    /// Corner with the smallest x+y under the ordering heuristic.
    pub top_left: Point,
    /// Corner with the smallest y−x.
    pub top_right: Point,
    /// Corner with the largest x+y.
    pub bottom_right: Point,
    /// Corner with the largest y−x.
    pub bottom_left: Point,
}

impl Corners {
    /// Corners covering the full bounds of an image of the given
    /// dimensions. This is the detector's fallback when no page
    /// candidate is found and the rectifier's fallback for a
    /// degenerate quadrilateral.
    #[must_use]
    pub fn full_image(dimensions: Dimensions) -> Self {
        let w = f64::from(dimensions.width);
        let h = f64::from(dimensions.height);
        Self {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(w, 0.0),
            bottom_right: Point::new(w, h),
            bottom_left: Point::new(0.0, h),
        }
    }

    /// The corners in clockwise order starting from the top left.
    #[must_use]
    pub const fn to_array(self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Selectable post-filter applied to the rectified image.
///
/// Serialized by name; the persistence layer stores the name string
/// alongside the corners. Adding a mode is an additive, non-breaking
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterKind {
    /// Identity: the rectified image is passed through unchanged.
    #[default]
    None,
    /// Divide out a blurred background estimate to flatten uneven
    /// lighting, then boost contrast.
    BackgroundFlatten,
    /// Local-mean adaptive threshold producing black/white output.
    AdaptiveBinarize,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::BackgroundFlatten => f.write_str("BackgroundFlatten"),
            Self::AdaptiveBinarize => f.write_str("AdaptiveBinarize"),
        }
    }
}

/// Configuration for the corner detector.
///
/// By default detection runs on a 0.1× downscale with Canny
/// thresholds 10/100, and a simplified contour is accepted as the
/// page candidate when it has exactly four vertices and encloses more
/// than `min_area` downscaled pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Uniform downscale factor applied before edge detection. Detected
    /// coordinates are scaled back by the inverse factor. Must be in
    /// (0, 1].
    pub downscale_factor: f64,

    /// Gaussian blur kernel size (odd, in pixels of the downscaled
    /// image) applied before Canny. The equivalent sigma is derived
    /// with [`crate::blur::kernel_sigma`].
    pub blur_kernel: u32,

    /// Canny low hysteresis threshold.
    pub canny_low: f32,

    /// Canny high hysteresis threshold.
    pub canny_high: f32,

    /// Polygon approximation tolerance as a fraction of the contour
    /// perimeter.
    pub approx_tolerance_ratio: f64,

    /// Minimum enclosed area (in downscaled px²) for a contour to be
    /// accepted as the page candidate.
    pub min_area: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            downscale_factor: 0.1,
            blur_kernel: 3,
            canny_low: 10.0,
            canny_high: 100.0,
            approx_tolerance_ratio: 0.02,
            min_area: 150.0,
        }
    }
}

/// Configuration for the perspective rectifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectifyConfig {
    /// RGBA fill for output pixels that map outside the source bounds.
    pub background: [u8; 4],
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 255],
        }
    }
}

/// Configuration for the post-filter pipeline.
///
/// The kernel sizes and the contrast-curve constants are empirical
/// tuning values; they are exposed as named fields rather than
/// hard-coded so embedders can override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Median blur kernel (odd) that removes fine detail when
    /// estimating the page background.
    pub median_kernel: u32,

    /// Gaussian blur kernel (odd) that smooths the background estimate.
    pub background_blur_kernel: u32,

    /// Contrast adjustment in [-127, 127] applied after background
    /// division. The remap factor is
    /// `131·(contrast+127) / (127·(131−contrast))`.
    pub contrast: f64,

    /// Brightness shift applied before the contrast remap.
    pub brightness: f64,

    /// Adaptive threshold block size (odd): the local mean is taken
    /// over a `block × block` neighbourhood.
    pub binarize_block: u32,

    /// Constant subtracted from the local mean to form the threshold.
    pub binarize_offset: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            median_kernel: 21,
            background_blur_kernel: 61,
            contrast: 64.0,
            brightness: 0.0,
            binarize_block: 15,
            binarize_offset: 15.0,
        }
    }
}

/// Errors raised by pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A precondition was violated: zero-size image, wrong point
    /// count, or malformed geometry. Callers validate before invoking.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failed to decode encoded image bytes. Only raised by the byte
    /// decoding helper; in-memory pipeline paths never produce it.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}
