//! Corner-ordering and quadrilateral sizing utilities.
//!
//! [`order_corners`] assigns four unordered points to named corners
//! using a sum/difference heuristic: the top-left corner minimizes
//! `x + y`, the bottom-right maximizes it, the top-right minimizes
//! `y − x`, and the bottom-left maximizes `y − x`. The assignment is
//! stable under uniform scaling and small rotation.
//!
//! [`target_rect_size`] derives the output rectangle for perspective
//! rectification from the quadrilateral's side lengths.

use crate::types::{Corners, PipelineError, Point};

/// Order four arbitrary points into named page corners.
///
/// Ties are broken by input order: the earliest point achieving the
/// extreme value wins, so the result is deterministic even for
/// symmetric inputs.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidArgument`] unless `points` contains
/// exactly 4 entries. The caller is responsible for the precondition;
/// violating it is a programming error.
pub fn order_corners(points: &[Point]) -> Result<Corners, PipelineError> {
    if points.len() != 4 {
        return Err(PipelineError::InvalidArgument(format!(
            "corner ordering requires exactly 4 points, got {}",
            points.len(),
        )));
    }

    let top_left = extreme(points, |p| p.x + p.y, Extreme::Min);
    let bottom_right = extreme(points, |p| p.x + p.y, Extreme::Max);
    let top_right = extreme(points, |p| p.y - p.x, Extreme::Min);
    let bottom_left = extreme(points, |p| p.y - p.x, Extreme::Max);

    Ok(Corners {
        top_left,
        top_right,
        bottom_right,
        bottom_left,
    })
}

/// Target rectangle size for rectifying the given quadrilateral.
///
/// Width is the minimum of the top and bottom side lengths; height is
/// the minimum of the left and right side lengths. Taking the minimum
/// of each opposite pair avoids upscaling a foreshortened edge, so the
/// rectified page is never larger than needed.
#[must_use]
pub fn target_rect_size(corners: &Corners) -> (f64, f64) {
    let width_top = corners.top_left.distance(corners.top_right);
    let width_bottom = corners.bottom_left.distance(corners.bottom_right);
    let height_left = corners.top_left.distance(corners.bottom_left);
    let height_right = corners.top_right.distance(corners.bottom_right);

    (
        width_top.min(width_bottom),
        height_left.min(height_right),
    )
}

enum Extreme {
    Min,
    Max,
}

/// The first point achieving the extreme value of `key` over `points`.
///
/// Strict comparisons make the earliest extreme win, which is what
/// breaks ties by input order.
fn extreme(points: &[Point], key: impl Fn(Point) -> f64, direction: Extreme) -> Point {
    let mut best = points[0];
    let mut best_key = key(best);
    for &p in &points[1..] {
        let k = key(p);
        let better = match direction {
            Extreme::Min => k < best_key,
            Extreme::Max => k > best_key,
        };
        if better {
            best = p;
            best_key = k;
        }
    }
    best
}
