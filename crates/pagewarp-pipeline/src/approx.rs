//! Closed-polygon approximation via Ramer-Douglas-Peucker.
//!
//! Traced contours follow every boundary pixel; the detector needs to
//! know whether a contour is "really" a quadrilateral. This module
//! simplifies a closed boundary to its dominant vertices: points
//! within `tolerance` of the line between their neighbours are
//! removed.
//!
//! RDP is defined on open chains, so the closed boundary is first
//! split at two anchor points and each half simplified independently.
//! The anchors are chosen as an approximate diameter of the contour
//! (the farthest point from an arbitrary start, then the farthest
//! point from that). On a convex boundary a farthest point is always a
//! true vertex, so the anchors never introduce spurious mid-edge
//! vertices into the result.

use crate::types::{Contour, Point};

/// Simplify a closed contour to its dominant vertices.
///
/// A tolerance of 0.0 preserves all points. Contours with fewer than
/// 4 points are returned unchanged (a triangle cannot be simplified
/// further and anything smaller is already degenerate).
#[must_use = "returns the simplified polygon"]
pub fn approx_polygon(contour: &Contour, tolerance: f64) -> Contour {
    let points = contour.points();
    let n = points.len();
    if n < 4 {
        return contour.clone();
    }

    // Approximate diameter: farthest point from points[0], then
    // farthest point from that.
    let a = farthest_from(points, points[0]);
    let b = farthest_from(points, points[a]);
    if a == b {
        // All points coincide; nothing meaningful to simplify.
        return contour.clone();
    }
    let (first, second) = if a < b { (a, b) } else { (b, a) };

    // Split into two chains sharing the anchor endpoints:
    // points[first..=second] and points[second..] ++ points[..=first].
    let chain_one: Vec<Point> = points[first..=second].to_vec();
    let mut chain_two: Vec<Point> = points[second..].to_vec();
    chain_two.extend_from_slice(&points[..=first]);

    let mut simplified = simplify_chain(&chain_one, tolerance);
    // Drop each chain's trailing anchor: it reappears as the head of
    // the other chain (or closes the loop implicitly).
    simplified.pop();
    let mut tail = simplify_chain(&chain_two, tolerance);
    tail.pop();
    simplified.extend(tail);

    Contour::new(simplified)
}

/// Index of the point farthest from `origin`.
fn farthest_from(points: &[Point], origin: Point) -> usize {
    let mut best = 0;
    let mut best_dist = 0.0;
    for (i, &p) in points.iter().enumerate() {
        let d = origin.distance_squared(p);
        if d > best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// Ramer-Douglas-Peucker on an open chain, keeping both endpoints.
fn simplify_chain(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Recursive step: find the point farthest from the segment
/// `points[start]..points[end]`; if it exceeds the tolerance, keep it
/// and recurse into both halves.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from `p` to the line through `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
