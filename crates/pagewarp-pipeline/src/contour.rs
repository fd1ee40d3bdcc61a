//! Contour extraction from a binary edge map.
//!
//! Uses Suzuki-Abe border following via
//! [`imageproc::contours::find_contours`]. All borders are kept (outer
//! borders and holes alike) so the page candidate can be found even
//! when it is nested inside another traced boundary.

use image::GrayImage;

use crate::types::{Contour, Point};

/// Trace all closed boundaries in a binary edge map.
///
/// Input: white pixels (255) are edges, black (0) is background.
/// Output: one [`Contour`] per traced border, in tracing order.
/// Borders with fewer than 2 points are dropped.
#[must_use = "returns the traced contours"]
pub fn trace_contours(edges: &GrayImage) -> Vec<Contour> {
    let traced: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(edges);

    traced
        .into_iter()
        .filter(|c| c.points.len() >= 2)
        .map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect();
            Contour::new(points)
        })
        .collect()
}

/// Sort contours by enclosed area, largest first.
///
/// The detector walks this order looking for the first candidate that
/// simplifies to a quadrilateral.
#[must_use = "returns the sorted contours"]
pub fn sort_by_area_desc(mut contours: Vec<Contour>) -> Vec<Contour> {
    contours.sort_by(|a, b| {
        b.area()
            .partial_cmp(&a.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    contours
}
