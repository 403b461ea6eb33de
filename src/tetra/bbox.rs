//! Bounding-box culling of candidate points.

use super::points::TetraPoints;
use crate::core::BoundingBox;

/// Keep the points for which at least one coordinate lies in the box.
///
/// Note the "any axis" test: a point far outside the box along two axes still
/// survives if the third coordinate is in range. This keeps tetrahedra near the
/// box boundary and matches the reference extraction output; see DESIGN.md.
///
/// Returns the surviving points (with their scales) and the keep-mask over
/// the input.
pub fn filter_points_in_bounding_box(
    points: &TetraPoints,
    bbox: &BoundingBox,
) -> (TetraPoints, Vec<bool>) {
    let mask: Vec<bool> = points
        .points
        .iter()
        .map(|p| bbox.contains_any_axis(p))
        .collect();

    let mut kept = TetraPoints::default();
    for ((p, s), &keep) in points.points.iter().zip(&points.scales).zip(&mask) {
        if keep {
            kept.points.push(*p);
            kept.scales.push(*s);
        }
    }
    (kept, mask)
}
