use crate::grid::{self, Grid, NO_DATA};

/// Cells in the bounding box of the non-negative footprint after rotating by `degrees`.
pub fn footprint_area(score: &Grid, degrees: f64) -> u64 {
    let mut rotated = grid::rotate(score, degrees, NO_DATA);
    rotated.mapv_inplace(|v| v.max(0.0));
    grid::content_bounds(&rotated.view(), |v| v != 0.0).map_or(0, |b| b.area())
}

/// Angle in `0..90` (stepping by `step`) whose rotation frames the parcel most
/// tightly. Ties go to the smaller angle.
pub fn primary_rotation(score: &Grid, step: u32) -> u32 {
    let mut best = (0, u64::MAX);
    for angle in (0..90).step_by(step.max(1) as usize) {
        let area = footprint_area(score, angle as f64);
        tracing::trace!(angle, area, "rotation footprint");
        if area < best.1 {
            best = (angle, area);
        }
    }
    best.0
}
