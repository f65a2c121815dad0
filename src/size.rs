use crate::grid::{self, Grid, NO_DATA};
use crate::types::{ACRES_PER_CELL, AreaBounds, UnusableReason, acres_to_cells};

/// Result of the usable-area gate.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeCheck {
    /// `max_cells` is lowered to the positive area when that area sits inside the bounds.
    pub bounds: AreaBounds,
    pub total_cells: u64,
    pub positive_cells: u64,
    pub verdict: Option<UnusableReason>,
}

impl SizeCheck {
    pub fn usable(&self) -> bool {
        self.verdict.is_none()
    }
}

/// Decides whether `score` has enough positive area to hold an AOI of
/// `min_acres..=max_acres`. Parcels with `max_parcel_acres` or more of data
/// are never usable.
pub fn check(min_acres: f64, max_acres: f64, max_parcel_acres: f64, score: &Grid) -> SizeCheck {
    let mut bounds = AreaBounds::from_acres(min_acres, max_acres);
    let view = score.view();
    let total_cells = grid::count(&view, |v| v != NO_DATA);
    let positive_cells = grid::count(&view, |v| v > 0.0);

    let mut verdict = if positive_cells >= bounds.max_cells {
        None
    } else if positive_cells >= bounds.min_cells {
        bounds.max_cells = positive_cells;
        None
    } else {
        Some(UnusableReason::InsufficientArea {
            positive_cells,
            min_cells: bounds.min_cells,
        })
    };

    let cap = max_parcel_acres / ACRES_PER_CELL;
    if total_cells as f64 >= cap {
        verdict = Some(UnusableReason::ParcelTooLarge {
            total_cells,
            cap_cells: acres_to_cells(max_parcel_acres),
        });
    }

    SizeCheck {
        bounds,
        total_cells,
        positive_cells,
        verdict,
    }
}
