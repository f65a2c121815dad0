//! Exhaustive window scan over one rotation of a parcel.
//!
//! Windows are produced lazily, each one is evaluated by a pure function, and
//! the scan folds the outcomes into the best candidate seen so far.

use crate::blob::Blobs;
use crate::budget::Budget;
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::grid::{self, Grid, NO_DATA};
use crate::types::{AreaBounds, Window};
use ndarray::{Zip, s};

/// Value of divider cells uncovered by rotation.
pub const DIVIDER_FILL: f64 = 0.0;

/// A window that passed every check, with its blob-masked, rectangularity-scaled scores.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub score: f64,
    pub window: Window,
    pub mask: Grid,
}

/// Why a window was dropped. Never leaves the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Too small, too elongated, or area outside bounds.
    Geometry,
    /// A border row or column has no positive cell.
    LooseBorder,
    PositiveArea,
    NoBlob,
    MaskedArea,
    /// The winning blob leaves a border row or column empty.
    Irregular,
    Sparse,
}

#[derive(Debug, Clone)]
pub struct RotationResult {
    pub rotation: u32,
    pub frame: (usize, usize),
    pub best: Option<Candidate>,
    pub windows: u64,
    pub accepted: u64,
}

impl RotationResult {
    pub fn score(&self) -> f64 {
        self.best.as_ref().map_or(0.0, |c| c.score)
    }
}

#[derive(Debug, Default)]
struct Scan {
    best: Option<Candidate>,
    windows: u64,
    accepted: u64,
}

impl Scan {
    fn absorb(mut self, outcome: Result<Candidate, Rejection>) -> Self {
        self.windows += 1;
        if let Ok(candidate) = outcome {
            self.accepted += 1;
            let best = self.best.as_ref().map_or(0.0, |c| c.score);
            if candidate.score > best {
                self.best = Some(candidate);
            }
        }
        self
    }
}

/// Every window whose corners sit on the stride lattice of a `rows` x `cols` grid.
pub fn windows(rows: usize, cols: usize, config: &SearchConfig) -> impl Iterator<Item = Window> {
    let step = config.stride.max(1);
    let (min_h, min_w) = (config.min_height, config.min_width);
    (0..rows.saturating_sub(min_h))
        .step_by(step)
        .flat_map(move |top| {
            (0..cols.saturating_sub(min_w))
                .step_by(step)
                .flat_map(move |left| {
                    (top + min_h..rows).step_by(step).flat_map(move |bottom| {
                        (left + min_w..cols)
                            .step_by(step)
                            .map(move |right| Window::new(top, left, bottom, right))
                    })
                })
        })
}

/// Linear from `rectangularity_floor` at the threshold to 1.0 at full coverage.
/// `None` below the threshold.
pub fn rectangularity_factor(ratio: f64, config: &SearchConfig) -> Option<f64> {
    let threshold = config.rectangularity_threshold;
    if ratio < threshold {
        return None;
    }
    let floor = config.rectangularity_floor;
    Some(floor + (ratio - threshold) / (1.0 - threshold) * (1.0 - floor))
}

/// Rotation fill and exclusions are both impassable.
pub fn divider_passable(v: f64) -> bool {
    v > NO_DATA && v != DIVIDER_FILL
}

/// Rotated copies of both grids. The score grid is filled with `NO_DATA`, the
/// divider with `DIVIDER_FILL`.
pub fn rotate_pair(score: &Grid, divider: &Grid, degrees: f64) -> (Grid, Grid) {
    (
        grid::rotate(score, degrees, NO_DATA),
        grid::rotate(divider, degrees, DIVIDER_FILL),
    )
}

pub fn evaluate(
    score: &Grid,
    divider: &Grid,
    window: Window,
    bounds: AreaBounds,
    config: &SearchConfig,
) -> Result<Candidate, Rejection> {
    if window.height() < config.min_height
        || window.width() < config.min_width
        || !window.aspect_within(config.min_aspect)
        || !bounds.contains(window.area())
        || !window.fits_in(score.nrows(), score.ncols())
        || !window.fits_in(divider.nrows(), divider.ncols())
    {
        return Err(Rejection::Geometry);
    }

    let view = score.slice(s![window.top..window.bottom, window.left..window.right]);
    if !grid::is_tight(&view, |v| v > 0.0) {
        return Err(Rejection::LooseBorder);
    }
    if !bounds.contains(grid::count(&view, |v| v > 0.0)) {
        return Err(Rejection::PositiveArea);
    }

    let passable = divider
        .slice(s![window.top..window.bottom, window.left..window.right])
        .mapv(divider_passable);
    let blobs = Blobs::label(&passable);
    let blob = blobs.largest_within(bounds).ok_or(Rejection::NoBlob)?;
    let inside = blobs.mask(blob.label);

    let mut masked = Zip::from(&view)
        .and(&inside)
        .map_collect(|&v, &keep| if keep { v } else { 0.0 });
    // Cells scoring in (0, 1] do not count as usable here.
    if !bounds.contains(grid::count(&masked.view(), |v| v > 1.0)) {
        return Err(Rejection::MaskedArea);
    }
    masked.mapv_inplace(|v| v.max(0.0));
    if !grid::is_tight(&masked.view(), |v| v > 0.0) {
        return Err(Rejection::Irregular);
    }

    let ratio = grid::count(&masked.view(), |v| v > 0.0) as f64 / window.area() as f64;
    let factor = rectangularity_factor(ratio, config).ok_or(Rejection::Sparse)?;
    masked.mapv_inplace(|v| if v > 0.0 { v * factor } else { v });

    Ok(Candidate {
        score: masked.sum(),
        window,
        mask: masked,
    })
}

/// Best candidate of one rotation. `primary` applies the tie-break boost.
pub fn search_rotation(
    score: &Grid,
    divider: &Grid,
    rotation: u32,
    primary: bool,
    bounds: AreaBounds,
    config: &SearchConfig,
    budget: &Budget,
) -> Result<RotationResult, SearchError> {
    let (mut rotated, rotated_divider) = rotate_pair(score, divider, rotation as f64);
    if primary {
        let boost = config.primary_boost;
        rotated.mapv_inplace(|v| if v > 0.0 { v * boost } else { v });
    }
    let frame = rotated.dim();

    let scan = windows(frame.0, frame.1, config).try_fold(Scan::default(), |scan, window| {
        budget.check()?;
        Ok::<_, SearchError>(scan.absorb(evaluate(
            &rotated,
            &rotated_divider,
            window,
            bounds,
            config,
        )))
    })?;

    tracing::debug!(
        rotation,
        primary,
        windows = scan.windows,
        accepted = scan.accepted,
        score = scan.best.as_ref().map_or(0.0, |c| c.score),
        "rotation searched"
    );

    Ok(RotationResult {
        rotation,
        frame,
        best: scan.best,
        windows: scan.windows,
        accepted: scan.accepted,
    })
}
