use crate::grid::Grid;
use serde::{Deserialize, Serialize};

/// Square metres per acre is the reciprocal of this.
pub const ACRES_PER_CELL: f64 = 0.000247105381467165;

/// Rectangle in rotated-grid coordinates. Rows `top..bottom`, columns `left..right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Window {
    pub fn new(top: usize, left: usize, bottom: usize, right: usize) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    pub fn height(&self) -> usize {
        self.bottom.saturating_sub(self.top)
    }

    pub fn width(&self) -> usize {
        self.right.saturating_sub(self.left)
    }

    pub fn area(&self) -> u64 {
        self.height() as u64 * self.width() as u64
    }

    /// Both width/height and height/width must reach `min_ratio`.
    pub fn aspect_within(&self, min_ratio: f64) -> bool {
        let (h, w) = (self.height() as f64, self.width() as f64);
        if h == 0.0 || w == 0.0 {
            return false;
        }
        w / h >= min_ratio && h / w >= min_ratio
    }

    pub fn fits_in(&self, rows: usize, cols: usize) -> bool {
        self.top <= self.bottom && self.left <= self.right && self.bottom <= rows && self.right <= cols
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ ({}, {})",
            self.height(),
            self.width(),
            self.top,
            self.left
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaBounds {
    pub min_cells: u64,
    pub max_cells: u64,
}

impl AreaBounds {
    pub fn new(min_cells: u64, max_cells: u64) -> Self {
        Self {
            min_cells,
            max_cells,
        }
    }

    /// One cell is one square metre.
    pub fn from_acres(min_acres: f64, max_acres: f64) -> Self {
        Self {
            min_cells: acres_to_cells(min_acres),
            max_cells: acres_to_cells(max_acres),
        }
    }

    pub fn contains(&self, cells: u64) -> bool {
        cells >= self.min_cells && cells <= self.max_cells
    }
}

pub fn acres_to_cells(acres: f64) -> u64 {
    (acres / ACRES_PER_CELL).round().max(0.0) as u64
}

/// Best window found for a parcel.
#[derive(Debug, Clone)]
pub struct Placement {
    pub score: f64,
    pub window: Window,
    /// Degrees counter-clockwise.
    pub rotation: u32,
    /// Shape of the rotated grid the window lives in.
    pub frame: (usize, usize),
    /// Rectangularity-scaled scores of the winning blob, zero elsewhere. Same shape as the window.
    pub mask: Grid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnusableReason {
    InsufficientArea { positive_cells: u64, min_cells: u64 },
    ParcelTooLarge { total_cells: u64, cap_cells: u64 },
    NoCandidate,
}

impl std::fmt::Display for UnusableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnusableReason::InsufficientArea {
                positive_cells,
                min_cells,
            } => write!(
                f,
                "{positive_cells} positive cells, at least {min_cells} required"
            ),
            UnusableReason::ParcelTooLarge {
                total_cells,
                cap_cells,
            } => write!(f, "{total_cells} parcel cells exceed the {cap_cells} cell cap"),
            UnusableReason::NoCandidate => write!(f, "no window satisfied the constraints"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(Placement),
    Unusable(UnusableReason),
}

impl SearchOutcome {
    pub fn placement(&self) -> Option<&Placement> {
        match self {
            SearchOutcome::Found(p) => Some(p),
            SearchOutcome::Unusable(_) => None,
        }
    }

    pub fn score(&self) -> f64 {
        self.placement().map_or(0.0, |p| p.score)
    }
}

#[derive(Debug, Clone)]
pub enum ParcelStatus {
    Found,
    Unusable(UnusableReason),
    DataUnavailable(String),
    Failed(String),
    Cancelled(String),
}

impl ParcelStatus {
    pub fn code(&self) -> &'static str {
        match self {
            ParcelStatus::Found => "found",
            ParcelStatus::Unusable(_) => "unusable",
            ParcelStatus::DataUnavailable(_) => "data_unavailable",
            ParcelStatus::Failed(_) => "internal_error",
            ParcelStatus::Cancelled(_) => "cancelled",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ParcelStatus::Found => String::new(),
            ParcelStatus::Unusable(reason) => reason.to_string(),
            ParcelStatus::DataUnavailable(msg)
            | ParcelStatus::Failed(msg)
            | ParcelStatus::Cancelled(msg) => msg.clone(),
        }
    }
}

/// Flat summary row handed to the downstream writer. Every non-`found`
/// status carries the zero record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub score: f64,
    pub top_left_row: usize,
    pub top_left_col: usize,
    pub bottom_right_row: usize,
    pub bottom_right_col: usize,
    pub rotation: u32,
    pub status: String,
    pub detail: String,
}

impl ResultRecord {
    pub fn new(id: &str, status: &ParcelStatus, placement: Option<&Placement>) -> Self {
        let mut record = Self {
            id: id.to_string(),
            score: 0.0,
            top_left_row: 0,
            top_left_col: 0,
            bottom_right_row: 0,
            bottom_right_col: 0,
            rotation: 0,
            status: status.code().to_string(),
            detail: status.detail(),
        };
        if let (ParcelStatus::Found, Some(p)) = (status, placement) {
            record.score = p.score;
            record.top_left_row = p.window.top;
            record.top_left_col = p.window.left;
            record.bottom_right_row = p.window.bottom;
            record.bottom_right_col = p.window.right;
            record.rotation = p.rotation;
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acre_conversion() {
        assert_eq!(acres_to_cells(1.0), 4047);
        assert_eq!(acres_to_cells(20.0), 80937);
        assert_eq!(acres_to_cells(0.0), 0);
    }

    #[test]
    fn test_ordered_acres_give_ordered_cells() {
        let acres = [0.0, 0.01, 0.5, 1.0, 2.5, 20.0, 40.0, 499.9];
        for (i, &lo) in acres.iter().enumerate() {
            for &hi in &acres[i..] {
                let bounds = AreaBounds::from_acres(lo, hi);
                assert!(
                    bounds.min_cells <= bounds.max_cells,
                    "{lo} -> {hi} gave {bounds:?}"
                );
            }
        }
    }

    #[test]
    fn test_window_geometry() {
        let w = Window::new(10, 20, 40, 30);
        assert_eq!(w.height(), 30);
        assert_eq!(w.width(), 10);
        assert_eq!(w.area(), 300);
        assert!(w.aspect_within(0.2));
        assert!(!Window::new(0, 0, 60, 10).aspect_within(0.2));
        assert!(!Window::new(0, 0, 0, 10).aspect_within(0.2));
        assert!(w.fits_in(40, 30));
        assert!(!w.fits_in(39, 30));
    }

    #[test]
    fn test_record_zeroes_non_found() {
        let status = ParcelStatus::DataUnavailable("missing slope".into());
        let record = ResultRecord::new("p1", &status, None);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.rotation, 0);
        assert_eq!(record.status, "data_unavailable");
        assert_eq!(record.detail, "missing slope");
    }

    #[test]
    fn test_record_from_placement() {
        let placement = Placement {
            score: 12.5,
            window: Window::new(1, 2, 31, 12),
            rotation: 45,
            frame: (50, 50),
            mask: Grid::zeros((30, 10)),
        };
        let record = ResultRecord::new("p2", &ParcelStatus::Found, Some(&placement));
        assert_eq!(record.score, 12.5);
        assert_eq!(
            (
                record.top_left_row,
                record.top_left_col,
                record.bottom_right_row,
                record.bottom_right_col
            ),
            (1, 2, 31, 12)
        );
        assert_eq!(record.rotation, 45);
        assert_eq!(record.status, "found");
        assert!(record.detail.is_empty());
    }
}
