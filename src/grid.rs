use crate::types::Window;
use ndarray::{Array2, ArrayView2, s};
use std::collections::HashMap;

/// Row-major raster, one cell per square metre.
pub type Grid = Array2<f64>;

/// Outside the parcel, or no data.
pub const NO_DATA: f64 = -1.0;

/// Shape of the expand-to-fit frame after rotating a `rows` x `cols` grid.
pub fn rotated_shape(rows: usize, cols: usize, degrees: f64) -> (usize, usize) {
    let (sin, cos) = degrees.rem_euclid(360.0).to_radians().sin_cos();
    let (r, c) = (rows as f64, cols as f64);
    // Corners (0,0), (0,c), (r,0), (r,c) under [[cos, sin], [-sin, cos]].
    let row_coords = [0.0, sin * c, cos * r, cos * r + sin * c];
    let col_coords = [0.0, cos * c, -sin * r, -sin * r + cos * c];
    (extent(&row_coords), extent(&col_coords))
}

fn extent(coords: &[f64; 4]) -> usize {
    let max = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = coords.iter().copied().fold(f64::INFINITY, f64::min);
    (max - min + 0.5).max(0.0) as usize
}

/// Rotates counter-clockwise by `degrees` about the grid centre, growing the
/// frame so nothing is clipped. Cells that map outside the source take `fill`.
/// Sampling is nearest-neighbour.
pub fn rotate(grid: &Grid, degrees: f64, fill: f64) -> Grid {
    let (rows, cols) = grid.dim();
    let (out_rows, out_cols) = rotated_shape(rows, cols, degrees);
    let (sin, cos) = degrees.rem_euclid(360.0).to_radians().sin_cos();
    let in_center = ((rows as f64 - 1.0) / 2.0, (cols as f64 - 1.0) / 2.0);
    let out_center = ((out_rows as f64 - 1.0) / 2.0, (out_cols as f64 - 1.0) / 2.0);

    Array2::from_shape_fn((out_rows, out_cols), |(r, c)| {
        let dr = r as f64 - out_center.0;
        let dc = c as f64 - out_center.1;
        let src_r = (cos * dr + sin * dc + in_center.0).round();
        let src_c = (-sin * dr + cos * dc + in_center.1).round();
        if src_r >= 0.0 && src_c >= 0.0 && (src_r as usize) < rows && (src_c as usize) < cols {
            grid[[src_r as usize, src_c as usize]]
        } else {
            fill
        }
    })
}

/// Tightest window holding every cell that satisfies `keep`, or `None` when no cell does.
pub fn content_bounds(view: &ArrayView2<f64>, keep: impl Fn(f64) -> bool) -> Option<Window> {
    let mut bounds: Option<Window> = None;
    for ((r, c), &v) in view.indexed_iter() {
        if !keep(v) {
            continue;
        }
        bounds = Some(match bounds {
            None => Window::new(r, c, r + 1, c + 1),
            Some(b) => Window::new(
                b.top.min(r),
                b.left.min(c),
                b.bottom.max(r + 1),
                b.right.max(c + 1),
            ),
        });
    }
    bounds
}

/// True when every border row and column of `view` holds at least one `keep` cell.
pub fn is_tight(view: &ArrayView2<f64>, keep: impl Fn(f64) -> bool) -> bool {
    let (rows, cols) = view.dim();
    content_bounds(view, keep) == Some(Window::new(0, 0, rows, cols))
}

/// Most frequent value; ties go to the smallest.
pub fn mode(grid: &Grid) -> Option<f64> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for &v in grid.iter() {
        // -0.0 and 0.0 are the same cell value
        let v = if v == 0.0 { 0.0 } else { v };
        *counts.entry(v.to_bits()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(bits, n)| (f64::from_bits(bits), n))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
        .map(|(v, _)| v)
}

/// Top-left aligned crop.
pub fn crop(grid: &Grid, rows: usize, cols: usize) -> Grid {
    let rows = rows.min(grid.nrows());
    let cols = cols.min(grid.ncols());
    grid.slice(s![..rows, ..cols]).to_owned()
}

pub fn count(view: &ArrayView2<f64>, pred: impl Fn(f64) -> bool) -> u64 {
    view.iter().filter(|&&v| pred(v)).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_rotate_zero_is_identity() {
        let g = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(rotate(&g, 0.0, -1.0), g);
    }

    #[test]
    fn test_rotate_quarter_turn_is_counter_clockwise() {
        let g = array![[1.0, 2.0], [3.0, 4.0]];
        let r = rotate(&g, 90.0, -1.0);
        assert_eq!(r, array![[2.0, 4.0], [1.0, 3.0]]);
    }

    #[test]
    fn test_rotate_expands_frame() {
        let g = Grid::from_elem((20, 40), 1.0);
        assert_eq!(rotate(&g, 90.0, -1.0).dim(), (40, 20));
        let r = rotate(&g, 45.0, -1.0);
        assert!(r.nrows() > 40 && r.ncols() > 40);
        // corners of the expanded frame are outside the source
        assert_eq!(r[[0, 0]], -1.0);
        assert_eq!(r[[r.nrows() - 1, r.ncols() - 1]], -1.0);
    }

    #[test]
    fn test_rotation_is_periodic() {
        let g = Array2::from_shape_fn((13, 7), |(r, c)| (r * 7 + c) as f64);
        for a in [0.0, 5.0, 35.0, 80.0] {
            assert_eq!(rotate(&g, a, -1.0), rotate(&g, a + 360.0, -1.0));
        }
    }

    #[test]
    fn test_content_bounds() {
        let mut g = Grid::zeros((6, 5));
        g[[1, 2]] = 3.0;
        g[[4, 3]] = 1.0;
        let b = content_bounds(&g.view(), |v| v > 0.0).unwrap();
        assert_eq!(b, Window::new(1, 2, 5, 4));
        assert!(content_bounds(&Grid::zeros((3, 3)).view(), |v| v > 0.0).is_none());
    }

    #[test]
    fn test_is_tight() {
        let mut g = Grid::from_elem((4, 4), 1.0);
        assert!(is_tight(&g.view(), |v| v > 0.0));
        g.row_mut(0).fill(0.0);
        assert!(!is_tight(&g.view(), |v| v > 0.0));
    }

    #[test]
    fn test_mode_prefers_smallest_on_tie() {
        let g = array![[2.0, 2.0, 5.0], [5.0, 7.0, -0.0]];
        assert_eq!(mode(&g), Some(2.0));
        let g = array![[3.0, 3.0, 3.0], [1.0, 1.0, 9.0]];
        assert_eq!(mode(&g), Some(3.0));
        assert_eq!(mode(&Grid::zeros((0, 0))), None);
    }

    #[test]
    fn test_crop_top_left() {
        let g = Array2::from_shape_fn((4, 5), |(r, c)| (r * 10 + c) as f64);
        let c = crop(&g, 2, 3);
        assert_eq!(c, array![[0.0, 1.0, 2.0], [10.0, 11.0, 12.0]]);
    }
}
