//! Maps a winning placement from its rotated frame back onto the parcel raster.

use crate::grid::{self, Grid, NO_DATA};
use crate::types::Placement;
use ndarray::{Array2, s};

/// Binary parcel-frame raster of the placement: 1 inside the AOI, 0 elsewhere.
///
/// The mask is pasted into the rotated frame, rotated back, centre-cropped to
/// `score`'s shape, grown by `smoothing` 3x3 dilation passes to close small
/// holes, and finally clipped to cells that carry parcel data.
pub fn project(placement: &Placement, score: &Grid, smoothing: usize) -> Array2<u8> {
    let (rows, cols) = score.dim();
    let mut canvas = Grid::zeros(placement.frame);
    let w = placement.window;
    if w.fits_in(placement.frame.0, placement.frame.1)
        && placement.mask.dim() == (w.height(), w.width())
    {
        canvas
            .slice_mut(s![w.top..w.bottom, w.left..w.right])
            .assign(&placement.mask);
    }

    let restored = grid::rotate(&canvas, -(placement.rotation as f64), 0.0);
    let cropped = crop_centred(&restored, rows, cols);
    let mut mask = cropped.mapv(|v| u8::from(v > 0.0));
    for _ in 0..smoothing {
        mask = dilate(&mask);
    }

    ndarray::Zip::from(&mut mask)
        .and(score)
        .for_each(|m, &v| {
            if v == NO_DATA {
                *m = 0;
            }
        });
    mask
}

/// Central `rows` x `cols` region of `grid`; cells beyond its edge are 0.
fn crop_centred(grid: &Grid, rows: usize, cols: usize) -> Grid {
    let (src_rows, src_cols) = grid.dim();
    let row_off = ((src_rows as f64 - rows as f64) / 2.0).floor() as isize;
    let col_off = ((src_cols as f64 - cols as f64) / 2.0).floor() as isize;
    Grid::from_shape_fn((rows, cols), |(r, c)| {
        let (sr, sc) = (r as isize + row_off, c as isize + col_off);
        if sr >= 0 && sc >= 0 && (sr as usize) < src_rows && (sc as usize) < src_cols {
            grid[[sr as usize, sc as usize]]
        } else {
            0.0
        }
    })
}

/// One pass of 8-neighbour dilation.
fn dilate(mask: &Array2<u8>) -> Array2<u8> {
    let (rows, cols) = mask.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let r0 = r.saturating_sub(1);
        let c0 = c.saturating_sub(1);
        let r1 = (r + 2).min(rows);
        let c1 = (c + 2).min(cols);
        u8::from(mask.slice(s![r0..r1, c0..c1]).iter().any(|&m| m > 0))
    })
}
