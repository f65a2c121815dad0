use crate::types::Placement;
use ndarray::Array2;

const MAX_WIDTH: f64 = 80.0;
const MAX_HEIGHT: f64 = 40.0;

/// Outline of the rotated frame with the winning window drawn inside, labelled by score.
pub fn render_window(placement: &Placement) -> String {
    let (rows, cols) = placement.frame;
    if rows == 0 || cols == 0 {
        return String::new();
    }
    let scale = f64::min(MAX_WIDTH / cols as f64, MAX_HEIGHT / rows as f64);
    let grid_w = (cols as f64 * scale).round() as usize;
    let grid_h = (rows as f64 * scale).round() as usize;

    if grid_w == 0 || grid_h == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; grid_h + 1];

    draw_rect(&mut grid, 0, 0, grid_w, grid_h);

    let w = placement.window;
    let sx = (w.left as f64 * scale).round() as usize;
    let sy = (w.top as f64 * scale).round() as usize;
    let sw = (w.width() as f64 * scale).round() as usize;
    let sh = (w.height() as f64 * scale).round() as usize;

    if sw > 0 && sh > 0 {
        draw_rect(&mut grid, sx, sy, sw, sh);

        let label: Vec<char> = format!("{:.0}", placement.score).chars().collect();
        if sw > 2 {
            let cx = sx + sw / 2;
            let cy = sy + sh / 2;
            let start_x = cx.saturating_sub(label.len() / 2);

            for (i, &ch) in label.iter().enumerate() {
                let x = start_x + i;
                if x > sx && x < sx + sw && cy > sy && cy < sy + sh {
                    grid[cy][x] = ch;
                }
            }
        }
    }

    to_text(&grid)
}

/// Parcel-frame footprint, downsampled to fit the terminal. `#` marks AOI cells.
pub fn render_footprint(footprint: &Array2<u8>) -> String {
    let (rows, cols) = footprint.dim();
    if rows == 0 || cols == 0 {
        return String::new();
    }
    let scale = f64::min(MAX_WIDTH / cols as f64, MAX_HEIGHT / rows as f64).min(1.0);
    let grid_w = ((cols as f64 * scale).round() as usize).max(1);
    let grid_h = ((rows as f64 * scale).round() as usize).max(1);

    let grid: Vec<Vec<char>> = (0..grid_h)
        .map(|y| {
            (0..grid_w)
                .map(|x| {
                    let r = ((y as f64 + 0.5) / scale) as usize;
                    let c = ((x as f64 + 0.5) / scale) as usize;
                    match footprint.get((r.min(rows - 1), c.min(cols - 1))) {
                        Some(&m) if m > 0 => '#',
                        _ => '.',
                    }
                })
                .collect()
        })
        .collect();

    to_text(&grid)
}

fn to_text(grid: &[Vec<char>]) -> String {
    let mut result = String::new();
    for row in grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

#[allow(clippy::needless_range_loop)]
fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let cols = if rows > 0 { grid[0].len() } else { return };

    for i in x..=x + w {
        if i >= cols {
            continue;
        }
        for j in [y, y + h] {
            if j < rows {
                grid[j][i] = if matches!(grid[j][i], '|' | '+') { '+' } else { '-' };
            }
        }
    }

    for j in y..=y + h {
        if j >= rows {
            continue;
        }
        for i in [x, x + w] {
            if i < cols {
                grid[j][i] = if matches!(grid[j][i], '-' | '+') { '+' } else { '|' };
            }
        }
    }

    for &cx in &[x, x + w] {
        for &cy in &[y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}
