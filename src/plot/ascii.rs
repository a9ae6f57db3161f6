//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - fitted curves: `-` line
//! - observed points: `1`, `2`, ... (dataset index, wrapping after 9)

use crate::domain::{Dataset, FittedGrid, ResultFile};
use crate::models::Model1D;
use crate::report::{grid_range, model_grid};

/// One panel per (model, dataset) pair, stacked vertically.
pub fn render_joint_plot(
    models: &[Box<dyn Model1D>],
    datasets: &[Dataset],
    width: usize,
    height: usize,
) -> String {
    let mut out = String::new();
    for (k, (model, data)) in models.iter().zip(datasets).enumerate() {
        let (x_min, x_max) = panel_range(model.as_ref(), data);
        let curve = model_grid(model.as_ref(), x_min, x_max, width.max(2));
        let points: Vec<(f64, f64)> = data.x.iter().copied().zip(data.y.iter().copied()).collect();
        out.push_str(&format!("{} ({})\n", model.name(), data.label));
        out.push_str(&render_plot(&points, marker(k), Some(&curve), x_min, x_max, width, height));
    }
    out
}

/// Plot the fitted grids stored in a saved result (curves only).
pub fn render_result_file(result: &ResultFile, width: usize, height: usize) -> String {
    let mut out = String::new();
    for m in &result.models {
        let Some((x_min, x_max)) = grid_x_range(&m.grid) else {
            out.push_str(&format!("{}: empty grid\n", m.name));
            continue;
        };
        out.push_str(&format!("{}\n", m.name));
        out.push_str(&render_plot(&[], '1', Some(&m.grid), x_min, x_max, width, height));
    }
    out
}

fn panel_range(model: &dyn Model1D, data: &Dataset) -> (f64, f64) {
    // Points must stay visible even if the bounding box is narrower.
    let (lo, hi) = grid_range(model, Some(data));
    match data.x_range() {
        Some((dlo, dhi)) => (lo.min(dlo), hi.max(dhi)),
        None => (lo, hi),
    }
}

fn marker(k: usize) -> char {
    char::from_digit((k % 9) as u32 + 1, 10).unwrap_or('o')
}

fn render_plot(
    points: &[(f64, f64)],
    point_char: char,
    curve: Option<&FittedGrid>,
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    // Determine y-range from observed points and curve points.
    let (y_min, y_max) = y_range(points, curve).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    if let Some(curve) = curve {
        draw_curve(&mut grid, curve, x_min, x_max, y_min, y_max);
    }

    for &(x, y) in points {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = point_char;
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: x=[{x_min:.3}, {x_max:.3}] | y=[{y_min:.3}, {y_max:.3}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn grid_x_range(grid: &FittedGrid) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in &grid.x {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

fn y_range(points: &[(f64, f64)], curve: Option<&FittedGrid>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for &(_, y) in points {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }
    if let Some(curve) = curve {
        for &y in curve.y.iter().filter(|y| y.is_finite()) {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &FittedGrid, x_min: f64, x_max: f64, y_min: f64, y_max: f64) {
    if curve.x.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for (&x, &y) in curve.x.iter().zip(&curve.y) {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, '-');
        } else {
            grid[row][col] = '-';
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelKind;
    use crate::models::BuiltinModel;

    #[test]
    fn plot_golden_snapshot_small() {
        let models: Vec<Box<dyn Model1D>> =
            vec![Box::new(BuiltinModel::new("flat", ModelKind::Linear1d, &[0.0, 100.0]).unwrap())];
        let datasets = vec![Dataset::new("d", vec![1.0, 10.0], vec![100.0, 110.0])];

        let txt = render_joint_plot(&models, &datasets, 10, 5);
        let expected = concat!(
            "flat (d)\n",
            "Plot: x=[1.000, 10.000] | y=[99.500, 110.500]\n",
            "         1\n",
            "          \n",
            "          \n",
            "          \n",
            "1---------\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn markers_cycle_through_digits() {
        assert_eq!(marker(0), '1');
        assert_eq!(marker(8), '9');
        assert_eq!(marker(9), '1');
    }
}
