//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Each series is drawn as a line using its own glyph (`*`, `+`, `x`, ...);
//! a legend below the grid maps glyphs to series names. With
//! `Marker::Dot`, observations are overdrawn with `o`.

use crate::domain::TimeSeries;
use crate::error::AppError;
use crate::plot::{Marker, PlotOptions, PlotRenderer, Projected, bounds, pad_range, project, unproject_y};

const GLYPHS: [char; 8] = ['*', '+', 'x', '#', '%', '@', '&', '='];

/// Renders to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiRenderer {
    pub width: usize,
    pub height: usize,
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self { width: 80, height: 20 }
    }
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Render the chart to a string (no I/O).
    pub fn render_to_string(&self, series: &[TimeSeries], options: &PlotOptions) -> String {
        let projected = project(series, options.log_scale);
        render_plot(&projected, options, self.width, self.height)
    }
}

impl PlotRenderer for AsciiRenderer {
    fn render(&self, series: &[TimeSeries], options: &PlotOptions) -> Result<(), AppError> {
        println!("{}", self.render_to_string(series, options));
        Ok(())
    }
}

fn render_plot(series: &[Projected], options: &PlotOptions, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let mut out = String::new();
    out.push_str(&options.title);
    out.push('\n');

    let Some(((x_min, x_max), (y_min, y_max))) = bounds(series) else {
        out.push_str("(no data)\n");
        return out;
    };
    let (x_min, x_max) = if x_max > x_min { (x_min, x_max) } else { pad_range(x_min, x_max, 0.5) };
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    for (i, s) in series.iter().enumerate() {
        let glyph = GLYPHS[i % GLYPHS.len()];
        draw_curve(&mut grid, &s.points, glyph, (x_min, x_max), (y_min, y_max));
    }
    if options.marker == Marker::Dot {
        for &(x, y) in series.iter().flat_map(|s| s.points.iter()) {
            let col = map_x(x, x_min, x_max, width);
            let row = map_y(y, y_min, y_max, height);
            grid[row][col] = 'o';
        }
    }

    let scale = if options.log_scale { " (log)" } else { "" };
    out.push_str(&format!(
        "{}=[{:.2}, {:.2}] | {}{scale}=[{:.2}, {:.2}]\n",
        options.x_label,
        x_min,
        x_max,
        options.y_label,
        unproject_y(y_min, options.log_scale),
        unproject_y(y_max, options.log_scale),
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    for (i, s) in series.iter().enumerate() {
        out.push_str(&format!("  {} {}\n", GLYPHS[i % GLYPHS.len()], s.name));
    }

    out
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

fn draw_curve(grid: &mut [Vec<char>], points: &[(f64, f64)], glyph: char, x: (f64, f64), y: (f64, f64)) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(px, py) in points {
        let col = map_x(px, x.0, x.1, width);
        let row = map_y(py, y.0, y.1, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, glyph),
            None => grid[row][col] = glyph,
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
        if y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len() {
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
