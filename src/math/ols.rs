//! Least squares line fitting.
//!
//! The decomposer extends its moving-average trend past the series boundaries
//! with a straight line fitted to the nearest defined trend values:
//!
//! ```text
//! minimize Σ (y_i - (a + b x_i))^2
//! ```
//!
//! Implementation choices:
//! - We build the `[1, x]` design matrix and solve with SVD, which handles the
//!   tall (more rows than columns) system without forming normal equations.
//! - Inputs are tiny (one seasonal period of points), so SVD cost is irrelevant.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = intercept + slope * x`, returning `(intercept, slope)`.
///
/// Needs at least two points with distinct `x`.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len();
    let design = DMatrix::from_fn(n, 2, |r, c| if c == 0 { 1.0 } else { xs[r] });
    let target = DVector::from_column_slice(ys);
    let beta = solve_least_squares(&design, &target)?;
    Some((beta[0], beta[1]))
}
