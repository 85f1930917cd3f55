//! Variance stabilization.
//!
//! A series whose largest finite value exceeds a threshold is replaced by
//! `ln(1 + v)` before decomposition; otherwise it passes through untouched.
//! Hyperinflation episodes (four-digit annual rates next to single-digit
//! decades) otherwise swamp the seasonal and residual components.
//!
//! Thresholds are heuristics observed in practice rather than derived
//! constants. Two values are recognised, and callers may pass any other:
//!
//! - [`GENERAL_MERGE_THRESHOLD`] (20): merged, mixed-granularity tables. This is
//!   the pipeline default.
//! - [`SINGLE_COUNTRY_ANNUAL_THRESHOLD`] (50): one country's annual series
//!   analysed on its own.

use crate::domain::TimeSeries;
use crate::error::{PipelineError, PipelineResult};

/// Cutoff for merged tables mixing monthly and annual sources.
pub const GENERAL_MERGE_THRESHOLD: f64 = 20.0;

/// Cutoff for a single country's annual series.
pub const SINGLE_COUNTRY_ANNUAL_THRESHOLD: f64 = 50.0;

/// Output of [`stabilize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Stabilized {
    pub series: TimeSeries,
    pub transformed: bool,
}

/// Apply `log1p` when the series' maximum finite value exceeds `threshold`.
///
/// Missing values stay missing. A present value at or below `-1` (where
/// `log1p` is not finite) fails with `InvalidDomain` when the transform applies.
pub fn stabilize(series: &TimeSeries, threshold: f64) -> PipelineResult<Stabilized> {
    let Some(max) = series.max_finite() else {
        return Ok(Stabilized {
            series: series.clone(),
            transformed: false,
        });
    };
    if max <= threshold {
        return Ok(Stabilized {
            series: series.clone(),
            transformed: false,
        });
    }

    if let Some((date, value)) = series
        .iter()
        .find_map(|(d, v)| v.filter(|x| *x <= -1.0).map(|x| (d, x)))
    {
        return Err(PipelineError::InvalidDomain {
            series: series.name().to_string(),
            date,
            value,
        });
    }

    Ok(Stabilized {
        series: series.map_values(f64::ln_1p),
        transformed: true,
    })
}

/// Undo [`stabilize`] for values produced with `transformed == true`.
pub fn invert(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.exp_m1()).collect()
}
