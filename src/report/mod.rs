//! Reporting utilities: per-series component statistics and formatted
//! terminal output.

pub mod format;

pub use format::*;

use crate::domain::DecompositionResult;

/// Summary of one decomposition, in the units that were decomposed
/// (log1p units when `transformed`).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentStats {
    pub series: String,
    pub n: usize,
    pub transformed: bool,
    pub trend_start: f64,
    pub trend_end: f64,
    /// Peak-to-trough range of the seasonal pattern.
    pub seasonal_range: f64,
    /// Sample standard deviation of the residual.
    pub residual_sd: f64,
    /// Share of detrended variance explained by the seasonal component.
    pub seasonal_strength: f64,
}

pub fn component_stats(result: &DecompositionResult) -> ComponentStats {
    let seasonal_min = result.seasonal.iter().copied().fold(f64::INFINITY, f64::min);
    let seasonal_max = result.seasonal.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let seasonal_range = if seasonal_max >= seasonal_min { seasonal_max - seasonal_min } else { 0.0 };

    let detrended: Vec<f64> = result
        .seasonal
        .iter()
        .zip(&result.residual)
        .map(|(s, r)| s + r)
        .collect();
    let var_resid = variance(&result.residual);
    let var_detrended = variance(&detrended);
    let seasonal_strength = if var_detrended > 0.0 {
        (1.0 - var_resid / var_detrended).clamp(0.0, 1.0)
    } else {
        0.0
    };

    ComponentStats {
        series: result.series.clone(),
        n: result.dates.len(),
        transformed: result.transformed,
        trend_start: result.trend.first().copied().unwrap_or(f64::NAN),
        trend_end: result.trend.last().copied().unwrap_or(f64::NAN),
        seasonal_range,
        residual_sd: var_resid.sqrt(),
        seasonal_strength,
    }
}

fn variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)
}
