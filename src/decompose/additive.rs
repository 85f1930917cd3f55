//! Additive seasonal decomposition: `value = trend + seasonal + residual`.
//!
//! Steps for a gap-free series `x` of length `n` and period `P`:
//!
//! 1. trend: centered moving average (`math::centered_weights`)
//! 2. boundary trend: the moving average is undefined within half a window of
//!    either end; those positions are filled from a least-squares line through
//!    the nearest `P` defined trend values on that side
//! 3. seasonal: mean of `x - trend` per phase `i mod P`, centered so the `P`
//!    phase means sum to zero, then tiled over the series
//! 4. residual: `x - trend - seasonal`
//!
//! Requires `n >= 2P` so the moving average defines at least one window's worth
//! of trend values.

use crate::decompose::period::validate_period;
use crate::domain::TimeSeries;
use crate::error::{PipelineError, PipelineResult};
use crate::math::{centered_convolve, centered_weights, fit_line};

/// The three additive components, aligned with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct Components {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

/// Decompose a gap-free series with the given period.
pub fn decompose_additive(series: &TimeSeries, period: usize) -> PipelineResult<Components> {
    validate_period(period)?;

    if let Some(date) = series.first_gap() {
        return Err(PipelineError::UnfilledGap {
            series: series.name().to_string(),
            date,
        });
    }

    let n = series.len();
    let needed = 2 * period;
    if n < needed {
        return Err(PipelineError::InsufficientLength {
            series: series.name().to_string(),
            got: n,
            needed,
            period,
        });
    }

    let values: Vec<f64> = series.values().iter().flatten().copied().collect();
    Ok(decompose_values(&values, period))
}

fn decompose_values(values: &[f64], period: usize) -> Components {
    let n = values.len();
    let trend = extrapolate_trend(&centered_convolve(values, &centered_weights(period)), period);

    let detrended: Vec<f64> = values.iter().zip(&trend).map(|(v, t)| v - t).collect();

    let mut phase_means: Vec<f64> = (0..period)
        .map(|phase| {
            let (sum, count) = detrended
                .iter()
                .skip(phase)
                .step_by(period)
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            sum / count as f64
        })
        .collect();
    let centre = phase_means.iter().sum::<f64>() / period as f64;
    for m in &mut phase_means {
        *m -= centre;
    }

    let seasonal: Vec<f64> = (0..n).map(|i| phase_means[i % period]).collect();
    let residual: Vec<f64> = detrended.iter().zip(&seasonal).map(|(d, s)| d - s).collect();

    Components {
        trend,
        seasonal,
        residual,
    }
}

/// Fill undefined boundary trend values from lines fitted to each end.
///
/// `npoints` defined values (or all of them, if fewer) feed each fit. With a
/// single defined value the boundary is held flat.
fn extrapolate_trend(trend: &[Option<f64>], npoints: usize) -> Vec<f64> {
    let n = trend.len();
    let Some(front) = trend.iter().position(Option::is_some) else {
        return vec![f64::NAN; n];
    };
    let back = trend.iter().rposition(Option::is_some).unwrap_or(front);

    let defined: Vec<f64> = trend[front..=back].iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let take = npoints.min(defined.len()).max(1);

    let head_line = line_through(front, &defined[..take]);
    let tail_start = back + 1 - take;
    let tail_line = line_through(tail_start, &defined[defined.len() - take..]);

    (0..n)
        .map(|i| match trend[i] {
            Some(v) => v,
            None if i < front => head_line.0 + head_line.1 * i as f64,
            None => tail_line.0 + tail_line.1 * i as f64,
        })
        .collect()
}

/// `(intercept, slope)` of the least-squares line through consecutive values
/// starting at index `start`.
fn line_through(start: usize, values: &[f64]) -> (f64, f64) {
    let xs: Vec<f64> = (0..values.len()).map(|k| (start + k) as f64).collect();
    fit_line(&xs, values).unwrap_or((values[0], 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, NaiveDate};

    fn monthly(name: &str, values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(1991, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..values.len() as u32).map(|i| start + Months::new(i)).collect();
        TimeSeries::from_dense(name, &dates, values).unwrap()
    }

    fn seasonal_signal(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                5.0 + 0.03 * t
                    + 1.5 * (2.0 * std::f64::consts::PI * t / period as f64).sin()
                    + 0.2 * ((i * 7919) % 13) as f64 / 13.0
            })
            .collect()
    }

    fn assert_reconstructs(values: &[f64], c: &Components) {
        for i in 0..values.len() {
            let rebuilt = c.trend[i] + c.seasonal[i] + c.residual[i];
            let tol = 1e-6 * values[i].abs().max(1.0);
            assert!((rebuilt - values[i]).abs() < tol, "index {i}: {rebuilt} vs {}", values[i]);
        }
    }

    #[test]
    fn components_reconstruct_input_for_monthly_period() {
        let values = seasonal_signal(360, 12);
        let c = decompose_additive(&monthly("Brazil_unemp", &values), 12).unwrap();
        assert_eq!(c.trend.len(), values.len());
        assert!(c.trend.iter().all(|v| v.is_finite()));
        assert_reconstructs(&values, &c);
    }

    #[test]
    fn components_reconstruct_at_minimum_length_for_odd_and_even_periods() {
        for period in [2usize, 3, 5, 12] {
            let values = seasonal_signal(2 * period, period);
            let c = decompose_additive(&monthly("x", &values), period).unwrap();
            assert!(c.trend.iter().all(|v| v.is_finite()), "period {period}");
            assert_reconstructs(&values, &c);
        }
    }

    #[test]
    fn seasonal_phase_means_sum_to_zero_and_repeat() {
        let values = seasonal_signal(48, 12);
        let c = decompose_additive(&monthly("x", &values), 12).unwrap();
        let one_cycle: f64 = c.seasonal[..12].iter().sum();
        assert!(one_cycle.abs() < 1e-9, "{one_cycle}");
        for i in 12..48 {
            assert_eq!(c.seasonal[i], c.seasonal[i - 12]);
        }
    }

    #[test]
    fn linear_series_has_linear_trend_everywhere() {
        let values: Vec<f64> = (0..30).map(|i| 2.0 + 0.5 * i as f64).collect();
        let c = decompose_additive(&monthly("x", &values), 6).unwrap();
        for (i, t) in c.trend.iter().enumerate() {
            assert!((t - values[i]).abs() < 1e-9, "index {i}: {t}");
        }
        assert!(c.seasonal.iter().all(|s| s.abs() < 1e-9));
    }

    #[test]
    fn recovers_pure_seasonal_pattern() {
        let pattern = [1.0, -2.0, 0.5, 0.5];
        let values: Vec<f64> = (0..40).map(|i| 10.0 + pattern[i % 4]).collect();
        let c = decompose_additive(&monthly("x", &values), 4).unwrap();
        for i in 0..40 {
            assert!((c.seasonal[i] - pattern[i % 4]).abs() < 1e-9);
            assert!((c.trend[i] - 10.0).abs() < 1e-9);
            assert!(c.residual[i].abs() < 1e-9);
        }
    }

    #[test]
    fn too_short_series_is_rejected() {
        let err = decompose_additive(&monthly("Chile_infl", &[1.0; 23]), 12).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InsufficientLength {
                series: "Chile_infl".to_string(),
                got: 23,
                needed: 24,
                period: 12,
            }
        );
    }

    #[test]
    fn gaps_must_be_filled_first() {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let points: Vec<_> = (0..8u32)
            .map(|i| (start + Months::new(i), if i == 3 { None } else { Some(1.0) }))
            .collect();
        let s = TimeSeries::new("x", points).unwrap();
        let err = decompose_additive(&s, 2).unwrap_err();
        assert!(matches!(err, PipelineError::UnfilledGap { .. }));
    }

    #[test]
    fn period_one_is_rejected() {
        let err = decompose_additive(&monthly("x", &[1.0; 10]), 1).unwrap_err();
        assert_eq!(err, PipelineError::InvalidPeriod { period: 1 });
    }
}
