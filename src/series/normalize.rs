//! Frequency normalization and gap filling.
//!
//! [`normalize`] resamples a series onto a regular calendar grid (month starts
//! or year starts) spanning the series' own range. Grid values come from
//! `math::fill_at`: copied on exact matches, interpolated in days between known
//! neighbours, and propagated (never slope-extrapolated) beyond the first and
//! last known values.
//!
//! [`fill_gaps`] applies the same rules to the series' existing dates.
//!
//! Both are total over any series with at least one known value, and both
//! return a new series.

use chrono::{Datelike, Months, NaiveDate};

use crate::decompose::period::classify_frequency;
use crate::domain::{EntityTable, FailurePolicy, Frequency, Step, TimeSeries};
use crate::error::{PipelineError, PipelineResult};
use crate::math::fill_at;

/// Options for [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub step: Step,
    /// When the input is coarser than `step` (annual input, monthly grid),
    /// extend the grid to the last step inside the final input period.
    pub cover_final_period: bool,
}

impl NormalizeOptions {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            cover_final_period: false,
        }
    }
}

impl Step {
    /// Snap a date back to the grid (first of month / January 1st).
    pub fn floor(self, date: NaiveDate) -> NaiveDate {
        let (year, month) = match self {
            Step::MonthStart => (date.year(), date.month()),
            Step::YearStart => (date.year(), 1),
        };
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
    }

    fn months(self) -> u32 {
        match self {
            Step::MonthStart => 1,
            Step::YearStart => 12,
        }
    }

    /// Grid dates from `first` to `last` inclusive (both already on the grid).
    pub fn grid(self, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        let mut out = Vec::new();
        let mut current = Some(first);
        while let Some(date) = current {
            if date > last {
                break;
            }
            out.push(date);
            current = date.checked_add_months(Months::new(self.months()));
        }
        out
    }
}

/// Resample `series` onto the regular grid for `options.step`.
pub fn normalize(series: &TimeSeries, options: NormalizeOptions) -> PipelineResult<TimeSeries> {
    let known = known_or_fail(series)?;
    let dates = series.dates();
    let (Some(&first), Some(&last)) = (dates.first(), dates.last()) else {
        return Err(insufficient(series));
    };

    let start = options.step.floor(first);
    let mut end = options.step.floor(last);
    if options.cover_final_period
        && options.step == Step::MonthStart
        && classify_frequency(dates) == Frequency::Annual
    {
        end = NaiveDate::from_ymd_opt(end.year(), 12, 1).unwrap_or(end);
    }

    let grid = options.step.grid(start, end);
    let values = grid.iter().map(|d| Some(fill_at(&known, *d))).collect();
    Ok(TimeSeries::from_parts(series.name().to_string(), grid, values))
}

/// Fill missing values in place of the series' own dates.
pub fn fill_gaps(series: &TimeSeries) -> PipelineResult<TimeSeries> {
    let known = known_or_fail(series)?;
    let values = series
        .iter()
        .map(|(d, v)| Some(v.filter(|x| x.is_finite()).unwrap_or_else(|| fill_at(&known, d))))
        .collect();
    Ok(TimeSeries::from_parts(
        series.name().to_string(),
        series.dates().to_vec(),
        values,
    ))
}

/// Normalize every series in a table.
///
/// With `FailurePolicy::SkipAndContinue` entities that cannot be normalized
/// (no known values) are dropped and returned alongside the table; with
/// `Abort` the first failure in entity order is returned.
pub fn normalize_table(
    table: &EntityTable,
    options: NormalizeOptions,
    policy: FailurePolicy,
) -> PipelineResult<(EntityTable, Vec<(String, PipelineError)>)> {
    let mut out = EntityTable::new();
    let mut dropped = Vec::new();
    for series in table.series() {
        match normalize(series, options) {
            Ok(normalized) => {
                out.insert(normalized);
            }
            Err(err) => match policy {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::SkipAndContinue => {
                    log::warn!("Dropping `{}` during normalization: {err}", series.name());
                    dropped.push((series.name().to_string(), err));
                }
            },
        }
    }
    Ok((out, dropped))
}

fn known_or_fail(series: &TimeSeries) -> PipelineResult<Vec<(NaiveDate, f64)>> {
    let known = series.known_points();
    if known.is_empty() {
        return Err(insufficient(series));
    }
    Ok(known)
}

fn insufficient(series: &TimeSeries) -> PipelineError {
    PipelineError::InsufficientData {
        series: series.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn values(s: &TimeSeries) -> Vec<f64> {
        s.values().iter().map(|v| v.unwrap()).collect()
    }

    #[test]
    fn monthly_grid_interpolates_and_copies() {
        let s = TimeSeries::new(
            "x",
            vec![(d(2000, 1, 1), Some(0.0)), (d(2000, 4, 1), Some(91.0))],
        )
        .unwrap();
        let out = normalize(&s, NormalizeOptions::new(Step::MonthStart)).unwrap();
        assert_eq!(out.dates(), &[d(2000, 1, 1), d(2000, 2, 1), d(2000, 3, 1), d(2000, 4, 1)]);
        // 2000 is a leap year: Jan has 31 days, Feb 29.
        for (got, want) in values(&out).into_iter().zip([0.0, 31.0, 60.0, 91.0]) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn missing_edges_are_propagated_not_extrapolated() {
        let s = TimeSeries::new(
            "x",
            vec![
                (d(2000, 1, 1), None),
                (d(2000, 2, 1), Some(5.0)),
                (d(2000, 3, 1), Some(7.0)),
                (d(2000, 4, 1), None),
                (d(2000, 5, 1), None),
            ],
        )
        .unwrap();
        let out = normalize(&s, NormalizeOptions::new(Step::MonthStart)).unwrap();
        assert_eq!(values(&out), vec![5.0, 5.0, 7.0, 7.0, 7.0]);
    }

    #[test]
    fn off_grid_observations_anchor_interpolation() {
        let s = TimeSeries::new(
            "x",
            vec![(d(2000, 1, 15), Some(10.0)), (d(2000, 3, 15), Some(70.0))],
        )
        .unwrap();
        let out = normalize(&s, NormalizeOptions::new(Step::MonthStart)).unwrap();
        assert_eq!(out.dates(), &[d(2000, 1, 1), d(2000, 2, 1), d(2000, 3, 1)]);
        let v = values(&out);
        assert_eq!(v[0], 10.0);
        // Feb 1 is 17 of the 60 days between the anchors.
        assert!((v[1] - (10.0 + 60.0 * 17.0 / 60.0)).abs() < 1e-12);
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let s = TimeSeries::new(
            "x",
            vec![
                (d(1999, 11, 20), Some(2.0)),
                (d(2000, 2, 1), None),
                (d(2000, 6, 3), Some(-1.0)),
                (d(2001, 1, 9), Some(4.5)),
            ],
        )
        .unwrap();
        for step in [Step::MonthStart, Step::YearStart] {
            let opts = NormalizeOptions {
                step,
                cover_final_period: true,
            };
            let once = normalize(&s, opts).unwrap();
            let twice = normalize(&once, opts).unwrap();
            assert_eq!(once, twice, "{step:?}");
        }
    }

    #[test]
    fn annual_input_covers_final_year_when_requested() {
        let s = TimeSeries::new(
            "Brazil",
            vec![
                (d(2018, 1, 1), Some(3.7)),
                (d(2019, 1, 1), Some(3.7)),
                (d(2020, 1, 1), Some(3.2)),
            ],
        )
        .unwrap();

        let plain = normalize(&s, NormalizeOptions::new(Step::MonthStart)).unwrap();
        assert_eq!(plain.len(), 25);
        assert_eq!(plain.dates().last(), Some(&d(2020, 1, 1)));

        let covered = normalize(
            &s,
            NormalizeOptions {
                step: Step::MonthStart,
                cover_final_period: true,
            },
        )
        .unwrap();
        assert_eq!(covered.len(), 36);
        assert_eq!(covered.dates().last(), Some(&d(2020, 12, 1)));
        assert_eq!(covered.value_at(d(2020, 12, 1)), Some(3.2));
    }

    #[test]
    fn year_start_grid_from_monthly_points() {
        let s = TimeSeries::new(
            "x",
            vec![(d(2000, 6, 1), Some(1.0)), (d(2002, 3, 1), Some(3.0))],
        )
        .unwrap();
        let out = normalize(&s, NormalizeOptions::new(Step::YearStart)).unwrap();
        assert_eq!(out.dates(), &[d(2000, 1, 1), d(2001, 1, 1), d(2002, 1, 1)]);
        assert_eq!(out.value_at(d(2000, 1, 1)), Some(1.0));
    }

    #[test]
    fn no_known_points_is_insufficient_data() {
        let s = TimeSeries::new("Narnia", vec![(d(2000, 1, 1), None), (d(2000, 2, 1), Some(f64::NAN))]).unwrap();
        let err = normalize(&s, NormalizeOptions::new(Step::MonthStart)).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InsufficientData {
                series: "Narnia".to_string()
            }
        );
        assert!(fill_gaps(&s).is_err());

        let empty = TimeSeries::new("empty", Vec::new()).unwrap();
        assert!(normalize(&empty, NormalizeOptions::new(Step::MonthStart)).is_err());
    }

    #[test]
    fn fill_gaps_keeps_index_and_known_values() {
        let s = TimeSeries::new(
            "x",
            vec![
                (d(2000, 1, 1), None),
                (d(2000, 2, 1), Some(2.0)),
                (d(2000, 3, 1), None),
                (d(2000, 4, 1), Some(4.0)),
            ],
        )
        .unwrap();
        let out = fill_gaps(&s).unwrap();
        assert_eq!(out.dates(), s.dates());
        let v = values(&out);
        assert_eq!(v[0], 2.0);
        assert_eq!(v[1], 2.0);
        assert!(v[2] > 2.0 && v[2] < 4.0);
        assert_eq!(v[3], 4.0);
    }

    #[test]
    fn normalize_table_skips_or_aborts_on_empty_entity() {
        let good = TimeSeries::new("Brazil", vec![(d(2000, 1, 1), Some(1.0))]).unwrap();
        let bad = TimeSeries::new("Narnia", vec![(d(2000, 1, 1), None)]).unwrap();
        let table = EntityTable::from_series([good, bad]);
        let opts = NormalizeOptions::new(Step::MonthStart);

        let (out, dropped) = normalize_table(&table, opts, FailurePolicy::SkipAndContinue).unwrap();
        assert_eq!(out.entities().collect::<Vec<_>>(), vec!["Brazil"]);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0, "Narnia");

        assert!(normalize_table(&table, opts, FailurePolicy::Abort).is_err());
    }
}
