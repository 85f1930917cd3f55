//! Plot renderers.
//!
//! Renderers are side-effecting sinks: they receive named series plus
//! [`PlotOptions`] and draw them somewhere (the terminal, an SVG file). They
//! never feed anything back into the pipeline.
//!
//! Both renderers share the same projection: dates map to fractional years on
//! the x axis, and `log_scale` plots `log10(y)` (non-positive values are
//! dropped, as log axes cannot show them).

pub mod ascii;
pub mod svg;

use chrono::{Datelike, NaiveDate};

use crate::domain::TimeSeries;
use crate::error::AppError;

pub use ascii::AsciiRenderer;
pub use svg::SvgRenderer;

/// Point marker drawn on top of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Marker {
    /// Lines only.
    #[default]
    None,
    /// A dot at every observation.
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub log_scale: bool,
    pub marker: Marker,
}

impl PlotOptions {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            log_scale: false,
            marker: Marker::None,
        }
    }

    pub fn with_log_scale(mut self, log_scale: bool) -> Self {
        self.log_scale = log_scale;
        self
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = marker;
        self
    }
}

pub trait PlotRenderer {
    fn render(&self, series: &[TimeSeries], options: &PlotOptions) -> Result<(), AppError>;
}

/// A series projected onto plot coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Projected {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Project every series; gaps (and non-positive values on log axes) are skipped.
pub(crate) fn project(series: &[TimeSeries], log_scale: bool) -> Vec<Projected> {
    series
        .iter()
        .map(|s| Projected {
            name: s.name().to_string(),
            points: s
                .iter()
                .filter_map(|(date, value)| {
                    let y = project_y(value?, log_scale)?;
                    Some((fractional_year(date), y))
                })
                .collect(),
        })
        .collect()
}

fn project_y(value: f64, log_scale: bool) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    if log_scale {
        (value > 0.0).then(|| value.log10())
    } else {
        Some(value)
    }
}

/// Inverse of the y projection, for axis labels.
pub(crate) fn unproject_y(y: f64, log_scale: bool) -> f64 {
    if log_scale { 10f64.powf(y) } else { y }
}

/// `1991-01-01` -> `1991.0`, `1991-07-02` -> ~`1991.5`.
pub(crate) fn fractional_year(date: NaiveDate) -> f64 {
    let days_in_year = if date.leap_year() { 366.0 } else { 365.0 };
    f64::from(date.year()) + f64::from(date.ordinal0()) / days_in_year
}

/// Combined (x, y) bounds of all projected points.
pub(crate) fn bounds(series: &[Projected]) -> Option<((f64, f64), (f64, f64))> {
    let mut x = (f64::INFINITY, f64::NEG_INFINITY);
    let mut y = (f64::INFINITY, f64::NEG_INFINITY);
    for &(px, py) in series.iter().flat_map(|s| s.points.iter()) {
        x = (x.0.min(px), x.1.max(px));
        y = (y.0.min(py), y.1.max(py));
    }
    (x.0.is_finite() && y.0.is_finite()).then_some((x, y))
}

pub(crate) fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-6);
    (min - pad, max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn log_projection_drops_non_positive_values() {
        let s = TimeSeries::new(
            "Japan_infl",
            vec![(d(2000, 1), Some(-0.5)), (d(2001, 1), Some(100.0)), (d(2002, 1), None)],
        )
        .unwrap();
        let linear = project(std::slice::from_ref(&s), false);
        assert_eq!(linear[0].points.len(), 2);

        let log = project(&[s], true);
        assert_eq!(log[0].points, vec![(2001.0, 2.0)]);
        assert!((unproject_y(2.0, true) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn fractional_years_are_monotone() {
        assert_eq!(fractional_year(d(1991, 1)), 1991.0);
        let mid = fractional_year(NaiveDate::from_ymd_opt(1991, 7, 2).unwrap());
        assert!((mid - 1991.5).abs() < 0.01);
        assert!(fractional_year(d(1991, 12)) < fractional_year(d(1992, 1)));
    }
}
