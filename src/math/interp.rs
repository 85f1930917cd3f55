//! Gap filling over dated observations.
//!
//! Rules, for a target date `t` and the known points around it:
//! - exact match: copy the known value
//! - known points on both sides: linear interpolation in days
//! - before the first known point: the first known value (backward fill)
//! - after the last known point: the last known value (forward fill)
//!
//! Known values are never extrapolated by slope.

use chrono::NaiveDate;

/// Fill value at `date` from `known`, which must be sorted by date and non-empty.
pub fn fill_at(known: &[(NaiveDate, f64)], date: NaiveDate) -> f64 {
    debug_assert!(!known.is_empty());
    match known.binary_search_by_key(&date, |(d, _)| *d) {
        Ok(idx) => known[idx].1,
        Err(0) => known[0].1,
        Err(idx) if idx >= known.len() => known[known.len() - 1].1,
        Err(idx) => {
            let (d0, v0) = known[idx - 1];
            let (d1, v1) = known[idx];
            lerp_days(d0, v0, d1, v1, date)
        }
    }
}

/// Linear interpolation between `(d0, v0)` and `(d1, v1)`, weighted by days.
pub fn lerp_days(d0: NaiveDate, v0: f64, d1: NaiveDate, v1: f64, date: NaiveDate) -> f64 {
    let span = (d1 - d0).num_days() as f64;
    if span <= 0.0 {
        return v0;
    }
    let u = (date - d0).num_days() as f64 / span;
    v0 + (v1 - v0) * u
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn interpolates_by_elapsed_days() {
        let known = [(d(2001, 1, 1), 0.0), (d(2002, 1, 1), 365.0)];
        let v = fill_at(&known, d(2001, 3, 1));
        assert!((v - 59.0).abs() < 1e-12, "{v}");
    }

    #[test]
    fn propagates_outside_known_range() {
        let known = [(d(2001, 1, 1), 4.0), (d(2001, 6, 1), 8.0)];
        assert_eq!(fill_at(&known, d(2000, 1, 1)), 4.0);
        assert_eq!(fill_at(&known, d(2003, 1, 1)), 8.0);
        assert_eq!(fill_at(&known, d(2001, 6, 1)), 8.0);
    }
}
