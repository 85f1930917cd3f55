//! Frequency classification and decomposition-period inference.
//!
//! The classification looks only at the smallest positive gap between
//! consecutive dates:
//!
//! | minimal gap (days) | frequency |
//! |--------------------|-----------|
//! | 360 ..= 370        | annual    |
//! | 28 ..= 31          | monthly   |
//! | anything else      | unknown   |
//!
//! A period of 1 would leave nothing for the seasonal component, so every
//! mapping produces at least 2.

use chrono::NaiveDate;

use crate::domain::{Frequency, PeriodChoice, PeriodPolicy};
use crate::error::{PipelineError, PipelineResult};

const ANNUAL_GAP_DAYS: std::ops::RangeInclusive<i64> = 360..=370;
const MONTHLY_GAP_DAYS: std::ops::RangeInclusive<i64> = 28..=31;

/// Smallest accepted decomposition period.
pub const MIN_PERIOD: usize = 2;

/// Classify an index by its minimal positive gap.
pub fn classify_frequency(dates: &[NaiveDate]) -> Frequency {
    let min_gap = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .filter(|gap| *gap > 0)
        .min();

    match min_gap {
        Some(gap) if ANNUAL_GAP_DAYS.contains(&gap) => Frequency::Annual,
        Some(gap) if MONTHLY_GAP_DAYS.contains(&gap) => Frequency::Monthly,
        _ => Frequency::Unknown,
    }
}

impl PeriodPolicy {
    /// Period for a frequency, flagging the fallback as low-confidence.
    pub fn period_for(&self, frequency: Frequency) -> PipelineResult<PeriodChoice> {
        let (period, low_confidence) = match frequency {
            Frequency::Annual => (self.annual, false),
            Frequency::Monthly => (self.monthly, false),
            Frequency::Unknown => (self.fallback, true),
        };
        validate_period(period)?;
        Ok(PeriodChoice {
            frequency,
            period,
            low_confidence,
        })
    }
}

/// Classify `dates` and map the frequency to a period.
///
/// An explicit `period_override` skips the mapping but the detected frequency
/// is still reported.
pub fn infer_period(
    dates: &[NaiveDate],
    policy: &PeriodPolicy,
    period_override: Option<usize>,
) -> PipelineResult<PeriodChoice> {
    let frequency = classify_frequency(dates);
    match period_override {
        Some(period) => {
            validate_period(period)?;
            Ok(PeriodChoice {
                frequency,
                period,
                low_confidence: false,
            })
        }
        None => policy.period_for(frequency),
    }
}

pub fn validate_period(period: usize) -> PipelineResult<()> {
    if period < MIN_PERIOD {
        return Err(PipelineError::InvalidPeriod { period });
    }
    Ok(())
}
