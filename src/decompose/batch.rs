//! Per-entity decomposition over an aligned table.
//!
//! Every entity contributes two series (one per source suffix). Each goes
//! through: gap fill -> variance stabilization -> additive decomposition, using
//! one period inferred from the table's shared index.
//!
//! Entities share no state, so they are processed with a rayon parallel
//! iterator; output order is always entity order, left column first.
//!
//! Failure handling follows [`FailurePolicy`]:
//! - `SkipAndContinue`: the failing series is recorded in `failures`, the rest
//!   of the batch proceeds
//! - `Abort`: the first failure in entity order is returned as the run's error

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::decompose::additive::decompose_additive;
use crate::decompose::period::infer_period;
use crate::decompose::stabilize::stabilize;
use crate::domain::{AlignedTable, DecompositionResult, FailurePolicy, PeriodChoice, PipelineConfig, TimeSeries};
use crate::error::{PipelineError, PipelineResult};
use crate::series::normalize::fill_gaps;

/// Pipeline stage in which an entity failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Normalize,
    Decompose,
}

/// One entity (or one of its columns) that could not be processed.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFailure {
    pub entity: String,
    /// Column or series name, when the failure concerns a single column.
    pub column: Option<String>,
    pub stage: Stage,
    pub error: PipelineError,
}

/// Decomposition results for one aligned table.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub period: PeriodChoice,
    pub results: Vec<DecompositionResult>,
    pub failures: Vec<EntityFailure>,
}

impl BatchReport {
    /// Result for a named column (`{entity}{suffix}`).
    pub fn result(&self, series: &str) -> Option<&DecompositionResult> {
        self.results.iter().find(|r| r.series == series)
    }
}

/// Gap fill, stabilize and decompose one series.
pub fn decompose_series(
    series: &TimeSeries,
    choice: &PeriodChoice,
    threshold: f64,
) -> PipelineResult<DecompositionResult> {
    let filled = fill_gaps(series)?;
    let stabilized = stabilize(&filled, threshold)?;
    let components = decompose_additive(&stabilized.series, choice.period)?;

    log::debug!(
        "decomposed `{}`: n={} period={} transformed={}",
        series.name(),
        series.len(),
        choice.period,
        stabilized.transformed
    );

    Ok(DecompositionResult {
        series: series.name().to_string(),
        dates: stabilized.series.dates().to_vec(),
        observed: stabilized.series.values().iter().flatten().copied().collect(),
        trend: components.trend,
        seasonal: components.seasonal,
        residual: components.residual,
        period: choice.period,
        frequency: choice.frequency,
        low_confidence: choice.low_confidence,
        transformed: stabilized.transformed,
    })
}

/// Decompose both columns of every entity in `aligned`.
///
/// Callers should check `aligned.is_empty()` first; an empty index classifies
/// as unknown frequency and every series fails for lack of data.
pub fn decompose_aligned(aligned: &AlignedTable, config: &PipelineConfig) -> PipelineResult<BatchReport> {
    let choice = infer_period(aligned.index(), &config.period_policy, config.period_override)?;
    if choice.low_confidence {
        log::warn!(
            "Index frequency is {}; using fallback period {} (low confidence).",
            choice.frequency,
            choice.period
        );
    } else {
        log::info!("Index frequency is {}; decomposition period {}.", choice.frequency, choice.period);
    }

    let entities: Vec<&str> = aligned.entities().collect();
    let outcomes: Vec<Vec<Result<DecompositionResult, EntityFailure>>> = entities
        .par_iter()
        .map(|entity| {
            let Some((left, right)) = aligned.pair(entity) else {
                return Vec::new();
            };
            [left, right]
                .iter()
                .map(|series| {
                    decompose_series(series, &choice, config.threshold).map_err(|error| EntityFailure {
                        entity: entity.to_string(),
                        column: Some(series.name().to_string()),
                        stage: Stage::Decompose,
                        error,
                    })
                })
                .collect()
        })
        .collect();

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Ok(result) => results.push(result),
            Err(failure) => match config.failure_policy {
                FailurePolicy::Abort => return Err(failure.error),
                FailurePolicy::SkipAndContinue => {
                    log::warn!("Skipping `{}`: {}", failure.column.as_deref().unwrap_or(&failure.entity), failure.error);
                    failures.push(failure);
                }
            },
        }
    }

    log::info!(
        "Decomposed {} series across {} entities ({} failed).",
        results.len(),
        entities.len(),
        failures.len()
    );

    Ok(BatchReport {
        period: choice,
        results,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityTable, Frequency, MergeSuffixes};
    use crate::series::merge::merge_inner;
    use chrono::{Months, NaiveDate};

    fn monthly(name: &str, n: u32, f: impl Fn(u32) -> Option<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        TimeSeries::new(name, (0..n).map(|i| (start + Months::new(i), f(i)))).unwrap()
    }

    fn aligned(left: Vec<TimeSeries>, right: Vec<TimeSeries>) -> AlignedTable {
        merge_inner(
            &EntityTable::from_series(left),
            &EntityTable::from_series(right),
            &MergeSuffixes::default(),
        )
    }

    #[test]
    fn decomposes_both_columns_in_entity_order() {
        let table = aligned(
            vec![
                monthly("Chile", 36, |i| Some(7.0 + (i % 12) as f64 * 0.1)),
                monthly("Brazil", 36, |i| Some(9.0 + (i % 12) as f64 * 0.2)),
            ],
            vec![
                monthly("Chile", 36, |i| Some(3.0 + i as f64 * 0.01)),
                monthly("Brazil", 36, |i| Some(400.0 + i as f64)),
            ],
        );
        let report = decompose_aligned(&table, &PipelineConfig::default()).unwrap();

        assert_eq!(report.period.frequency, Frequency::Monthly);
        assert_eq!(report.period.period, 12);
        let names: Vec<&str> = report.results.iter().map(|r| r.series.as_str()).collect();
        assert_eq!(names, vec!["Brazil_unemp", "Brazil_infl", "Chile_unemp", "Chile_infl"]);
        assert!(report.result("Brazil_infl").unwrap().transformed);
        assert!(!report.result("Chile_infl").unwrap().transformed);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn internal_gaps_are_filled_before_decomposing() {
        let table = aligned(
            vec![monthly("Peru", 30, |i| if i % 5 == 2 { None } else { Some(6.0) })],
            vec![monthly("Peru", 30, |_| Some(2.0))],
        );
        let report = decompose_aligned(&table, &PipelineConfig::default()).unwrap();
        let r = report.result("Peru_unemp").unwrap();
        assert!(r.observed.iter().all(|v| (*v - 6.0).abs() < 1e-12));
    }

    #[test]
    fn failing_entity_is_skipped_by_default() {
        let table = aligned(
            vec![monthly("Brazil", 36, |_| Some(8.0)), monthly("Narnia", 36, |_| None)],
            vec![monthly("Brazil", 36, |_| Some(5.0)), monthly("Narnia", 36, |_| Some(1.0))],
        );
        let report = decompose_aligned(&table, &PipelineConfig::default()).unwrap();
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.entity, "Narnia");
        assert_eq!(failure.column.as_deref(), Some("Narnia_unemp"));
        assert!(matches!(failure.error, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn abort_policy_surfaces_first_failure() {
        let table = aligned(
            vec![monthly("Brazil", 36, |_| Some(8.0)), monthly("Narnia", 36, |_| None)],
            vec![monthly("Brazil", 36, |_| Some(5.0)), monthly("Narnia", 36, |_| Some(1.0))],
        );
        let config = PipelineConfig {
            failure_policy: FailurePolicy::Abort,
            ..PipelineConfig::default()
        };
        let err = decompose_aligned(&table, &config).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InsufficientData {
                series: "Narnia_unemp".to_string()
            }
        );
    }

    #[test]
    fn short_table_reports_insufficient_length_per_series() {
        let table = aligned(
            vec![monthly("Brazil", 20, |_| Some(8.0))],
            vec![monthly("Brazil", 20, |_| Some(5.0))],
        );
        let report = decompose_aligned(&table, &PipelineConfig::default()).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.failures.len(), 2);
        assert!(
            report
                .failures
                .iter()
                .all(|f| matches!(f.error, PipelineError::InsufficientLength { needed: 24, .. }))
        );
    }
}
