//! The alignment/decomposition workflow, with no I/O.
//!
//! Keeping this in one place avoids duplicating the core workflow across
//! subcommands:
//! reshape inflation -> normalize both tables -> merge -> decompose
//!
//! Subcommands then only deal with where tables come from and where results go
//! (files, plots, terminal).

use crate::decompose::{BatchReport, EntityFailure, Stage, decompose_aligned};
use crate::domain::{AlignedTable, EntityTable, MergeSuffixes, PipelineConfig, Step, WideTable};
use crate::error::PipelineResult;
use crate::series::{NormalizeOptions, merge_inner, normalize, normalize_table, reshape};

/// Outputs of the alignment half of the pipeline.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Reshaped inflation table, on its source (annual) dates.
    pub inflation: EntityTable,
    /// Unemployment table on the normalization grid.
    pub unemployment_normalized: EntityTable,
    /// Inflation table on the normalization grid.
    pub inflation_normalized: EntityTable,
    pub aligned: AlignedTable,
    /// Entities dropped during normalization.
    pub failures: Vec<EntityFailure>,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub alignment: Alignment,
    /// `None` when the aligned table has no rows.
    pub batch: Option<BatchReport>,
}

impl RunOutput {
    /// Normalization and decomposition failures, in pipeline order.
    pub fn failures(&self) -> Vec<&EntityFailure> {
        let batch = self.batch.iter().flat_map(|b| b.failures.iter());
        self.alignment.failures.iter().chain(batch).collect()
    }
}

/// Reshape, normalize and merge the two source tables.
pub fn align_sources(
    unemployment: &EntityTable,
    inflation: &WideTable,
    config: &PipelineConfig,
) -> PipelineResult<Alignment> {
    let inflation = reshape(inflation, config.label_format, config.duplicate_policy)?;

    let options = NormalizeOptions {
        step: config.step,
        cover_final_period: config.cover_final_period,
    };
    let (unemployment_normalized, dropped_left) = normalize_table(unemployment, options, config.failure_policy)?;
    let (inflation_normalized, dropped_right) = normalize_table(&inflation, options, config.failure_policy)?;
    log::info!(
        "Normalized {} unemployment and {} inflation series onto the {:?} grid.",
        unemployment_normalized.len(),
        inflation_normalized.len(),
        config.step
    );

    let failures = normalization_failures(dropped_left, &config.suffixes.left)
        .chain(normalization_failures(dropped_right, &config.suffixes.right))
        .collect();

    let aligned = merge_inner(&unemployment_normalized, &inflation_normalized, &config.suffixes);

    Ok(Alignment {
        inflation,
        unemployment_normalized,
        inflation_normalized,
        aligned,
        failures,
    })
}

/// Full run: align the sources, then decompose every aligned entity.
pub fn run_pipeline(
    unemployment: &EntityTable,
    inflation: &WideTable,
    config: &PipelineConfig,
) -> PipelineResult<RunOutput> {
    let alignment = align_sources(unemployment, inflation, config)?;

    let batch = if alignment.aligned.is_empty() {
        log::warn!("Aligned table is empty; nothing to decompose.");
        None
    } else {
        Some(decompose_aligned(&alignment.aligned, config)?)
    };

    Ok(RunOutput { alignment, batch })
}

/// Decompose one entity of an existing aligned table.
///
/// With `annual`, both columns are first resampled onto January 1st of every
/// year. Returns `Ok(None)` when the entity is not in the table.
pub fn decompose_entity(
    aligned: &AlignedTable,
    entity: &str,
    annual: bool,
    config: &PipelineConfig,
) -> PipelineResult<Option<BatchReport>> {
    if !aligned.contains(entity) {
        return Ok(None);
    }
    let single = aligned.subset([entity]);
    let single = if annual {
        resample(&single, Step::YearStart)?
    } else {
        single
    };
    decompose_aligned(&single, config).map(Some)
}

fn resample(aligned: &AlignedTable, step: Step) -> PipelineResult<AlignedTable> {
    let options = NormalizeOptions::new(step);
    let mut left = EntityTable::new();
    let mut right = EntityTable::new();
    for entity in aligned.entities() {
        let Some((l, r)) = aligned.pair(entity) else {
            continue;
        };
        left.insert(normalize(&l, options)?.renamed(entity));
        right.insert(normalize(&r, options)?.renamed(entity));
    }
    Ok(merge_inner(&left, &right, aligned.suffixes()))
}

fn normalization_failures(
    dropped: Vec<(String, crate::error::PipelineError)>,
    suffix: &str,
) -> impl Iterator<Item = EntityFailure> + '_ {
    dropped.into_iter().map(move |(entity, error)| EntityFailure {
        column: Some(format!("{entity}{suffix}")),
        entity,
        stage: Stage::Normalize,
        error,
    })
}

/// True when the two suffixes can tell the sources' columns apart.
pub fn suffixes_are_distinct(suffixes: &MergeSuffixes) -> bool {
    !suffixes.left.is_empty() && !suffixes.right.is_empty() && suffixes.left != suffixes.right
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TimeSeries, WideRow};
    use chrono::{Months, NaiveDate};

    fn monthly(name: &str, start_year: i32, n: u32) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap();
        TimeSeries::new(
            name,
            (0..n).map(|i| {
                let season = if i % 12 < 6 { 1.0 } else { -1.0 };
                (start + Months::new(i), Some(5.0 + season + f64::from(i) * 0.01))
            }),
        )
        .unwrap()
    }

    fn annual_wide(entities: &[&str], first: i32, last: i32) -> WideTable {
        WideTable {
            indicator_column: None,
            period_labels: (first..=last).map(|y| y.to_string()).collect(),
            rows: entities
                .iter()
                .map(|e| WideRow {
                    entity: e.to_string(),
                    indicator: None,
                    cells: (first..=last).map(|y| Some(f64::from(y - first))).collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn aligns_and_decomposes_shared_entities() {
        let unemp = EntityTable::from_series([monthly("Brazil", 2000, 48), monthly("Euro area", 2000, 48)]);
        let infl = annual_wide(&["Brazil", "Chile"], 1998, 2003);
        let out = run_pipeline(&unemp, &infl, &PipelineConfig::default()).unwrap();

        let aligned = &out.alignment.aligned;
        assert_eq!(aligned.entities().collect::<Vec<_>>(), vec!["Brazil"]);
        assert_eq!(aligned.len(), 48);

        let batch = out.batch.unwrap();
        assert_eq!(batch.period.period, 12);
        assert!(batch.result("Brazil_unemp").is_some());
        assert!(batch.result("Brazil_infl").is_some());
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn empty_intersection_skips_decomposition() {
        let unemp = EntityTable::from_series([monthly("Brazil", 2010, 24)]);
        let infl = annual_wide(&["Brazil"], 1980, 1985);
        let out = run_pipeline(&unemp, &infl, &PipelineConfig::default()).unwrap();
        assert!(out.alignment.aligned.is_empty());
        assert!(out.batch.is_none());
    }

    #[test]
    fn normalization_drops_are_reported_per_column() {
        let unemp = EntityTable::from_series([
            monthly("Brazil", 2000, 36),
            TimeSeries::new("Narnia", vec![(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), None)]).unwrap(),
        ]);
        let infl = annual_wide(&["Brazil", "Narnia"], 2000, 2002);
        let out = run_pipeline(&unemp, &infl, &PipelineConfig::default()).unwrap();

        let failures = out.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].column.as_deref(), Some("Narnia_unemp"));
        assert_eq!(failures[0].stage, Stage::Normalize);
        assert!(!out.alignment.aligned.contains("Narnia"));
    }

    #[test]
    fn single_entity_annual_decomposition() {
        let unemp = EntityTable::from_series([monthly("Brazil", 2000, 120), monthly("Chile", 2000, 120)]);
        let infl = annual_wide(&["Brazil", "Chile"], 2000, 2009);
        let alignment = align_sources(&unemp, &infl, &PipelineConfig::default()).unwrap();

        let report = decompose_entity(&alignment.aligned, "Brazil", true, &PipelineConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(report.period.period, 2);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results[0].dates.len(), 10);

        assert!(
            decompose_entity(&alignment.aligned, "Peru", false, &PipelineConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn suffix_check() {
        assert!(suffixes_are_distinct(&MergeSuffixes::default()));
        let same = MergeSuffixes {
            left: "_x".into(),
            right: "_x".into(),
        };
        assert!(!suffixes_are_distinct(&same));
    }
}
