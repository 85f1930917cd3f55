//! Read/write the decomposition report JSON.
//!
//! The report is the portable record of one run:
//! - the period choice applied to the merged index
//! - per-series decomposition results (all four components)
//! - entities/columns that were skipped, with the reason
//!
//! The file is self-describing (`tool`, `generated_at`) so it can be compared
//! across runs.

use std::fs::File;
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decompose::{BatchReport, EntityFailure, Stage};
use crate::domain::{DecompositionResult, MergeSuffixes, PeriodChoice};
use crate::error::AppError;
use crate::io::export::ensure_parent_dir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub generated_at: NaiveDateTime,
    pub suffixes: MergeSuffixes,
    pub period: PeriodChoice,
    pub results: Vec<DecompositionResult>,
    pub failures: Vec<FailureRecord>,
}

/// Serializable form of `decompose::EntityFailure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub entity: String,
    pub column: Option<String>,
    pub stage: Stage,
    pub error: String,
}

impl ReportFile {
    /// Build the report for `report`.
    ///
    /// `failures` lists every skipped column of the run, including the ones
    /// dropped before decomposition (normalization).
    pub fn from_batch(report: &BatchReport, failures: &[&EntityFailure], suffixes: &MergeSuffixes) -> Self {
        Self {
            tool: "macro-align".to_string(),
            generated_at: Utc::now().naive_utc(),
            suffixes: suffixes.clone(),
            period: report.period,
            results: report.results.clone(),
            failures: failures
                .iter()
                .map(|f| FailureRecord {
                    entity: f.entity.clone(),
                    column: f.column.clone(),
                    stage: f.stage,
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Write a report JSON file.
pub fn write_report_json(path: &Path, report: &ReportFile) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;
    log::info!("Wrote '{}'.", path.display());
    Ok(())
}

/// Read a report JSON file.
pub fn read_report_json(path: &Path) -> Result<ReportFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open report JSON '{}': {e}", path.display())))?;
    let report: ReportFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid report JSON: {e}")))?;
    Ok(report)
}
