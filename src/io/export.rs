//! Export tables and decomposition results to CSV.
//!
//! Every dated export writes the time column first (named `DATE` unless the
//! caller asks otherwise), so files can be read back with
//! `io::ingest::read_dated_table(path, "DATE")`. Missing values
//! are written as empty cells. Parent directories are created as needed.

use std::fs::{self, File};
use std::path::Path;

use chrono::NaiveDate;

use crate::domain::{AlignedTable, DecompositionResult, EntityTable, PeriodLabelFormat, TimeSeries, WideTable};
use crate::error::AppError;

/// Name of the time column in every exported table.
pub const DATE_COLUMN: &str = "DATE";

/// Write an entity table: `DATE` then one column per entity.
pub fn write_entity_table_csv(path: &Path, table: &EntityTable) -> Result<(), AppError> {
    write_dated_table_csv(path, table, DATE_COLUMN)
}

/// Write an entity table with a custom name for the time column.
pub fn write_dated_table_csv(path: &Path, table: &EntityTable, date_column: &str) -> Result<(), AppError> {
    let columns: Vec<&TimeSeries> = table.series().collect();
    write_columns(path, date_column, &table.index(), &columns)
}

/// Write an aligned table: `DATE` then `{entity}{suffix}` columns, left first.
pub fn write_aligned_table_csv(path: &Path, aligned: &AlignedTable) -> Result<(), AppError> {
    let columns = aligned.columns();
    let refs: Vec<&TimeSeries> = columns.iter().collect();
    write_columns(path, DATE_COLUMN, aligned.index(), &refs)
}

/// Write a wide table: the entity column, the indicator column (when the
/// table has one), then one column per period label.
pub fn write_wide_table_csv(
    path: &Path,
    wide: &WideTable,
    entity_column: &str,
) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;

    let mut header = vec![entity_column.to_string()];
    header.extend(wide.indicator_column.iter().cloned());
    header.extend(wide.period_labels.iter().cloned());
    writer.write_record(&header).map_err(|e| write_error(path, e))?;

    for row in &wide.rows {
        let mut record = vec![row.entity.clone()];
        if wide.indicator_column.is_some() {
            record.push(row.indicator.clone().unwrap_or_default());
        }
        record.extend(row.cells.iter().map(|v| format_cell(*v)));
        writer.write_record(&record).map_err(|e| write_error(path, e))?;
    }

    finish(path, writer)
}

/// Convenience: lay out `table` wide with `format` labels and write it.
pub fn write_entity_table_wide_csv(
    path: &Path,
    table: &EntityTable,
    format: PeriodLabelFormat,
    entity_column: &str,
) -> Result<(), AppError> {
    write_wide_table_csv(path, &table.to_wide(format), entity_column)
}

/// Write decomposition results in long form, one row per series and date.
///
/// Columns: `series,DATE,observed,trend,seasonal,residual,period,transformed`.
pub fn write_decomposition_csv(path: &Path, results: &[DecompositionResult]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;
    writer
        .write_record([
            "series",
            DATE_COLUMN,
            "observed",
            "trend",
            "seasonal",
            "residual",
            "period",
            "transformed",
        ])
        .map_err(|e| write_error(path, e))?;

    for r in results {
        for i in 0..r.dates.len() {
            writer
                .write_record([
                    r.series.clone(),
                    r.dates[i].to_string(),
                    format!("{:.10}", r.observed[i]),
                    format!("{:.10}", r.trend[i]),
                    format!("{:.10}", r.seasonal[i]),
                    format!("{:.10}", r.residual[i]),
                    r.period.to_string(),
                    r.transformed.to_string(),
                ])
                .map_err(|e| write_error(path, e))?;
        }
    }

    finish(path, writer)
}

fn write_columns(
    path: &Path,
    date_column: &str,
    index: &[NaiveDate],
    columns: &[&TimeSeries],
) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;

    let mut header = vec![date_column.to_string()];
    header.extend(columns.iter().map(|s| s.name().to_string()));
    writer.write_record(&header).map_err(|e| write_error(path, e))?;

    for date in index {
        let mut record = vec![date.to_string()];
        record.extend(columns.iter().map(|s| format_cell(s.value_at(*date))));
        writer.write_record(&record).map_err(|e| write_error(path, e))?;
    }

    log::info!(
        "Wrote '{}' ({} rows x {} columns).",
        path.display(),
        index.len(),
        columns.len()
    );
    finish(path, writer)
}

fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to create output directory '{}': {e}", parent.display()),
            )
        })?;
    }
    Ok(())
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    Ok(csv::Writer::from_writer(file))
}

fn finish(path: &Path, mut writer: csv::Writer<File>) -> Result<(), AppError> {
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV '{}': {e}", path.display())))
}

fn write_error(path: &Path, e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write export CSV '{}': {e}", path.display()))
}
