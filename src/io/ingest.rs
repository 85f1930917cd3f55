//! CSV ingest.
//!
//! Two layouts are read:
//!
//! - **dated tables**: one parsed date column plus one numeric column per
//!   entity (the monthly unemployment dataset, or a merged table written by
//!   this tool). Produces an [`EntityTable`].
//! - **wide tables**: one row per entity (and optional indicator), one column
//!   per period label (the annual inflation dataset). Produces a [`WideTable`]
//!   for `series::reshape`.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **No analysis here**: cells that do not parse are gaps, not errors

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{EntityTable, TimeSeries, WideRow, WideTable};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the table plus what was skipped.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub table: T,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Column roles for a wide table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideLayout {
    pub entity_column: String,
    /// Indicator column; `None` when the file carries a single series per entity.
    pub indicator_column: Option<String>,
}

impl Default for WideLayout {
    fn default() -> Self {
        Self {
            entity_column: "country_name".to_string(),
            indicator_column: Some("indicator_name".to_string()),
        }
    }
}

/// Read a table with one date column and one value column per entity.
pub fn read_dated_table(path: &Path, date_column: &str) -> Result<Ingested<EntityTable>, AppError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);

    let date_idx = *header_map
        .get(&normalize_header_name(date_column))
        .ok_or_else(|| missing_column(path, date_column))?;

    let entity_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != date_idx)
        .map(|(idx, name)| (idx, clean_header(name)))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let raw_date = record.get(date_idx).map(str::trim).unwrap_or("");
        let date = match parse_date(raw_date) {
            Ok(d) => d,
            Err(message) => {
                row_errors.push(RowError { line, message });
                continue;
            }
        };

        let values = entity_columns
            .iter()
            .map(|(col, _)| parse_opt_f64(record.get(*col)))
            .collect();
        if rows.insert(date, values).is_some() {
            row_errors.push(RowError {
                line,
                message: format!("Duplicate date {date}; later row kept."),
            });
        }
    }

    let rows_used = rows.len();
    if rows_used == 0 {
        return Err(AppError::new(
            2,
            format!("No dated rows could be read from '{}'.", path.display()),
        ));
    }

    let mut table = EntityTable::new();
    for (pos, (_, name)) in entity_columns.iter().enumerate() {
        let points = rows.iter().map(|(date, values)| (*date, values[pos]));
        table.insert(TimeSeries::new(name.as_str(), points)?);
    }

    log::info!(
        "Read '{}': {} dated rows, {} entities ({} rows skipped).",
        path.display(),
        rows_used,
        table.len(),
        row_errors.len()
    );

    Ok(Ingested {
        table,
        row_errors,
        rows_read,
        rows_used,
    })
}

/// Read a wide table: entity (+ optional indicator) columns, then period labels.
///
/// Every column other than the entity and indicator columns is a period label;
/// labels are parsed later by `series::reshape`.
pub fn read_wide_table(path: &Path, layout: &WideLayout) -> Result<Ingested<WideTable>, AppError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let header_map = build_header_map(&headers);

    let entity_idx = *header_map
        .get(&normalize_header_name(&layout.entity_column))
        .ok_or_else(|| missing_column(path, &layout.entity_column))?;

    let indicator_idx = match &layout.indicator_column {
        Some(name) => Some(
            *header_map
                .get(&normalize_header_name(name))
                .ok_or_else(|| missing_column(path, name))?,
        ),
        None => None,
    };

    let period_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != entity_idx && Some(*idx) != indicator_idx)
        .map(|(idx, name)| (idx, clean_header(name)))
        .collect();

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let Some(entity) = get_optional(&record, entity_idx) else {
            row_errors.push(RowError {
                line,
                message: format!("Missing `{}` value.", layout.entity_column),
            });
            continue;
        };

        rows.push(WideRow {
            entity: entity.to_string(),
            indicator: indicator_idx.and_then(|i| get_optional(&record, i)).map(str::to_string),
            cells: period_columns
                .iter()
                .map(|(col, _)| parse_opt_f64(record.get(*col)))
                .collect(),
        });
    }

    let rows_used = rows.len();
    log::info!(
        "Read '{}': {} rows x {} period columns ({} rows skipped).",
        path.display(),
        rows_used,
        period_columns.len(),
        row_errors.len()
    );

    Ok(Ingested {
        table: WideTable {
            indicator_column: layout.indicator_column.clone(),
            period_labels: period_columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        },
        row_errors,
        rows_read,
        rows_used,
    })
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file))
}

fn read_headers(reader: &mut csv::Reader<File>, path: &Path) -> Result<StringRecord, AppError> {
    reader
        .headers()
        .map(Clone::clone)
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers from '{}': {e}", path.display())))
}

fn missing_column(path: &Path, name: &str) -> AppError {
    AppError::new(
        2,
        format!("Missing required column `{name}` in '{}'.", path.display()),
    )
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn clean_header(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report missing columns.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

fn normalize_header_name(name: &str) -> String {
    clean_header(name).to_ascii_lowercase()
}

fn get_optional(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a date cell. Accepts ISO dates, ISO timestamps, `YYYY-MM` and `YYYY`.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
    let s = s.trim();
    // Timestamps such as `1991-01-01 00:00:00` or `1991-01-01T00:00:00`.
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(date_part, fmt) {
            return Ok(d);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{date_part}-01"), "%Y-%m-%d") {
        return Ok(d);
    }
    if date_part.len() == 4 {
        if let Some(d) = date_part.parse::<i32>().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, DD/MM/YYYY, YYYY/MM/DD, YYYY-MM, YYYY."
    ))
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
