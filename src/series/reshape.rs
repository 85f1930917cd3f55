//! Wide-to-entity reshaping (melt -> typed dates -> pivot).
//!
//! Source tables such as the global inflation dataset carry one row per
//! country (and indicator) and one column per year. Reshaping turns that into
//! one [`TimeSeries`] per entity:
//!
//! 1. keep only the first indicator encountered (when the table has an
//!    indicator column) and drop the column
//! 2. parse each period label into a date
//! 3. pivot to one series per entity
//!
//! Duplicate entities follow [`DuplicatePolicy`]: later cells override earlier
//! ones, or the reshape fails.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{DuplicatePolicy, EntityTable, LongRecord, LongTable, PeriodLabelFormat, TimeSeries, WideTable};
use crate::error::{PipelineError, PipelineResult};

/// Parse one period label.
pub fn parse_period_label(label: &str, format: PeriodLabelFormat) -> PipelineResult<NaiveDate> {
    let trimmed = label.trim();
    let malformed = || PipelineError::MalformedPeriodLabel {
        label: label.to_string(),
        expected: format.description(),
    };

    match format {
        PeriodLabelFormat::Year => {
            if trimmed.len() != 4 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            let year: i32 = trimmed.parse().map_err(|_| malformed())?;
            NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(malformed)
        }
        PeriodLabelFormat::YearMonth => {
            NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").map_err(|_| malformed())
        }
        PeriodLabelFormat::IsoDate => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| malformed()),
    }
}

/// Select the indicator rows, parse period labels, and melt to long records.
pub fn melt(wide: &WideTable, format: PeriodLabelFormat) -> PipelineResult<LongTable> {
    let (indicator, rows): (String, Vec<_>) = match &wide.indicator_column {
        Some(_) => {
            let selected = wide.rows.first().and_then(|r| r.indicator.clone());
            let Some(selected) = selected else {
                return Err(PipelineError::EmptyIndicator {
                    indicator: "<none>".to_string(),
                });
            };
            let rows = wide
                .rows
                .iter()
                .filter(|r| r.indicator.as_deref() == Some(selected.as_str()))
                .collect();
            (selected, rows)
        }
        None => ("<all rows>".to_string(), wide.rows.iter().collect()),
    };

    if rows.is_empty() {
        return Err(PipelineError::EmptyIndicator { indicator });
    }

    let dates = wide
        .period_labels
        .iter()
        .map(|label| parse_period_label(label, format))
        .collect::<PipelineResult<Vec<_>>>()?;

    let distinct: BTreeSet<&str> = wide.rows.iter().filter_map(|r| r.indicator.as_deref()).collect();
    if distinct.len() > 1 {
        log::info!(
            "Selected indicator `{indicator}` ({} of {} rows; {} indicators present).",
            rows.len(),
            wide.rows.len(),
            distinct.len()
        );
    }

    let records = rows
        .iter()
        .flat_map(|row| {
            dates.iter().enumerate().map(move |(i, date)| LongRecord {
                entity: row.entity.clone(),
                date: *date,
                value: row.cells.get(i).copied().flatten(),
            })
        })
        .collect();

    Ok(LongTable { records })
}

/// Pivot long records into one series per entity.
pub fn pivot(long: &LongTable, policy: DuplicatePolicy) -> PipelineResult<EntityTable> {
    let mut grouped: BTreeMap<&str, BTreeMap<NaiveDate, Option<f64>>> = BTreeMap::new();
    let mut overridden: BTreeSet<&str> = BTreeSet::new();

    for record in &long.records {
        let cells = grouped.entry(record.entity.as_str()).or_default();
        if cells.insert(record.date, record.value).is_some() {
            match policy {
                DuplicatePolicy::Reject => {
                    return Err(PipelineError::DuplicateEntity {
                        entity: record.entity.clone(),
                    });
                }
                DuplicatePolicy::OverrideLast => {
                    overridden.insert(record.entity.as_str());
                }
            }
        }
    }

    for entity in &overridden {
        log::warn!("Entity `{entity}` appears more than once; later values override earlier ones.");
    }

    let series = grouped
        .into_iter()
        .map(|(entity, cells)| TimeSeries::new(entity, cells))
        .collect::<PipelineResult<Vec<_>>>()?;

    Ok(EntityTable::from_series(series))
}

/// `pivot(melt(wide))`.
pub fn reshape(wide: &WideTable, format: PeriodLabelFormat, policy: DuplicatePolicy) -> PipelineResult<EntityTable> {
    let long = melt(wide, format)?;
    let table = pivot(&long, policy)?;
    log::info!(
        "Reshaped {} rows x {} periods into {} entities.",
        wide.rows.len(),
        wide.period_labels.len(),
        table.len()
    );
    Ok(table)
}
