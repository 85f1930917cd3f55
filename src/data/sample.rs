//! Deterministic synthetic datasets.
//!
//! Offline stand-ins for the two source tables, shaped like the real files:
//!
//! - monthly unemployment, `TIME_PERIOD` column plus one column per country,
//!   January 1991 through December 2020
//! - annual inflation, wide layout (`country_name`, `indicator_name`, one
//!   column per year 1970..=2020)
//!
//! Brazil's inflation row uses fixed historical-scale values (double-digit in
//! the 1970s, hyperinflation peaks above 1000% around 1990, single digits after
//! 2000). Everything else is drawn from a seeded `StdRng`, so the same seed
//! always produces the same files.
//!
//! Entity coverage deliberately differs between the two tables: `Euro area`
//! only has unemployment and `Chile` only has inflation.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use chrono::{Datelike, Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::source::DatasetSource;
use crate::domain::{EntityTable, TimeSeries, WideRow, WideTable};
use crate::error::AppError;
use crate::io::export::{write_dated_table_csv, write_wide_table_csv};

pub const UNEMPLOYMENT_DATE_COLUMN: &str = "TIME_PERIOD";
pub const CPI_INDICATOR: &str = "Annual average inflation (consumer prices) rate";
const CORE_INDICATOR: &str = "Core inflation rate";

pub const UNEMPLOYMENT_START_YEAR: i32 = 1991;
pub const UNEMPLOYMENT_END_YEAR: i32 = 2020;
pub const INFLATION_START_YEAR: i32 = 1970;
pub const INFLATION_END_YEAR: i32 = 2020;

/// Brazil, annual average CPI inflation (%), 1970..=2020.
pub const BRAZIL_INFLATION: [f64; 51] = [
    22.3, 20.2, 16.5, 15.7, 27.6, 29.0, 41.9, 43.7, 38.7, 52.7, // 1970s
    82.8, 105.6, 97.8, 142.1, 197.0, 226.0, 147.1, 228.3, 629.1, 1430.7, // 1980s
    2947.7, 432.8, 951.6, 1927.4, 2075.9, 66.0, 15.8, 6.9, 3.2, 4.9, // 1990s
    7.0, 6.8, 8.4, 14.7, 6.6, 6.9, 4.2, 3.6, 5.7, 4.9, // 2000s
    5.0, 6.6, 5.4, 6.2, 6.3, 9.0, 8.7, 3.4, 3.7, 3.7, // 2010s
    3.2,
];

/// Unemployment profile: (country, mean level %, seasonal amplitude).
const UNEMPLOYMENT_PROFILES: [(&str, f64, f64); 6] = [
    ("Argentina", 10.5, 0.6),
    ("Brazil", 9.5, 0.8),
    ("Euro area", 9.8, 0.3),
    ("Germany", 7.2, 0.4),
    ("Japan", 3.6, 0.15),
    ("United States", 5.9, 0.35),
];

/// Inflation profile: (country, mean level %, noise sd, first reported year).
const INFLATION_PROFILES: [(&str, f64, f64, i32); 5] = [
    ("Argentina", 35.0, 12.0, 1970),
    ("Chile", 12.0, 4.0, 1970),
    ("Germany", 2.4, 0.8, 1992),
    ("Japan", 1.2, 1.0, 1970),
    ("United States", 3.8, 1.2, 1970),
];

/// Which synthetic table a dataset name maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Unemployment,
    Inflation,
}

/// Dataset source writing synthetic tables into a directory.
#[derive(Debug, Clone)]
pub struct SampleDatasetSource {
    dir: PathBuf,
    seed: u64,
    datasets: BTreeMap<String, SampleKind>,
}

impl SampleDatasetSource {
    pub fn new(dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            dir: dir.into(),
            seed,
            datasets: BTreeMap::new(),
        }
    }

    /// Register a dataset name.
    pub fn with_dataset(mut self, name: impl Into<String>, kind: SampleKind) -> Self {
        self.datasets.insert(name.into(), kind);
        self
    }
}

impl DatasetSource for SampleDatasetSource {
    fn fetch(&self, name: &str) -> Result<PathBuf, AppError> {
        let kind = self.datasets.get(name).copied().ok_or_else(|| {
            AppError::new(
                2,
                format!("Unknown sample dataset '{name}'."),
            )
        })?;
        let path = self.dir.join(format!("{name}.csv"));
        match kind {
            SampleKind::Unemployment => {
                write_dated_table_csv(&path, &sample_unemployment(self.seed)?, UNEMPLOYMENT_DATE_COLUMN)?
            }
            SampleKind::Inflation => write_wide_table_csv(&path, &sample_inflation(self.seed)?, "country_name")?,
        }
        log::info!("Generated sample dataset '{name}' at '{}'.", path.display());
        Ok(path)
    }

    fn describe(&self) -> String {
        format!("sample:seed={}", self.seed)
    }
}

/// Monthly unemployment rates (%), one series per country.
///
/// Argentina only reports quarterly (January/April/July/October) before 2003;
/// the other months are gaps.
pub fn sample_unemployment(seed: u64) -> Result<EntityTable, AppError> {
    let mut rng = StdRng::seed_from_u64(sample_seed(seed, "unemployment"));
    let drift = normal(0.0, 0.08)?;
    let noise = normal(0.0, 0.12)?;

    let start = NaiveDate::from_ymd_opt(UNEMPLOYMENT_START_YEAR, 1, 1)
        .ok_or_else(|| AppError::new(2, "Invalid sample start year."))?;
    let n_months = ((UNEMPLOYMENT_END_YEAR - UNEMPLOYMENT_START_YEAR + 1) * 12) as u32;

    let mut table = EntityTable::new();
    for (country, level, amplitude) in UNEMPLOYMENT_PROFILES {
        let mut walk = 0.0;
        let mut points = Vec::with_capacity(n_months as usize);
        for i in 0..n_months {
            let Some(date) = start.checked_add_months(Months::new(i)) else {
                break;
            };
            // Mean-reverting walk keeps long-run levels recognisable.
            walk = 0.97 * walk + drift.sample(&mut rng);
            let season = amplitude * (2.0 * PI * f64::from(date.month0()) / 12.0).cos();
            let value = (level + 8.0 * walk + season + noise.sample(&mut rng)).max(0.5);

            let reported = !(country == "Argentina" && date.year() < 2003 && date.month0() % 3 != 0);
            points.push((date, reported.then_some(round2(value))));
        }
        table.insert(TimeSeries::new(country, points)?);
    }
    Ok(table)
}

/// Annual inflation (%) in the wide source layout.
///
/// The first indicator block is consumer-price inflation; a second
/// core-inflation block follows for a few countries.
pub fn sample_inflation(seed: u64) -> Result<WideTable, AppError> {
    let mut rng = StdRng::seed_from_u64(sample_seed(seed, "inflation"));
    let years: Vec<i32> = (INFLATION_START_YEAR..=INFLATION_END_YEAR).collect();

    let mut rows = vec![WideRow {
        entity: "Brazil".to_string(),
        indicator: Some(CPI_INDICATOR.to_string()),
        cells: BRAZIL_INFLATION.iter().map(|v| Some(*v)).collect(),
    }];

    for (country, level, sd, first_year) in INFLATION_PROFILES {
        let noise = normal(0.0, sd)?;
        let cells = years
            .iter()
            .map(|year| {
                // Draw for every year so gaps do not shift the stream.
                let value = (level + noise.sample(&mut rng)).max(-0.9);
                (*year >= first_year).then_some(round2(value))
            })
            .collect();
        rows.push(WideRow {
            entity: country.to_string(),
            indicator: Some(CPI_INDICATOR.to_string()),
            cells,
        });
    }

    let core = normal(0.0, 0.5)?;
    for country in ["Brazil", "United States"] {
        rows.push(WideRow {
            entity: country.to_string(),
            indicator: Some(CORE_INDICATOR.to_string()),
            cells: years.iter().map(|_| Some(round2(3.0 + core.sample(&mut rng)))).collect(),
        });
    }

    Ok(WideTable {
        indicator_column: Some("indicator_name".to_string()),
        period_labels: years.iter().map(|y| y.to_string()).collect(),
        rows,
    })
}

fn normal(mean: f64, sd: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(mean, sd).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))
}

fn sample_seed(seed: u64, dataset: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    dataset.hash(&mut hasher);
    hasher.finish()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unemployment_covers_1991_to_2020_monthly() {
        let table = sample_unemployment(7).unwrap();
        let index = table.index();
        assert_eq!(index.len(), 360);
        assert_eq!(index[0], NaiveDate::from_ymd_opt(1991, 1, 1).unwrap());
        assert_eq!(index[359], NaiveDate::from_ymd_opt(2020, 12, 1).unwrap());
        assert!(table.contains("Euro area"));
        assert!(!table.contains("Chile"));

        let argentina = table.get("Argentina").unwrap();
        assert_eq!(argentina.value_at(NaiveDate::from_ymd_opt(1995, 2, 1).unwrap()), None);
        assert!(argentina.value_at(NaiveDate::from_ymd_opt(1995, 4, 1).unwrap()).is_some());
    }

    #[test]
    fn inflation_matches_source_layout() {
        let wide = sample_inflation(7).unwrap();
        assert_eq!(wide.period_labels.first().map(String::as_str), Some("1970"));
        assert_eq!(wide.period_labels.len(), 51);
        assert_eq!(wide.rows[0].entity, "Brazil");
        assert_eq!(wide.rows[0].indicator.as_deref(), Some(CPI_INDICATOR));

        let brazil = &wide.rows[0].cells;
        assert!(brazil[..10].iter().flatten().all(|v| (15.0..=100.0).contains(v)));
        assert!(brazil[10..30].iter().flatten().any(|v| *v > 1000.0));
        assert!(brazil[30..].iter().flatten().all(|v| *v < 20.0));
        assert!(wide.rows.iter().any(|r| r.indicator.as_deref() == Some(CORE_INDICATOR)));
    }

    #[test]
    fn same_seed_same_data() {
        assert_eq!(sample_unemployment(42).unwrap(), sample_unemployment(42).unwrap());
        assert_eq!(sample_inflation(42).unwrap(), sample_inflation(42).unwrap());
        assert_ne!(sample_unemployment(1).unwrap(), sample_unemployment(2).unwrap());
    }

    #[test]
    fn source_writes_registered_datasets_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = SampleDatasetSource::new(dir.path(), 3)
            .with_dataset("unemployment_rates", SampleKind::Unemployment)
            .with_dataset("global_inflation_data", SampleKind::Inflation);

        let unemp = source.fetch("unemployment_rates").unwrap();
        let text = std::fs::read_to_string(unemp).unwrap();
        assert!(text.starts_with("TIME_PERIOD,Argentina,Brazil"));

        let infl = source.fetch("global_inflation_data").unwrap();
        let text = std::fs::read_to_string(infl).unwrap();
        assert!(text.starts_with("country_name,indicator_name,1970"));

        assert!(source.fetch("other").is_err());
    }
}
