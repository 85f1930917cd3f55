//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed between pipeline stages without copying through intermediate formats
//! - exported to JSON/CSV
//! - rebuilt from exported CSV for follow-up runs (`macro-align decompose`)

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Sampling cadence of a time index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Annual,
    Monthly,
    /// Irregular or too short to classify.
    Unknown,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Frequency::Annual => "annual",
            Frequency::Monthly => "monthly",
            Frequency::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Calendar step used when normalizing a series onto a regular grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// First day of every month.
    MonthStart,
    /// January 1st of every year.
    YearStart,
}

/// How period-label column headers are parsed into dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodLabelFormat {
    /// `YYYY`, interpreted as January 1st.
    Year,
    /// `YYYY-MM`, interpreted as the first of the month.
    YearMonth,
    /// `YYYY-MM-DD`.
    IsoDate,
}

impl PeriodLabelFormat {
    pub fn description(self) -> &'static str {
        match self {
            PeriodLabelFormat::Year => "4-digit year",
            PeriodLabelFormat::YearMonth => "YYYY-MM",
            PeriodLabelFormat::IsoDate => "YYYY-MM-DD",
        }
    }
}

/// What to do when the same entity appears more than once while reshaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Later rows replace earlier ones cell by cell (a warning is logged).
    OverrideLast,
    /// Fail with `DuplicateEntity`.
    Reject,
}

/// What to do when one entity fails during a batch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure for that entity and keep processing the others.
    SkipAndContinue,
    /// Stop the run at the first failing entity.
    Abort,
}

/// A time series: strictly increasing dates with optional values.
///
/// The name identifies the series in error messages and exports (an entity
/// name such as `Brazil`, or a merged column such as `Brazil_infl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    name: String,
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    /// Build a series from `(date, value)` points already in date order.
    pub fn new(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, Option<f64>)>,
    ) -> PipelineResult<Self> {
        let name = name.into();
        let (dates, values): (Vec<_>, Vec<_>) = points.into_iter().unzip();
        check_strictly_increasing(&name, &dates)?;
        Ok(Self { name, dates, values })
    }

    /// Build a fully-populated series from parallel date/value slices.
    pub fn from_dense(name: impl Into<String>, dates: &[NaiveDate], values: &[f64]) -> PipelineResult<Self> {
        Self::new(
            name,
            dates.iter().copied().zip(values.iter().map(|v| Some(*v))),
        )
    }

    /// Construct from parts whose ordering the caller already guarantees.
    pub(crate) fn from_parts(name: String, dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        Self { name, dates, values }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    /// Points with a finite value.
    pub fn known_points(&self) -> Vec<(NaiveDate, f64)> {
        self.iter()
            .filter_map(|(d, v)| v.filter(|x| x.is_finite()).map(|x| (d, x)))
            .collect()
    }

    /// Value at `date`, if the date is in the index and the value is present.
    pub fn value_at(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.dates.binary_search(&date).ok()?;
        self.values[idx]
    }

    /// Largest finite value, ignoring missing entries.
    pub fn max_finite(&self) -> Option<f64> {
        self.values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
    }

    /// First date whose value is missing or non-finite.
    pub fn first_gap(&self) -> Option<NaiveDate> {
        self.iter()
            .find(|(_, v)| !v.is_some_and(f64::is_finite))
            .map(|(d, _)| d)
    }

    /// Rename the series, keeping its data.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Derive a new series by mapping each present value.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            name: self.name.clone(),
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| v.map(&f)).collect(),
        }
    }
}

fn check_strictly_increasing(name: &str, dates: &[NaiveDate]) -> PipelineResult<()> {
    for w in dates.windows(2) {
        if w[1] <= w[0] {
            return Err(PipelineError::UnorderedTimestamps {
                series: name.to_string(),
                previous: w[0],
                date: w[1],
            });
        }
    }
    Ok(())
}

/// Entity name -> series, ordered by entity name.
///
/// The table's index is the union of its series' dates; a date where an
/// entity has no observation is a gap, not an absent entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityTable {
    series: BTreeMap<String, TimeSeries>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from series, keyed by each series' name.
    pub fn from_series(series: impl IntoIterator<Item = TimeSeries>) -> Self {
        let mut table = Self::new();
        for s in series {
            table.insert(s);
        }
        table
    }

    /// Insert a series under its name, returning any series it replaced.
    pub fn insert(&mut self, series: TimeSeries) -> Option<TimeSeries> {
        self.series.insert(series.name().to_string(), series)
    }

    pub fn get(&self, entity: &str) -> Option<&TimeSeries> {
        self.series.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.series.contains_key(entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn series(&self) -> impl Iterator<Item = &TimeSeries> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Sorted union of all series' dates.
    pub fn index(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|s| s.dates().iter().copied())
            .collect();
        dates.into_iter().collect()
    }

    /// Flatten to `(entity, date, value)` records, ordered by entity then date.
    #[cfg(test)]
    pub(crate) fn to_long(&self) -> LongTable {
        let records = self
            .series
            .values()
            .flat_map(|s| {
                s.iter().map(move |(date, value)| LongRecord {
                    entity: s.name().to_string(),
                    date,
                    value,
                })
            })
            .collect();
        LongTable { records }
    }

    /// Lay the table out wide: one row per entity, one column per index date.
    pub fn to_wide(&self, format: PeriodLabelFormat) -> WideTable {
        let index = self.index();
        let period_labels = index.iter().map(|d| format_period_label(*d, format)).collect();
        let rows = self
            .series
            .values()
            .map(|s| WideRow {
                entity: s.name().to_string(),
                indicator: None,
                cells: index.iter().map(|d| s.value_at(*d)).collect(),
            })
            .collect();
        WideTable {
            indicator_column: None,
            period_labels,
            rows,
        }
    }
}

/// Render a date as a period label in the given format.
pub fn format_period_label(date: NaiveDate, format: PeriodLabelFormat) -> String {
    match format {
        PeriodLabelFormat::Year => date.format("%Y").to_string(),
        PeriodLabelFormat::YearMonth => date.format("%Y-%m").to_string(),
        PeriodLabelFormat::IsoDate => date.format("%Y-%m-%d").to_string(),
    }
}

/// A wide table as read from disk: one row per entity (and indicator), one
/// column per period label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideTable {
    /// Name of the indicator column, when the source carries one.
    pub indicator_column: Option<String>,
    pub period_labels: Vec<String>,
    pub rows: Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideRow {
    pub entity: String,
    pub indicator: Option<String>,
    /// One cell per period label (missing or non-numeric cells are `None`).
    pub cells: Vec<Option<f64>>,
}

/// Melted form of a wide table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LongTable {
    pub records: Vec<LongRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub entity: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Per-source suffixes appended to entity names in a merged table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSuffixes {
    pub left: String,
    pub right: String,
}

impl Default for MergeSuffixes {
    fn default() -> Self {
        Self {
            left: "_unemp".to_string(),
            right: "_infl".to_string(),
        }
    }
}

/// The two value columns of one entity in an [`AlignedTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub left: Vec<Option<f64>>,
    pub right: Vec<Option<f64>>,
}

/// Two entity tables joined on their shared dates and shared entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedTable {
    index: Vec<NaiveDate>,
    suffixes: MergeSuffixes,
    entities: BTreeMap<String, AlignedPair>,
}

impl AlignedTable {
    /// Assemble a table; every pair must have one value per index date.
    pub(crate) fn from_parts(
        index: Vec<NaiveDate>,
        suffixes: MergeSuffixes,
        entities: BTreeMap<String, AlignedPair>,
    ) -> Self {
        debug_assert!(
            entities
                .values()
                .all(|p| p.left.len() == index.len() && p.right.len() == index.len())
        );
        Self {
            index,
            suffixes,
            entities,
        }
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn suffixes(&self) -> &MergeSuffixes {
        &self.suffixes
    }

    /// Number of rows (shared dates).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when the date intersection was empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    /// A table restricted to the named entities (unknown names are ignored).
    pub fn subset<'a>(&self, entities: impl IntoIterator<Item = &'a str>) -> AlignedTable {
        let entities = entities
            .into_iter()
            .filter_map(|e| self.entities.get(e).map(|pair| (e.to_string(), pair.clone())))
            .collect();
        Self::from_parts(self.index.clone(), self.suffixes.clone(), entities)
    }

    /// The entity's two columns as named series (`{entity}{suffix}`).
    pub fn pair(&self, entity: &str) -> Option<(TimeSeries, TimeSeries)> {
        let pair = self.entities.get(entity)?;
        Some((
            self.column_series(entity, &self.suffixes.left, &pair.left),
            self.column_series(entity, &self.suffixes.right, &pair.right),
        ))
    }

    /// All columns in entity order, left column before right.
    pub fn columns(&self) -> Vec<TimeSeries> {
        self.entities
            .iter()
            .flat_map(|(entity, pair)| {
                [
                    self.column_series(entity, &self.suffixes.left, &pair.left),
                    self.column_series(entity, &self.suffixes.right, &pair.right),
                ]
            })
            .collect()
    }

    /// Columns of one source, selected by suffix.
    pub fn columns_with_suffix(&self, suffix: &str) -> Vec<TimeSeries> {
        self.columns()
            .into_iter()
            .filter(|s| s.name().ends_with(suffix))
            .collect()
    }

    fn column_series(&self, entity: &str, suffix: &str, values: &[Option<f64>]) -> TimeSeries {
        TimeSeries::from_parts(format!("{entity}{suffix}"), self.index.clone(), values.to_vec())
    }
}

/// Decomposition period chosen for an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodChoice {
    pub frequency: Frequency,
    pub period: usize,
    /// The frequency was not recognised and the fallback period was used.
    pub low_confidence: bool,
}

/// Trend/seasonal/residual decomposition of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompositionResult {
    pub series: String,
    pub dates: Vec<NaiveDate>,
    /// Values actually decomposed (after gap filling and any log transform).
    pub observed: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    pub period: usize,
    pub frequency: Frequency,
    pub low_confidence: bool,
    /// Whether `log(1+x)` was applied before decomposing.
    pub transformed: bool,
}

/// Decomposition-period mapping per detected frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodPolicy {
    pub annual: usize,
    pub monthly: usize,
    /// Used for `Frequency::Unknown`; results are flagged low-confidence.
    pub fallback: usize,
}

impl Default for PeriodPolicy {
    fn default() -> Self {
        Self {
            annual: 2,
            monthly: 12,
            fallback: 2,
        }
    }
}

/// Everything the pure pipeline needs to know.
///
/// Derived from CLI flags (plus defaults); see `app::pipeline_config_from_args`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Grid both tables are normalized onto before merging.
    pub step: Step,
    /// Extend coarser inputs to the last step of their final period.
    pub cover_final_period: bool,
    pub label_format: PeriodLabelFormat,
    pub duplicate_policy: DuplicatePolicy,
    pub failure_policy: FailurePolicy,
    pub suffixes: MergeSuffixes,
    /// Variance-stabilizer cutoff (see `decompose::stabilize`).
    pub threshold: f64,
    pub period_policy: PeriodPolicy,
    /// Explicit period; bypasses frequency-based inference when set.
    pub period_override: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step: Step::MonthStart,
            cover_final_period: true,
            label_format: PeriodLabelFormat::Year,
            duplicate_policy: DuplicatePolicy::OverrideLast,
            failure_policy: FailurePolicy::SkipAndContinue,
            suffixes: MergeSuffixes::default(),
            threshold: crate::decompose::GENERAL_MERGE_THRESHOLD,
            period_policy: PeriodPolicy::default(),
            period_override: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    #[test]
    fn series_rejects_out_of_order_dates() {
        let err = TimeSeries::new("x", vec![(d(2000, 2), Some(1.0)), (d(2000, 1), Some(2.0))]).unwrap_err();
        assert!(matches!(err, PipelineError::UnorderedTimestamps { .. }));

        let err = TimeSeries::new("x", vec![(d(2000, 1), Some(1.0)), (d(2000, 1), Some(2.0))]).unwrap_err();
        assert!(matches!(err, PipelineError::UnorderedTimestamps { .. }));
    }

    #[test]
    fn max_finite_ignores_gaps_and_nan() {
        let s = TimeSeries::new(
            "x",
            vec![
                (d(2000, 1), Some(3.0)),
                (d(2000, 2), None),
                (d(2000, 3), Some(f64::NAN)),
                (d(2000, 4), Some(7.5)),
            ],
        )
        .unwrap();
        assert_eq!(s.max_finite(), Some(7.5));
        assert_eq!(s.first_gap(), Some(d(2000, 2)));
        assert_eq!(s.known_points().len(), 2);
    }

    #[test]
    fn entity_table_index_is_union_of_dates() {
        let a = TimeSeries::new("A", vec![(d(2000, 1), Some(1.0)), (d(2000, 3), Some(1.0))]).unwrap();
        let b = TimeSeries::new("B", vec![(d(2000, 2), None)]).unwrap();
        let table = EntityTable::from_series([a, b]);
        assert_eq!(table.index(), vec![d(2000, 1), d(2000, 2), d(2000, 3)]);
        assert_eq!(table.entities().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn to_wide_uses_requested_label_format() {
        let a = TimeSeries::new("A", vec![(d(1999, 1), Some(1.0)), (d(2000, 1), Some(2.0))]).unwrap();
        let wide = EntityTable::from_series([a]).to_wide(PeriodLabelFormat::Year);
        assert_eq!(wide.period_labels, vec!["1999", "2000"]);
        assert_eq!(wide.rows[0].cells, vec![Some(1.0), Some(2.0)]);
    }
}
