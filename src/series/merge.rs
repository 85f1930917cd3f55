//! Inner-join alignment of two entity tables.
//!
//! The join keeps the dates present in both tables' indexes and the entities
//! present in both tables. Each surviving entity gets one column per source,
//! named `{entity}{suffix}`. Nothing is inferred for rows or entities unique to
//! one side: they are dropped.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{AlignedPair, AlignedTable, EntityTable, MergeSuffixes, TimeSeries};

/// Join `left` and `right` on shared dates and shared entity names.
///
/// An empty date intersection yields a table with zero rows, not an error.
pub fn merge_inner(left: &EntityTable, right: &EntityTable, suffixes: &MergeSuffixes) -> AlignedTable {
    let right_index: BTreeSet<NaiveDate> = right.index().into_iter().collect();
    let index: Vec<NaiveDate> = left
        .index()
        .into_iter()
        .filter(|d| right_index.contains(d))
        .collect();

    let mut entities = BTreeMap::new();
    for entity in left.entities() {
        let (Some(l), Some(r)) = (left.get(entity), right.get(entity)) else {
            log::debug!("`{entity}` only present in the left table; dropped.");
            continue;
        };
        entities.insert(
            entity.to_string(),
            AlignedPair {
                left: values_on(l, &index),
                right: values_on(r, &index),
            },
        );
    }

    let right_only = right.entities().filter(|e| !left.contains(e)).count();
    if right_only > 0 {
        log::debug!("{right_only} entities only present in the right table; dropped.");
    }

    if index.is_empty() {
        log::warn!("Merged tables share no dates; the aligned table is empty.");
    }
    log::info!(
        "Aligned {} shared dates across {} shared entities.",
        index.len(),
        entities.len()
    );

    AlignedTable::from_parts(index, suffixes.clone(), entities)
}

/// Rebuild an aligned table from a merged table whose entities are suffixed
/// column names (as written by `io::export::write_aligned_table_csv`).
///
/// Only entities with both suffixed columns are kept.
pub fn split_suffixed(merged: &EntityTable, suffixes: &MergeSuffixes) -> AlignedTable {
    let index = merged.index();
    let mut entities = BTreeMap::new();
    for column in merged.entities() {
        let Some(entity) = column.strip_suffix(suffixes.left.as_str()) else {
            continue;
        };
        let right_name = format!("{entity}{}", suffixes.right);
        let (Some(l), Some(r)) = (merged.get(column), merged.get(&right_name)) else {
            log::debug!("`{column}` has no matching `{right_name}` column; dropped.");
            continue;
        };
        entities.insert(
            entity.to_string(),
            AlignedPair {
                left: values_on(l, &index),
                right: values_on(r, &index),
            },
        );
    }
    AlignedTable::from_parts(index, suffixes.clone(), entities)
}

fn values_on(series: &TimeSeries, index: &[NaiveDate]) -> Vec<Option<f64>> {
    index.iter().map(|d| series.value_at(*d)).collect()
}
