//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::app::pipeline::{Alignment, RunOutput};
use crate::decompose::{BatchReport, EntityFailure};
use crate::domain::{EntityTable, PipelineConfig};
use crate::report::component_stats;

/// Format the run header plus the alignment and decomposition sections.
pub fn format_run_summary(run: &RunOutput, config: &PipelineConfig, source: &str) -> String {
    let mut out = String::new();

    out.push_str("=== macro-align - unemployment/inflation alignment ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Grid: {:?} | suffixes: {} / {} | threshold: {}\n",
        config.step, config.suffixes.left, config.suffixes.right, config.threshold
    ));
    out.push('\n');
    out.push_str(&format_alignment(&run.alignment));

    match &run.batch {
        Some(batch) => {
            out.push('\n');
            out.push_str(&format_decomposition(batch));
        }
        None => out.push_str("\nDecomposition: skipped (no shared dates)\n"),
    }

    let failures = run.failures();
    if !failures.is_empty() {
        out.push('\n');
        out.push_str(&format_failures(&failures));
    }

    out
}

/// Format the table shapes before and after the merge.
pub fn format_alignment(alignment: &Alignment) -> String {
    let mut out = String::new();
    out.push_str("Tables:\n");
    out.push_str(&format_table_line("unemployment", &alignment.unemployment_normalized));
    out.push_str(&format_table_line("inflation (annual)", &alignment.inflation));
    out.push_str(&format_table_line("inflation (grid)", &alignment.inflation_normalized));

    let aligned = &alignment.aligned;
    match (aligned.index().first(), aligned.index().last()) {
        (Some(first), Some(last)) => out.push_str(&format!(
            "  {:<20} entities={:<4} rows={:<5} [{first} .. {last}]\n",
            "merged",
            aligned.entity_count(),
            aligned.len(),
        )),
        _ => out.push_str(&format!(
            "  {:<20} entities={:<4} rows=0\n",
            "merged",
            aligned.entity_count()
        )),
    }
    out
}

fn format_table_line(label: &str, table: &EntityTable) -> String {
    let index = table.index();
    match (index.first(), index.last()) {
        (Some(first), Some(last)) => format!(
            "  {label:<20} entities={:<4} rows={:<5} [{first} .. {last}]\n",
            table.len(),
            index.len()
        ),
        _ => format!("  {label:<20} entities={:<4} rows=0\n", table.len()),
    }
}

/// Format one line of component statistics per decomposed series.
pub fn format_decomposition(batch: &BatchReport) -> String {
    let mut out = String::new();
    let confidence = if batch.period.low_confidence { " (low confidence)" } else { "" };
    out.push_str(&format!(
        "Decomposition: frequency={} period={}{confidence}\n",
        batch.period.frequency, batch.period.period
    ));

    out.push_str(
        format!(
            "{:<28} {:>5} {:>6} {:>12} {:>12} {:>10} {:>10} {:>9}\n",
            "series", "n", "log1p", "trend_start", "trend_end", "seasonal", "resid_sd", "strength"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<28} {:-<5} {:-<6} {:-<12} {:-<12} {:-<10} {:-<10} {:-<9}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for result in &batch.results {
        let s = component_stats(result);
        out.push_str(&format!(
            "{:<28} {:>5} {:>6} {:>12.4} {:>12.4} {:>10.4} {:>10.4} {:>9.2}\n",
            truncate(&s.series, 28),
            s.n,
            if s.transformed { "yes" } else { "no" },
            s.trend_start,
            s.trend_end,
            s.seasonal_range,
            s.residual_sd,
            s.seasonal_strength,
        ));
    }
    out
}

/// Format the skipped entities/columns.
pub fn format_failures(failures: &[&EntityFailure]) -> String {
    let mut out = format!("Skipped ({}):\n", failures.len());
    for f in failures {
        out.push_str(&format!(
            "  [{:?}] {}: {}\n",
            f.stage,
            f.column.as_deref().unwrap_or(&f.entity),
            f.error
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}
