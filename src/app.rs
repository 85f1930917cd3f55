//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves datasets through a `DatasetSource`
//! - runs the pure pipeline (`app::pipeline`)
//! - prints reports/plots
//! - writes exports

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::cli::{Command, DecomposeArgs, OutputArgs, PipelineArgs, RunArgs, SourceKind};
use crate::data::{DatasetSource, HttpDatasetSource, LocalDatasetSource, SampleDatasetSource, SampleKind};
use crate::decompose::{BatchReport, EntityFailure, GENERAL_MERGE_THRESHOLD, SINGLE_COUNTRY_ANNUAL_THRESHOLD};
use crate::domain::{
    AlignedTable, EntityTable, FailurePolicy, MergeSuffixes, PeriodPolicy, PipelineConfig, TimeSeries,
};
use crate::error::AppError;
use crate::io::{WideLayout, read_dated_table, read_wide_table};
use crate::plot::{AsciiRenderer, Marker, PlotOptions, PlotRenderer, SvgRenderer};

pub mod pipeline;

/// File names of the persisted artifacts (under `--out-dir`).
pub const UNEMPLOYMENT_EXPORT: &str = "unemployment_rates.csv";
pub const INFLATION_EXPORT: &str = "global_inflation_data.csv";
pub const MERGED_EXPORT: &str = "general_util.csv";
pub const DECOMPOSITION_EXPORT: &str = "decomposition.csv";
pub const REPORT_EXPORT: &str = "decomposition.json";

/// Output-side settings derived from CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub out_dir: PathBuf,
    pub plot: bool,
    pub svg: bool,
    pub plot_entity: String,
    pub plot_width: usize,
    pub plot_height: usize,
}

impl OutputConfig {
    pub fn path(&self, file: &str) -> PathBuf {
        self.out_dir.join(file)
    }
}

/// Entry point for the `macro-align` binary.
pub fn run() -> Result<(), AppError> {
    // `macro-align` and `macro-align --source local ...` behave like
    // `macro-align run ...`. Clap requires a subcommand name, so argv is
    // rewritten before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Run(args) => handle_run(args, RunMode::Full),
        Command::Merge(args) => handle_run(args, RunMode::MergeOnly),
        Command::Decompose(args) => handle_decompose(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Full,
    MergeOnly,
}

fn handle_run(args: RunArgs, mode: RunMode) -> Result<(), AppError> {
    let config = pipeline_config_from_args(&args.pipeline, MergeSuffixes::default(), false)?;
    let config = PipelineConfig {
        label_format: args.label_format,
        duplicate_policy: args.duplicates,
        ..config
    };
    let output = output_config_from_args(&args.output);

    let source = dataset_source(&args)?;
    log::info!("Dataset source: {}", source.describe());

    let unemployment_path = source.fetch(&args.unemployment)?;
    let inflation_path = source.fetch(&args.inflation)?;

    let unemployment = read_dated_table(&unemployment_path, &args.date_column)?;
    report_row_errors(&unemployment_path, &unemployment.row_errors);
    let layout = WideLayout {
        entity_column: args.entity_column.clone(),
        indicator_column: (!args.no_indicator).then(|| args.indicator_column.clone()),
    };
    let inflation = read_wide_table(&inflation_path, &layout)?;
    report_row_errors(&inflation_path, &inflation.row_errors);

    crate::io::write_entity_table_csv(&output.path(UNEMPLOYMENT_EXPORT), &unemployment.table)?;

    if mode == RunMode::MergeOnly {
        let alignment = pipeline::align_sources(&unemployment.table, &inflation.table, &config)?;
        export_reshaped_inflation(&output, &alignment, &config, &args.entity_column)?;
        crate::io::write_aligned_table_csv(&output.path(MERGED_EXPORT), &alignment.aligned)?;
        println!("{}", crate::report::format_alignment(&alignment));
        return Ok(());
    }

    let run = pipeline::run_pipeline(&unemployment.table, &inflation.table, &config)?;
    let aligned = &run.alignment.aligned;
    export_reshaped_inflation(&output, &run.alignment, &config, &args.entity_column)?;
    crate::io::write_aligned_table_csv(&output.path(MERGED_EXPORT), aligned)?;

    if let Some(batch) = &run.batch {
        write_batch(
            batch,
            &run.failures(),
            &config.suffixes,
            Some(output.path(DECOMPOSITION_EXPORT).as_path()),
            Some(output.path(REPORT_EXPORT).as_path()),
        )?;
    }

    println!(
        "{}",
        crate::report::format_run_summary(&run, &config, &source.describe())
    );

    render_plots(&output, &unemployment.table, aligned, &config.suffixes)?;

    if aligned.is_empty() {
        return Err(AppError::new(
            3,
            "The two tables share no dates; nothing was decomposed.",
        ));
    }
    Ok(())
}

fn handle_decompose(args: DecomposeArgs) -> Result<(), AppError> {
    let suffixes = MergeSuffixes {
        left: args.left_suffix.clone(),
        right: args.right_suffix.clone(),
    };
    let config = pipeline_config_from_args(&args.pipeline, suffixes, args.annual)?;

    let merged = read_dated_table(&args.merged, crate::io::DATE_COLUMN)?;
    report_row_errors(&args.merged, &merged.row_errors);
    let aligned = crate::series::split_suffixed(&merged.table, &config.suffixes);

    let batch = pipeline::decompose_entity(&aligned, &args.entity, args.annual, &config)?.ok_or_else(|| {
        AppError::new(
            2,
            format!(
                "Entity '{}' not found in '{}' (need both `{}{}` and `{}{}` columns).",
                args.entity,
                args.merged.display(),
                args.entity,
                config.suffixes.left,
                args.entity,
                config.suffixes.right
            ),
        )
    })?;

    println!("{}", crate::report::format_decomposition(&batch));
    let failures: Vec<_> = batch.failures.iter().collect();
    if !failures.is_empty() {
        println!("{}", crate::report::format_failures(&failures));
    }

    write_batch(
        &batch,
        &failures,
        &config.suffixes,
        args.export.as_deref(),
        args.export_json.as_deref(),
    )?;

    if args.plot {
        let renderer = AsciiRenderer::new(args.width, args.height);
        for result in &batch.results {
            let components = [
                ("trend", &result.trend),
                ("seasonal", &result.seasonal),
                ("residual", &result.residual),
            ];
            for (label, values) in components {
                let series = TimeSeries::from_dense(format!("{} {label}", result.series), &result.dates, values)?;
                let options = component_plot_options(&result.series, label);
                renderer.render(&[series], &options)?;
            }
        }
    }

    if batch.results.is_empty() {
        return Err(AppError::new(3, format!("No series of '{}' could be decomposed.", args.entity)));
    }
    Ok(())
}

/// The inflation table after indicator selection, in its source wide layout.
fn export_reshaped_inflation(
    output: &OutputConfig,
    alignment: &pipeline::Alignment,
    config: &PipelineConfig,
    entity_column: &str,
) -> Result<(), AppError> {
    crate::io::write_entity_table_wide_csv(
        &output.path(INFLATION_EXPORT),
        &alignment.inflation,
        config.label_format,
        entity_column,
    )
}

/// Residuals are scattered around zero, so they get point markers.
fn component_plot_options(series: &str, component: &str) -> PlotOptions {
    let options = PlotOptions::new(format!("{series}: {component}"), "year", component);
    if component == "residual" {
        options.with_marker(Marker::Dot)
    } else {
        options
    }
}

fn write_batch(
    batch: &BatchReport,
    failures: &[&EntityFailure],
    suffixes: &MergeSuffixes,
    csv_path: Option<&Path>,
    json_path: Option<&Path>,
) -> Result<(), AppError> {
    if let Some(path) = csv_path {
        crate::io::write_decomposition_csv(path, &batch.results)?;
    }
    if let Some(path) = json_path {
        let report = crate::io::ReportFile::from_batch(batch, failures, suffixes);
        crate::io::write_report_json(path, &report)?;
    }
    Ok(())
}

fn render_plots(
    output: &OutputConfig,
    unemployment: &EntityTable,
    aligned: &AlignedTable,
    suffixes: &MergeSuffixes,
) -> Result<(), AppError> {
    if !output.plot && !output.svg {
        return Ok(());
    }

    let mut charts: Vec<(Vec<TimeSeries>, PlotOptions)> = Vec::new();
    match unemployment.get(&output.plot_entity) {
        Some(series) => charts.push((
            vec![series.clone()],
            PlotOptions::new(format!("Unemployment rate, {}", output.plot_entity), "Date", "Unemployment Rate"),
        )),
        None => log::warn!("No unemployment series for '{}'; chart skipped.", output.plot_entity),
    }
    if !aligned.is_empty() {
        charts.push((
            aligned.columns_with_suffix(&suffixes.left),
            PlotOptions::new("Unemployment rate, all countries", "Year", "Unemployment Rate"),
        ));
        charts.push((
            aligned.columns_with_suffix(&suffixes.right),
            PlotOptions::new("Inflation, all countries", "Year", "Inflation (%)").with_log_scale(true),
        ));
    }

    if output.plot {
        let renderer = AsciiRenderer::new(output.plot_width, output.plot_height);
        for (series, options) in &charts {
            renderer.render(series, options)?;
        }
    }
    if output.svg {
        let renderer = SvgRenderer::new(output.out_dir.join("plots"), 1200, 600);
        for (series, options) in &charts {
            renderer.render(series, options)?;
        }
    }
    Ok(())
}

fn dataset_source(args: &RunArgs) -> Result<Box<dyn DatasetSource>, AppError> {
    Ok(match args.source {
        SourceKind::Local => Box::new(LocalDatasetSource::new(&args.data_dir)),
        SourceKind::Http => Box::new(HttpDatasetSource::from_env(&args.data_dir)?),
        SourceKind::Sample => Box::new(
            SampleDatasetSource::new(&args.data_dir, args.output.seed)
                .with_dataset(args.unemployment.clone(), SampleKind::Unemployment)
                .with_dataset(args.inflation.clone(), SampleKind::Inflation),
        ),
    })
}

fn report_row_errors(path: &Path, errors: &[crate::io::RowError]) {
    for e in errors.iter().take(5) {
        log::warn!("{}:{}: {}", path.display(), e.line, e.message);
    }
    if errors.len() > 5 {
        log::warn!("{}: {} more row errors not shown.", path.display(), errors.len() - 5);
    }
}

/// Build the pipeline configuration from CLI flags.
///
/// `single_country_annual` selects the stabilizer threshold used when
/// `--threshold` is not given.
pub fn pipeline_config_from_args(
    args: &PipelineArgs,
    suffixes: MergeSuffixes,
    single_country_annual: bool,
) -> Result<PipelineConfig, AppError> {
    if !pipeline::suffixes_are_distinct(&suffixes) {
        return Err(AppError::new(
            2,
            format!(
                "Column suffixes must be non-empty and different (got '{}' and '{}').",
                suffixes.left, suffixes.right
            ),
        ));
    }

    let default_threshold = if single_country_annual {
        SINGLE_COUNTRY_ANNUAL_THRESHOLD
    } else {
        GENERAL_MERGE_THRESHOLD
    };
    let threshold = args.threshold.unwrap_or(default_threshold);
    if !threshold.is_finite() {
        return Err(AppError::new(2, "Threshold must be a finite number."));
    }

    let period_policy = PeriodPolicy {
        annual: args.annual_period,
        monthly: args.monthly_period,
        fallback: args.fallback_period,
    };
    for period in [period_policy.annual, period_policy.monthly, period_policy.fallback]
        .into_iter()
        .chain(args.period)
    {
        crate::decompose::period::validate_period(period).map_err(|e| AppError::new(2, e.to_string()))?;
    }

    Ok(PipelineConfig {
        step: args.step,
        cover_final_period: !args.no_cover_final_period,
        failure_policy: if args.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::SkipAndContinue
        },
        suffixes,
        threshold,
        period_policy,
        period_override: args.period,
        ..PipelineConfig::default()
    })
}

pub fn output_config_from_args(args: &OutputArgs) -> OutputConfig {
    OutputConfig {
        out_dir: args.out_dir.clone(),
        plot: args.plot && !args.no_plot,
        svg: args.svg,
        plot_entity: args.plot_entity.clone(),
        plot_width: args.width,
        plot_height: args.height,
    }
}

/// Rewrite argv so `macro-align` defaults to `macro-align run`.
///
/// Rules:
/// - `macro-align`                     -> `macro-align run`
/// - `macro-align --source local ...`  -> `macro-align run --source local ...`
/// - `macro-align --help/--version/-h` -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("run".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "merge" | "decompose");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "run flags".
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Step;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn pipeline_args(extra: &[&str]) -> PipelineArgs {
        let mut argv = vec!["macro-align", "run"];
        argv.extend_from_slice(extra);
        match crate::cli::Cli::parse_from(argv).command {
            Command::Run(a) => a.pipeline,
            _ => unreachable!(),
        }
    }

    #[test]
    fn residual_plots_use_point_markers() {
        assert_eq!(component_plot_options("Brazil_infl", "residual").marker, Marker::Dot);
        assert_eq!(component_plot_options("Brazil_infl", "trend").marker, Marker::None);
        assert_eq!(component_plot_options("Brazil_infl", "trend").title, "Brazil_infl: trend");
    }

    #[test]
    fn rewrite_defaults_to_run() {
        assert_eq!(rewrite_args(args(&["macro-align"])), args(&["macro-align", "run"]));
        assert_eq!(
            rewrite_args(args(&["macro-align", "--source", "local"])),
            args(&["macro-align", "run", "--source", "local"])
        );
        assert_eq!(rewrite_args(args(&["macro-align", "--help"])), args(&["macro-align", "--help"]));
        assert_eq!(
            rewrite_args(args(&["macro-align", "merge", "--fail-fast"])),
            args(&["macro-align", "merge", "--fail-fast"])
        );
    }

    #[test]
    fn default_flags_give_default_config() {
        let config = pipeline_config_from_args(&pipeline_args(&[]), MergeSuffixes::default(), false).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_map_onto_config() {
        let a = pipeline_args(&["--fail-fast", "--step", "year-start", "--no-cover-final-period", "--period", "4"]);
        let config = pipeline_config_from_args(&a, MergeSuffixes::default(), true).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.step, Step::YearStart);
        assert!(!config.cover_final_period);
        assert_eq!(config.period_override, Some(4));
        assert_eq!(config.threshold, SINGLE_COUNTRY_ANNUAL_THRESHOLD);
    }

    #[test]
    fn invalid_period_or_suffixes_are_usage_errors() {
        let a = pipeline_args(&["--period", "1"]);
        let err = pipeline_config_from_args(&a, MergeSuffixes::default(), false).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains(">= 2"));

        let same = MergeSuffixes {
            left: "_x".into(),
            right: "_x".into(),
        };
        let err = pipeline_config_from_args(&pipeline_args(&[]), same, false).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
