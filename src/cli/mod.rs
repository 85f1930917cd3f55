//! Command-line parsing for the unemployment/inflation aligner.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the pipeline code. Flags are turned into a `PipelineConfig`
//! (and an `OutputConfig`) by `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{DuplicatePolicy, PeriodLabelFormat, Step};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "macro-align",
    version,
    about = "Align monthly unemployment with annual inflation and decompose the merged series"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full pipeline: fetch, reshape, normalize, merge, decompose; write exports and plots.
    Run(RunArgs),
    /// Stop after writing the merged table (`general_util.csv`).
    Merge(RunArgs),
    /// Decompose one entity from an existing merged CSV.
    Decompose(DecomposeArgs),
}

/// Where datasets come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// CSV files under `--data-dir`.
    Local,
    /// Download from `MACRO_ALIGN_DATASET_URL` into `--data-dir`.
    Http,
    /// Deterministic synthetic datasets written into `--data-dir`.
    Sample,
}

/// Options shared by `run` and `merge`.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Dataset source.
    #[arg(long, value_enum, default_value_t = SourceKind::Local)]
    pub source: SourceKind,

    /// Directory holding (or receiving) the source CSV files.
    #[arg(long, default_value = "datasets")]
    pub data_dir: PathBuf,

    /// Dataset name of the monthly unemployment table.
    #[arg(long, default_value = "unemployment_rates")]
    pub unemployment: String,

    /// Dataset name of the annual inflation table.
    #[arg(long, default_value = "global_inflation_data")]
    pub inflation: String,

    /// Date column of the unemployment table.
    #[arg(long, default_value = "TIME_PERIOD")]
    pub date_column: String,

    /// Entity column of the inflation table.
    #[arg(long, default_value = "country_name")]
    pub entity_column: String,

    /// Indicator column of the inflation table.
    #[arg(long, default_value = "indicator_name")]
    pub indicator_column: String,

    /// The inflation table has no indicator column.
    #[arg(long)]
    pub no_indicator: bool,

    /// How inflation period labels are parsed.
    #[arg(long, value_enum, default_value_t = PeriodLabelFormat::Year)]
    pub label_format: PeriodLabelFormat,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Duplicate entity rows in the inflation table.
    #[arg(long, value_enum, default_value_t = DuplicatePolicy::OverrideLast)]
    pub duplicates: DuplicatePolicy,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Normalization and decomposition knobs.
#[derive(Debug, Args, Clone)]
pub struct PipelineArgs {
    /// Grid both tables are normalized onto.
    #[arg(long, value_enum, default_value_t = Step::MonthStart)]
    pub step: Step,

    /// Do not extend annual inputs to December of their final year.
    #[arg(long)]
    pub no_cover_final_period: bool,

    /// Variance-stabilization threshold (log1p when a series' max exceeds it).
    /// Defaults to 20 (50 for `decompose --annual`).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Decomposition period for annual indexes.
    #[arg(long, default_value_t = 2)]
    pub annual_period: usize,

    /// Decomposition period for monthly indexes.
    #[arg(long, default_value_t = 12)]
    pub monthly_period: usize,

    /// Decomposition period when the frequency is not recognised.
    #[arg(long, default_value_t = 2)]
    pub fallback_period: usize,

    /// Explicit decomposition period (skips frequency inference).
    #[arg(long)]
    pub period: Option<usize>,

    /// Stop at the first entity that fails instead of skipping it.
    #[arg(long)]
    pub fail_fast: bool,
}

/// Output locations and plotting.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// Directory for CSV/JSON exports.
    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Render ASCII plots in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Also write SVG charts into `<out-dir>/plots`.
    #[arg(long)]
    pub svg: bool,

    /// Entity shown in the single-entity unemployment chart.
    #[arg(long, default_value = "Brazil")]
    pub plot_entity: String,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Random seed for `--source sample`.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for decomposing one entity of a merged table.
#[derive(Debug, Args, Clone)]
pub struct DecomposeArgs {
    /// Merged CSV produced by `macro-align merge` (or `run`).
    #[arg(long, value_name = "CSV", default_value = "data/general_util.csv")]
    pub merged: PathBuf,

    /// Entity to decompose.
    #[arg(short = 'e', long, default_value = "Brazil")]
    pub entity: String,

    /// Resample both columns to one value per year before decomposing.
    #[arg(long)]
    pub annual: bool,

    /// Column suffix of the first source.
    #[arg(long, default_value = "_unemp")]
    pub left_suffix: String,

    /// Column suffix of the second source.
    #[arg(long, default_value = "_infl")]
    pub right_suffix: String,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Write the decomposition to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Write the decomposition report to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Render ASCII plots of the components.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["macro-align", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source, SourceKind::Local);
        assert_eq!(args.date_column, "TIME_PERIOD");
        assert_eq!(args.pipeline.step, Step::MonthStart);
        assert_eq!(args.pipeline.threshold, None);
        assert!(!args.pipeline.fail_fast);
        assert_eq!(args.output.out_dir, PathBuf::from("data"));

        let cli = Cli::parse_from(["macro-align", "run", "--source", "sample"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source, SourceKind::Sample);
    }

    #[test]
    fn decompose_flags() {
        let cli = Cli::parse_from([
            "macro-align",
            "decompose",
            "-e",
            "Chile",
            "--annual",
            "--threshold",
            "35",
            "--period",
            "3",
        ]);
        let Command::Decompose(args) = cli.command else {
            panic!("expected decompose");
        };
        assert_eq!(args.entity, "Chile");
        assert!(args.annual);
        assert_eq!(args.pipeline.threshold, Some(35.0));
        assert_eq!(args.pipeline.period, Some(3));
    }
}
