//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - time-indexed containers (`TimeSeries`, `EntityTable`, `AlignedTable`)
//! - raw tabular shapes (`WideTable`, `LongTable`)
//! - decomposition outputs (`DecompositionResult`, `PeriodChoice`)
//! - run configuration (`PipelineConfig` and its policy enums)

pub mod types;

pub use types::*;
