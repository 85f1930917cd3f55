//! `macro-align` library crate.
//!
//! Aligns a monthly unemployment table with an annual, wide-format inflation
//! table on a shared calendar grid, then decomposes every merged series into
//! trend, seasonal and residual components.
//!
//! The binary (`macro-align`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the pure pipeline (`series`, `decompose`, `app::pipeline`) stays free of I/O
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod decompose;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod plot;
pub mod report;
pub mod series;
