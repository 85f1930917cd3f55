//! Seasonal decomposition: variance stabilization, period inference, the
//! additive decomposer itself, and the per-entity batch runner.

pub mod additive;
pub mod batch;
pub mod period;
pub mod stabilize;

pub use additive::{Components, decompose_additive};
pub use batch::{BatchReport, EntityFailure, Stage, decompose_aligned, decompose_series};
pub use period::{MIN_PERIOD, classify_frequency, infer_period};
pub use stabilize::{GENERAL_MERGE_THRESHOLD, SINGLE_COUNTRY_ANNUAL_THRESHOLD, Stabilized, invert, stabilize};
