//! Time-axis work: normalization onto calendar grids, wide-table reshaping,
//! and inner-join alignment.

pub mod merge;
pub mod normalize;
pub mod reshape;

pub use merge::{merge_inner, split_suffixed};
pub use normalize::{NormalizeOptions, fill_gaps, normalize, normalize_table};
pub use reshape::{melt, parse_period_label, pivot, reshape};
