//! Numerical utilities: gap filling, moving averages, and least squares lines.

pub mod filter;
pub mod interp;
pub mod ols;

pub use filter::*;
pub use interp::*;
pub use ols::*;
