//! Dataset retrieval and synthetic sample generation.

pub mod sample;
pub mod source;

pub use sample::*;
pub use source::*;
