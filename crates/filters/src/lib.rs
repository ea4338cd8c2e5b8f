//! # vitel filters
//!
//! Pure, stateless formatting filters for template output.

pub mod size;

pub use size::{SizeOptions, format_size};
