//! Report rendering and output.
//!
//! Renders a batch report in the supported formats and writes it to its
//! destination atomically.

pub mod generator;
pub mod writer;

pub use generator::*;
pub use writer::*;
