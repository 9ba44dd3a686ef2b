//! Result collector implementations.
//!
//! - [`MemoryCollector`]: keeps every product in memory (tests, embedding apps)
//! - [`JsonLinesCollector`]: appends one JSON object per product to a file

pub mod jsonl;
pub mod memory;

pub use jsonl::{result_filename, JsonLinesCollector};
pub use memory::MemoryCollector;
