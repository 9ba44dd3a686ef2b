//! Collaborator abstractions consumed by the pipeline.
//!
//! Each pipeline stage talks to the outside world through exactly one of
//! these traits. HTTP-backed implementations live in [`crate::clients`],
//! call-recording mocks in [`crate::testing`].

pub mod classifier;
pub mod collector;
pub mod detail;
pub mod enricher;
pub mod searcher;
