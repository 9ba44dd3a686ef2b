//! Data types shared by the pipeline stages and collaborators.

pub mod config;
pub mod locale;
pub mod product;
