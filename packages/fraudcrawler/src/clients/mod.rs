//! HTTP-backed collaborator implementations.
//!
//! - [`SerpApi`]: Google search through SerpAPI
//! - [`DataForSeo`]: keyword enrichment through DataForSEO Labs
//! - [`ZyteApi`]: product detail extraction through the Zyte API
//! - [`OpenAiClassifier`]: prompt classification through OpenAI
//! - [`RateLimited`]: request budget shared by a worker pool

pub mod enrich;
pub mod openai;
pub mod rate_limited;
pub mod retry;
pub mod serp;
pub mod zyte;

pub use enrich::{rank_keywords, DataForSeo};
pub use openai::OpenAiClassifier;
pub use rate_limited::{RateLimitExt, RateLimited};
pub use serp::SerpApi;
pub use zyte::ZyteApi;
