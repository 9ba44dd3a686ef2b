//! Fraud Crawler Pipeline Library
//!
//! Discovers product listings that may indicate counterfeit or illegal
//! sales. A seed term runs through a staged, concurrent pipeline:
//!
//! ```text
//! search (+ enrichment) -> dedup -> detail + confidence filter -> classify -> collect
//! ```
//!
//! Every stage is a pool of workers connected by bounded queues. A stage
//! is only closed once everything upstream has been forwarded into it, so
//! no item is lost and per-item failures never fail a run: they surface as
//! log lines, counters in the [`RunReport`], and the item's own state.
//!
//! # Usage
//!
//! ```rust,ignore
//! use fraudcrawler::{Deepness, Language, Location, Orchestrator, Prompt, RunRequest};
//! use fraudcrawler::clients::{DataForSeo, OpenAiClassifier, SerpApi, ZyteApi};
//! use fraudcrawler::collectors::MemoryCollector;
//!
//! let collector = Arc::new(MemoryCollector::new());
//! let orchestrator = Orchestrator::new(
//!     Arc::new(SerpApi::new(serp_key)),
//!     Arc::new(DataForSeo::new(user, pwd)),
//!     Arc::new(ZyteApi::new(zyte_key)),
//!     Arc::new(OpenAiClassifier::new(openai_key)),
//!     collector.clone(),
//! );
//!
//! let request = RunRequest::new(
//!     "sildenafil",
//!     Language::new("German", "de"),
//!     Location::new("Switzerland", "ch"),
//!     Deepness::new(20).with_enrichment(5, 10),
//! )
//! .with_prompts(vec![Prompt::new("availability", context, system, [0, 1])]);
//!
//! let report = orchestrator.run(request).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator abstractions (search, enrichment, detail, classifier, collector)
//! - [`types`] - Products, locales, prompts and configuration
//! - [`pipeline`] - Queues, stage workers and the [`Orchestrator`]
//! - [`clients`] - HTTP collaborators (SerpAPI, DataForSEO, Zyte, OpenAI)
//! - [`collectors`] - Result sinks (memory, JSON Lines)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock collaborators for testing

pub mod clients;
pub mod collectors;
pub mod error;
pub mod pipeline;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{CollaboratorError, CollaboratorResult, PipelineError, Result};
pub use traits::{
    classifier::ClassifierCollaborator, collector::ResultCollector, detail::DetailCollaborator,
    enricher::EnrichmentCollaborator, searcher::SearchCollaborator,
};
pub use types::{
    config::{
        validate_prompts, Deepness, Enrichment, Keyword, OrchestratorConfig, Prompt, RetryPolicy,
    },
    locale::{Host, Language, Location},
    product::{FilterReason, ProductDetails, ProductItem, SearchTask, SearchTermType, SerpResult},
};

pub use pipeline::{
    Orchestrator, ProductStream, RunReport, RunRequest, RunStats, StatsSnapshot, WorkerCounts,
};

pub use collectors::{JsonLinesCollector, MemoryCollector};

pub use testing::{MockClassifier, MockDetail, MockEnricher, MockSearcher};
