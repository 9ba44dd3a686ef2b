//! Run configuration: search depth, classification prompts and orchestrator tuning.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// Default number of workers per pooled stage.
pub const DEFAULT_WORKERS: usize = 10;

/// Default minimum extraction confidence for keeping a product.
pub const DEFAULT_PROBABILITY_THRESHOLD: f64 = 0.1;

/// Default capacity of every stage queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default classification model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Class assigned when a prompt cannot be answered.
pub const DEFAULT_IF_MISSING: i32 = -1;

/// Template used when a prompt does not bring its own.
pub const DEFAULT_USER_PROMPT_TEMPLATE: &str =
    "Context: {context}\n\nProduct Details: {name}\n{description}\n\nRelevance:";

/// How deep to search for a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deepness {
    /// Results requested for the seed term.
    pub num_results: usize,

    /// Optional widening of the search with related terms.
    #[serde(default)]
    pub enrichment: Option<Enrichment>,
}

impl Deepness {
    pub fn new(num_results: usize) -> Self {
        Self {
            num_results,
            enrichment: None,
        }
    }

    pub fn with_enrichment(
        mut self,
        additional_terms: usize,
        additional_urls_per_term: usize,
    ) -> Self {
        self.enrichment = Some(Enrichment {
            additional_terms,
            additional_urls_per_term,
        });
        self
    }
}

/// Enrichment depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub additional_terms: usize,
    pub additional_urls_per_term: usize,
}

/// A related search term with its estimated search volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    pub volume: u64,
}

impl Keyword {
    pub fn new(text: impl Into<String>, volume: u64) -> Self {
        Self {
            text: text.into(),
            volume,
        }
    }
}

/// A named classification applied to every surviving product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// Key under which the result is stored in `classifications`.
    pub name: String,
    pub context: String,
    pub system_prompt: String,
    #[serde(default = "default_user_prompt_template")]
    pub user_prompt_template: String,
    pub allowed_classes: BTreeSet<i32>,
    #[serde(default = "default_if_missing")]
    pub default_if_missing: i32,
}

fn default_user_prompt_template() -> String {
    DEFAULT_USER_PROMPT_TEMPLATE.to_string()
}

fn default_if_missing() -> i32 {
    DEFAULT_IF_MISSING
}

impl Prompt {
    pub fn new(
        name: impl Into<String>,
        context: impl Into<String>,
        system_prompt: impl Into<String>,
        allowed_classes: impl IntoIterator<Item = i32>,
    ) -> Self {
        Self {
            name: name.into(),
            context: context.into(),
            system_prompt: system_prompt.into(),
            user_prompt_template: default_user_prompt_template(),
            allowed_classes: allowed_classes.into_iter().collect(),
            default_if_missing: DEFAULT_IF_MISSING,
        }
    }

    pub fn with_user_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.user_prompt_template = template.into();
        self
    }

    pub fn with_default_if_missing(mut self, default: i32) -> Self {
        self.default_if_missing = default;
        self
    }

    pub fn allows(&self, class: i32) -> bool {
        self.allowed_classes.contains(&class)
    }

    /// Fill `{context}`, `{url}`, `{name}` and `{description}` in the user template.
    pub fn render_user_prompt(&self, url: &str, name: &str, description: &str) -> String {
        self.user_prompt_template
            .replace("{context}", &self.context)
            .replace("{url}", url)
            .replace("{name}", name)
            .replace("{description}", description)
    }
}

/// Check that prompt names are usable as unique classification keys.
pub fn validate_prompts(prompts: &[Prompt]) -> Result<()> {
    let mut seen = HashSet::new();
    for prompt in prompts {
        if prompt.name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig {
                reason: "prompt name must not be empty".into(),
            });
        }
        if !seen.insert(prompt.name.as_str()) {
            return Err(PipelineError::InvalidConfig {
                reason: format!("duplicate prompt name: {}", prompt.name),
            });
        }
    }
    Ok(())
}

/// Retry behaviour of the HTTP collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// No retries and no delay.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Tuning knobs of the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Upper bound on search workers.
    pub n_search_workers: usize,

    /// Upper bound on detail workers.
    pub n_detail_workers: usize,

    /// Upper bound on classification workers.
    pub n_classify_workers: usize,

    /// Products with extraction confidence at or below this are filtered.
    pub probability_threshold: f64,

    /// Capacity of each stage queue.
    pub queue_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            n_search_workers: DEFAULT_WORKERS,
            n_detail_workers: DEFAULT_WORKERS,
            n_classify_workers: DEFAULT_WORKERS,
            probability_threshold: DEFAULT_PROBABILITY_THRESHOLD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_workers(mut self, n: usize) -> Self {
        self.n_search_workers = n;
        self
    }

    pub fn with_detail_workers(mut self, n: usize) -> Self {
        self.n_detail_workers = n;
        self
    }

    pub fn with_classify_workers(mut self, n: usize) -> Self {
        self.n_classify_workers = n;
        self
    }

    pub fn with_probability_threshold(mut self, threshold: f64) -> Self {
        self.probability_threshold = threshold;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| {
            Err(PipelineError::InvalidConfig {
                reason: reason.to_string(),
            })
        };
        if self.n_search_workers == 0 || self.n_detail_workers == 0 || self.n_classify_workers == 0
        {
            return invalid("worker maxima must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.probability_threshold) {
            return invalid("probability_threshold must be within [0, 1]");
        }
        if self.queue_capacity == 0 {
            return invalid("queue_capacity must be at least 1");
        }
        Ok(())
    }
}
