//! Testing utilities: call-recording mock collaborators.
//!
//! These let applications and tests drive the full pipeline without any
//! network access. Every mock records its calls for later assertions.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::traits::{
    classifier::ClassifierCollaborator, detail::DetailCollaborator,
    enricher::EnrichmentCollaborator, searcher::SearchCollaborator,
};
use crate::types::{
    config::Prompt,
    locale::{normalize_domain, Host, Language, Location},
    product::{ProductDetails, SerpResult},
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn mock_failure(what: &str) -> CollaboratorError {
    CollaboratorError::Api {
        status: 500,
        message: format!("mock failure for {what}"),
    }
}

/// A search result for `url` with its host as domain and the default marketplace.
pub fn serp_result(url: &str) -> SerpResult {
    let domain = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().and_then(normalize_domain))
        .unwrap_or_default();
    SerpResult::new(url, domain, "Google")
}

// =============================================================================
// Search
// =============================================================================

/// Record of a call made to [`MockSearcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockSearchCall {
    pub term: String,
    pub num_results: usize,
    pub marketplaces: usize,
    pub excluded_urls: usize,
}

/// Mock search collaborator returning predefined results per term.
///
/// Unknown terms return no results. Results are truncated to `num_results`.
#[derive(Default, Clone)]
pub struct MockSearcher {
    results: Arc<RwLock<HashMap<String, Vec<SerpResult>>>>,
    fail_terms: Arc<RwLock<HashSet<String>>>,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<MockSearchCall>>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Predefine the result URLs for a term.
    pub fn with_urls(self, term: impl Into<String>, urls: &[&str]) -> Self {
        let results = urls.iter().map(|url| serp_result(url)).collect();
        self.with_results(term, results)
    }

    /// Predefine full result records for a term.
    pub fn with_results(self, term: impl Into<String>, results: Vec<SerpResult>) -> Self {
        write(&self.results).insert(term.into(), results);
        self
    }

    /// Make searches for `term` fail.
    pub fn failing_on(self, term: impl Into<String>) -> Self {
        write(&self.fail_terms).insert(term.into());
        self
    }

    /// Sleep before answering, to exercise concurrency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<MockSearchCall> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl SearchCollaborator for MockSearcher {
    async fn search(
        &self,
        term: &str,
        _language: &Language,
        _location: &Location,
        num_results: usize,
        marketplaces: Option<&[Host]>,
        excluded_urls: Option<&[Host]>,
    ) -> CollaboratorResult<Vec<SerpResult>> {
        write(&self.calls).push(MockSearchCall {
            term: term.to_string(),
            num_results,
            marketplaces: marketplaces.map_or(0, <[Host]>::len),
            excluded_urls: excluded_urls.map_or(0, <[Host]>::len),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if read(&self.fail_terms).contains(term) {
            return Err(mock_failure(term));
        }
        Ok(read(&self.results)
            .get(term)
            .map(|results| results.iter().take(num_results).cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// Enrichment
// =============================================================================

/// Mock enrichment collaborator returning predefined terms per seed.
#[derive(Default, Clone)]
pub struct MockEnricher {
    terms: Arc<RwLock<HashMap<String, Vec<String>>>>,
    fail: bool,
    calls: Arc<RwLock<Vec<(String, usize)>>>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms(self, seed: impl Into<String>, terms: &[&str]) -> Self {
        write(&self.terms).insert(seed.into(), terms.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Make every enrichment call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// `(seed, n_terms)` of every call.
    pub fn calls(&self) -> Vec<(String, usize)> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl EnrichmentCollaborator for MockEnricher {
    async fn apply(
        &self,
        term: &str,
        _language: &Language,
        _location: &Location,
        n_terms: usize,
    ) -> CollaboratorResult<Vec<String>> {
        write(&self.calls).push((term.to_string(), n_terms));
        if self.fail {
            return Err(mock_failure(term));
        }
        Ok(read(&self.terms)
            .get(term)
            .map(|terms| terms.iter().take(n_terms).cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// Detail
// =============================================================================

/// Mock detail collaborator returning predefined details per URL.
///
/// Unknown URLs get the default details: empty unless set with
/// [`with_default_probability`](Self::with_default_probability).
#[derive(Default, Clone)]
pub struct MockDetail {
    details: Arc<RwLock<HashMap<String, ProductDetails>>>,
    default_details: ProductDetails,
    fail_urls: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

/// Named, described details with the given confidence.
pub fn product_details(url: &str, probability: f64) -> ProductDetails {
    ProductDetails {
        name: Some(format!("Product at {url}")),
        price: Some("CHF 19.90".to_string()),
        description: Some(format!("Description of {url}")),
        images: None,
        probability: Some(probability),
    }
}

impl MockDetail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_details(self, url: impl Into<String>, details: ProductDetails) -> Self {
        write(&self.details).insert(url.into(), details);
        self
    }

    /// Named and described details for `url` with the given probability.
    pub fn with_probability(self, url: &str, probability: f64) -> Self {
        self.with_details(url, product_details(url, probability))
    }

    /// Named and described details for every URL not configured explicitly.
    pub fn with_default_probability(mut self, probability: f64) -> Self {
        self.default_details = product_details("any", probability);
        self
    }

    pub fn failing_on(self, url: impl Into<String>) -> Self {
        write(&self.fail_urls).insert(url.into());
        self
    }

    /// URLs fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl DetailCollaborator for MockDetail {
    async fn fetch(&self, url: &str) -> CollaboratorResult<ProductDetails> {
        write(&self.calls).push(url.to_string());
        if read(&self.fail_urls).contains(url) {
            return Err(mock_failure(url));
        }
        Ok(read(&self.details)
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_details.clone()))
    }
}

// =============================================================================
// Classifier
// =============================================================================

/// Record of a call made to [`MockClassifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockClassifyCall {
    pub prompt: String,
    pub url: String,
}

/// Mock classifier returning a fixed class per prompt name.
///
/// Prompts without a configured class answer `0`.
#[derive(Default, Clone)]
pub struct MockClassifier {
    classes: Arc<RwLock<HashMap<String, i32>>>,
    fail_prompts: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<MockClassifyCall>>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(self, prompt: impl Into<String>, class: i32) -> Self {
        write(&self.classes).insert(prompt.into(), class);
        self
    }

    pub fn failing_on(self, prompt: impl Into<String>) -> Self {
        write(&self.fail_prompts).insert(prompt.into());
        self
    }

    pub fn calls(&self) -> Vec<MockClassifyCall> {
        read(&self.calls).clone()
    }
}

#[async_trait]
impl ClassifierCollaborator for MockClassifier {
    async fn classify(
        &self,
        prompt: &Prompt,
        url: &str,
        _name: &str,
        _description: &str,
    ) -> CollaboratorResult<i32> {
        write(&self.calls).push(MockClassifyCall {
            prompt: prompt.name.clone(),
            url: url.to_string(),
        });
        if read(&self.fail_prompts).contains(&prompt.name) {
            return Err(mock_failure(&prompt.name));
        }
        Ok(read(&self.classes).get(&prompt.name).copied().unwrap_or(0))
    }
}
