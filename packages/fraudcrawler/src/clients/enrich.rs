//! DataForSEO-backed enrichment collaborator.
//!
//! Combines keyword suggestions and related keywords for a seed term and
//! keeps the highest-volume ones.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::clients::retry::{error_for_status, with_retries};
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::security::BasicCredentials;
use crate::traits::enricher::EnrichmentCollaborator;
use crate::types::{
    config::{Keyword, RetryPolicy},
    locale::{Language, Location},
};

const DATAFORSEO_BASE_URL: &str = "https://api.dataforseo.com";
const SUGGESTIONS_PATH: &str = "/v3/dataforseo_labs/google/keyword_suggestions/live";
const RELATED_PATH: &str = "/v3/dataforseo_labs/google/related_keywords/live";

#[derive(Debug, Serialize)]
struct LabsTask<'a> {
    keyword: &'a str,
    language_name: &'a str,
    location_name: &'a str,
    limit: usize,
}

#[derive(Debug, Default, Deserialize)]
struct LabsResponse {
    #[serde(default)]
    tasks: Option<Vec<LabsTaskResult>>,
}

#[derive(Debug, Deserialize)]
struct LabsTaskResult {
    #[serde(default)]
    result: Option<Vec<LabsResult>>,
}

#[derive(Debug, Deserialize)]
struct LabsResult {
    #[serde(default)]
    items: Option<Vec<Value>>,
}

impl LabsResponse {
    fn into_items(self) -> impl Iterator<Item = Value> {
        self.tasks
            .into_iter()
            .flatten()
            .flat_map(|task| task.result.into_iter().flatten())
            .flat_map(|result| result.items.into_iter().flatten())
    }
}

/// Which DataForSEO Labs endpoint a keyword list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeywordSource {
    Suggested,
    Related,
}

impl KeywordSource {
    fn path(self) -> &'static str {
        match self {
            Self::Suggested => SUGGESTIONS_PATH,
            Self::Related => RELATED_PATH,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Suggested => "suggested",
            Self::Related => "related",
        }
    }

    /// JSON pointers to the keyword text and its search volume in one item.
    fn pointers(self) -> (&'static str, &'static str) {
        match self {
            Self::Suggested => ("/keyword", "/keyword_info/search_volume"),
            Self::Related => (
                "/keyword_data/keyword",
                "/keyword_data/keyword_info/search_volume",
            ),
        }
    }

    fn parse_item(self, item: &Value) -> Option<Keyword> {
        let (text, volume) = self.pointers();
        let text = item.pointer(text)?.as_str()?;
        let volume = item.pointer(volume)?.as_u64()?;
        Some(Keyword::new(text, volume))
    }
}

/// Keyword enrichment through DataForSEO Labs.
#[derive(Debug, Clone)]
pub struct DataForSeo {
    client: reqwest::Client,
    credentials: BasicCredentials,
    base_url: String,
    retry: RetryPolicy,
}

impl DataForSeo {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials: BasicCredentials::new(user, password),
            base_url: DATAFORSEO_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_keywords(
        &self,
        source: KeywordSource,
        term: &str,
        language: &Language,
        location: &Location,
        limit: usize,
    ) -> CollaboratorResult<Vec<Keyword>> {
        let body = [LabsTask {
            keyword: term,
            language_name: &language.name,
            location_name: &location.name,
            limit,
        }];
        let url = format!("{}{}", self.base_url, source.path());

        let client = &self.client;
        let credentials = &self.credentials;
        let url = url.as_str();
        let body = &body;
        let response = with_retries(&self.retry, "dataforseo.keywords", move || async move {
            let response = credentials
                .authorize(client.post(url))
                .json(body)
                .send()
                .await?;
            let data = error_for_status(response).await?.json::<LabsResponse>().await?;
            Ok::<_, CollaboratorError>(data)
        })
        .await?;

        let mut keywords = Vec::new();
        for item in response.into_items() {
            match source.parse_item(&item) {
                Some(keyword) => keywords.push(keyword),
                None => warn!(source = source.as_str(), "Ignoring unparseable keyword item"),
            }
        }
        debug!(source = source.as_str(), found = keywords.len(), "DataForSEO keywords");
        Ok(keywords)
    }

    /// Keywords from one endpoint; a failed endpoint contributes nothing.
    async fn keywords_or_empty(
        &self,
        source: KeywordSource,
        term: &str,
        language: &Language,
        location: &Location,
        limit: usize,
    ) -> Vec<Keyword> {
        match self
            .fetch_keywords(source, term, language, location, limit)
            .await
        {
            Ok(keywords) => keywords,
            Err(e) => {
                error!(source = source.as_str(), error = %e, "DataForSEO keyword search failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl EnrichmentCollaborator for DataForSeo {
    async fn apply(
        &self,
        term: &str,
        language: &Language,
        location: &Location,
        n_terms: usize,
    ) -> CollaboratorResult<Vec<String>> {
        info!(term, n_terms, "Applying enrichment");
        let (suggested, related) = tokio::join!(
            self.keywords_or_empty(KeywordSource::Suggested, term, language, location, n_terms),
            self.keywords_or_empty(KeywordSource::Related, term, language, location, n_terms),
        );

        let terms = rank_keywords(term, suggested.into_iter().chain(related), n_terms);
        info!(produced = terms.len(), "Enrichment produced additional terms");
        Ok(terms)
    }
}

/// Drop the seed, keep each keyword once at its highest volume, and return
/// the `n_terms` highest-volume texts (ties broken alphabetically).
pub fn rank_keywords(
    seed: &str,
    keywords: impl IntoIterator<Item = Keyword>,
    n_terms: usize,
) -> Vec<String> {
    let mut volumes: HashMap<String, u64> = HashMap::new();
    for keyword in keywords.into_iter().filter(|k| k.text != seed) {
        let volume = volumes.entry(keyword.text).or_default();
        *volume = (*volume).max(keyword.volume);
    }

    let mut ranked: Vec<(String, u64)> = volumes.into_iter().collect();
    ranked.sort_by(|(a_text, a_vol), (b_text, b_vol)| {
        b_vol.cmp(a_vol).then_with(|| a_text.cmp(b_text))
    });
    ranked
        .into_iter()
        .take(n_terms)
        .map(|(text, _)| text)
        .collect()
}
