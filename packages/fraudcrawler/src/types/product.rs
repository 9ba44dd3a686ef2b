//! Items flowing through the pipeline and the records collaborators return.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::locale::{Host, Language, Location};

/// Provenance of a search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchTermType {
    /// The seed term supplied by the operator.
    Initial,
    /// A related term produced by enrichment.
    Enriched,
}

impl SearchTermType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Enriched => "enriched",
        }
    }
}

impl fmt::Display for SearchTermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where (and why) an item was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterReason {
    /// URL failed the search collaborator's country-code inclusion rule.
    #[serde(rename = "serp locale")]
    SerpLocale,
    /// URL belongs to an excluded host.
    #[serde(rename = "serp excluded url")]
    SerpExcludedUrl,
    /// URL already seen earlier in this run.
    #[serde(rename = "current-run duplicate")]
    CurrentRunDuplicate,
    /// URL was collected by a previous run.
    #[serde(rename = "previous-run duplicate")]
    PreviousRunDuplicate,
    /// Extraction confidence below the configured threshold.
    #[serde(rename = "confidence threshold")]
    ConfidenceThreshold,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SerpLocale => "serp locale",
            Self::SerpExcludedUrl => "serp excluded url",
            Self::CurrentRunDuplicate => "current-run duplicate",
            Self::PreviousRunDuplicate => "previous-run duplicate",
            Self::ConfidenceThreshold => "confidence threshold",
        }
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single search request handed to a search worker.
#[derive(Debug, Clone)]
pub struct SearchTask {
    pub search_term: String,
    pub search_term_type: SearchTermType,
    pub language: Language,
    pub location: Location,
    pub num_results: usize,
    pub marketplaces: Option<Vec<Host>>,
    pub excluded_urls: Option<Vec<Host>>,
}

/// A candidate URL returned by the search collaborator.
///
/// `filtered_at_stage` is set if and only if the record is filtered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerpResult {
    pub url: String,
    pub domain: String,
    pub marketplace_name: String,
    filtered_at_stage: Option<FilterReason>,
}

impl SerpResult {
    pub fn new(
        url: impl Into<String>,
        domain: impl Into<String>,
        marketplace_name: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            marketplace_name: marketplace_name.into(),
            filtered_at_stage: None,
        }
    }

    /// Flag this record as filtered by the search collaborator.
    pub fn filtered_by(mut self, reason: FilterReason) -> Self {
        self.filtered_at_stage.get_or_insert(reason);
        self
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered_at_stage.is_some()
    }

    pub fn filtered_at_stage(&self) -> Option<FilterReason> {
        self.filtered_at_stage
    }
}

/// Fields extracted from a product page by the detail collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    pub probability: Option<f64>,
}

/// The unit of work flowing from search to collection.
///
/// Provenance and URL are fixed at creation. Filtering is monotonic: once
/// an item is marked filtered it stays filtered with its first reason.
/// Deserializing rejects records whose `filtered` flag and
/// `filtered_at_stage` disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProductItem")]
pub struct ProductItem {
    search_term: String,
    search_term_type: SearchTermType,
    url: String,
    pub domain: String,
    pub marketplace_name: String,

    pub product_name: Option<String>,
    pub product_price: Option<String>,
    pub product_description: Option<String>,
    pub product_images: Option<Vec<String>>,
    pub probability: Option<f64>,

    pub classifications: HashMap<String, i32>,

    filtered: bool,
    filtered_at_stage: Option<FilterReason>,
}

#[derive(Deserialize)]
struct RawProductItem {
    search_term: String,
    search_term_type: SearchTermType,
    url: String,
    domain: String,
    marketplace_name: String,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    product_price: Option<String>,
    #[serde(default)]
    product_description: Option<String>,
    #[serde(default)]
    product_images: Option<Vec<String>>,
    #[serde(default)]
    probability: Option<f64>,
    #[serde(default)]
    classifications: HashMap<String, i32>,
    #[serde(default)]
    filtered: bool,
    #[serde(default)]
    filtered_at_stage: Option<FilterReason>,
}

impl TryFrom<RawProductItem> for ProductItem {
    type Error = String;

    fn try_from(raw: RawProductItem) -> Result<Self, Self::Error> {
        if raw.filtered != raw.filtered_at_stage.is_some() {
            return Err(format!(
                "product {}: filtered is {} but filtered_at_stage is {:?}",
                raw.url, raw.filtered, raw.filtered_at_stage
            ));
        }
        Ok(Self {
            search_term: raw.search_term,
            search_term_type: raw.search_term_type,
            url: raw.url,
            domain: raw.domain,
            marketplace_name: raw.marketplace_name,
            product_name: raw.product_name,
            product_price: raw.product_price,
            product_description: raw.product_description,
            product_images: raw.product_images,
            probability: raw.probability,
            classifications: raw.classifications,
            filtered: raw.filtered,
            filtered_at_stage: raw.filtered_at_stage,
        })
    }
}

impl ProductItem {
    /// Create an unfiltered item.
    pub fn new(
        search_term: impl Into<String>,
        search_term_type: SearchTermType,
        url: impl Into<String>,
        domain: impl Into<String>,
        marketplace_name: impl Into<String>,
    ) -> Self {
        Self {
            search_term: search_term.into(),
            search_term_type,
            url: url.into(),
            domain: domain.into(),
            marketplace_name: marketplace_name.into(),
            product_name: None,
            product_price: None,
            product_description: None,
            product_images: None,
            probability: None,
            classifications: HashMap::new(),
            filtered: false,
            filtered_at_stage: None,
        }
    }

    /// Wrap a search result, carrying the task's provenance and any filter flag.
    pub fn from_serp(task: &SearchTask, result: SerpResult) -> Self {
        let reason = result.filtered_at_stage();
        let mut item = Self::new(
            task.search_term.clone(),
            task.search_term_type,
            result.url,
            result.domain,
            result.marketplace_name,
        );
        if let Some(reason) = reason {
            item.mark_filtered(reason);
        }
        item
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn search_term_type(&self) -> SearchTermType {
        self.search_term_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_filtered(&self) -> bool {
        self.filtered
    }

    pub fn filtered_at_stage(&self) -> Option<FilterReason> {
        self.filtered_at_stage
    }

    /// Mark the item filtered. No-op when it is already filtered.
    pub fn mark_filtered(&mut self, reason: FilterReason) {
        if self.filtered {
            return;
        }
        self.filtered = true;
        self.filtered_at_stage = Some(reason);
    }

    /// Copy extracted detail fields onto the item.
    pub fn apply_details(&mut self, details: ProductDetails) {
        self.product_name = details.name;
        self.product_price = details.price;
        self.product_description = details.description;
        self.product_images = details.images;
        self.probability = details.probability;
    }
}
