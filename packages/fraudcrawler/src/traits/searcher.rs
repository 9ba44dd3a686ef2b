//! Search collaborator: turns a term into candidate product URLs.

use async_trait::async_trait;

use crate::error::CollaboratorResult;
use crate::types::{
    locale::{Host, Language, Location},
    product::SerpResult,
};

/// Search provider used by the search stage.
///
/// Implementations apply their own locale inclusion rule and marketplace
/// allow/deny-listing. Records that fail those rules are returned flagged
/// (see [`SerpResult::filtered_by`]) rather than dropped.
#[async_trait]
pub trait SearchCollaborator: Send + Sync {
    async fn search(
        &self,
        term: &str,
        language: &Language,
        location: &Location,
        num_results: usize,
        marketplaces: Option<&[Host]>,
        excluded_urls: Option<&[Host]>,
    ) -> CollaboratorResult<Vec<SerpResult>>;
}
