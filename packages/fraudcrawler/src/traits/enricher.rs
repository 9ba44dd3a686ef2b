//! Enrichment collaborator: expands a seed term into related terms.

use async_trait::async_trait;

use crate::error::CollaboratorResult;
use crate::types::locale::{Language, Location};

/// Keyword-suggestion provider.
#[async_trait]
pub trait EnrichmentCollaborator: Send + Sync {
    /// Return at most `n_terms` related terms, ranked by descending
    /// estimated volume, deduplicated, never containing `term` itself.
    async fn apply(
        &self,
        term: &str,
        language: &Language,
        location: &Location,
        n_terms: usize,
    ) -> CollaboratorResult<Vec<String>>;
}
