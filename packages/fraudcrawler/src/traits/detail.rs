//! Detail collaborator: extracts product fields from a page.

use async_trait::async_trait;

use crate::error::CollaboratorResult;
use crate::types::product::ProductDetails;

/// Product-extraction provider used by the detail stage.
#[async_trait]
pub trait DetailCollaborator: Send + Sync {
    /// Fetch and extract product fields for `url`.
    async fn fetch(&self, url: &str) -> CollaboratorResult<ProductDetails>;

    /// Whether the extraction is confident enough to keep.
    ///
    /// Defaults to `probability > threshold`; a missing probability is never kept.
    fn keep(&self, details: &ProductDetails, threshold: f64) -> bool {
        details.probability.is_some_and(|p| p > threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDetail;

    #[test]
    fn test_default_keep_threshold() {
        let detail = MockDetail::new();
        let confident = ProductDetails {
            probability: Some(0.5),
            ..Default::default()
        };
        let unknown = ProductDetails::default();

        assert!(detail.keep(&confident, 0.1));
        assert!(!detail.keep(&confident, 0.6));
        assert!(!detail.keep(&confident, 0.5));
        assert!(!detail.keep(&unknown, 0.0));
    }
}
