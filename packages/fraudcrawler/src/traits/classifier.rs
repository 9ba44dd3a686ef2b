//! Classifier collaborator: assigns an integer class to a product under a prompt.

use async_trait::async_trait;

use crate::error::CollaboratorResult;
use crate::types::config::Prompt;

/// LLM-backed classifier used by the classification stage.
///
/// The stage only calls this with both `name` and `description` present,
/// and checks the returned class against `prompt.allowed_classes` itself.
#[async_trait]
pub trait ClassifierCollaborator: Send + Sync {
    async fn classify(
        &self,
        prompt: &Prompt,
        url: &str,
        name: &str,
        description: &str,
    ) -> CollaboratorResult<i32>;
}
