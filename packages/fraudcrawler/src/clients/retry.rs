//! Retry loop and status handling shared by the HTTP collaborators.

use std::future::Future;
use tracing::warn;

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::types::config::RetryPolicy;

/// Run `call` until it succeeds, fails permanently, or attempts run out.
///
/// Only errors for which [`CollaboratorError::is_retryable`] holds are retried.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> CollaboratorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CollaboratorResult<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    error = %e,
                    "Collaborator call failed; retrying"
                );
                tokio::time::sleep(policy.retry_delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Turn a non-2xx response into [`CollaboratorError::Api`].
pub async fn error_for_status(
    response: reqwest::Response,
) -> CollaboratorResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Api {
        status: status.as_u16(),
        message,
    })
}
