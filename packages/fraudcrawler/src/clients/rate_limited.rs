//! Rate-limited collaborator wrapper.
//!
//! Wraps a search or detail collaborator with a `governor` token bucket so
//! that a pool of stage workers shares one request budget.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::traits::{detail::DetailCollaborator, searcher::SearchCollaborator};
use crate::types::{
    locale::{Host, Language, Location},
    product::{ProductDetails, SerpResult},
};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A collaborator wrapper that enforces a request rate.
pub struct RateLimited<C> {
    inner: C,
    limiter: Arc<DefaultRateLimiter>,
    max_wait: Option<Duration>,
}

impl<C> RateLimited<C> {
    pub fn new(inner: C, requests_per_second: NonZeroU32) -> Self {
        Self::with_quota(inner, Quota::per_second(requests_per_second))
    }

    pub fn with_quota(inner: C, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
            max_wait: None,
        }
    }

    /// Allow bursts of up to `burst` requests.
    pub fn with_burst(inner: C, requests_per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        Self::with_quota(inner, Quota::per_second(requests_per_second).allow_burst(burst))
    }

    /// Fail with [`CollaboratorError::RateLimited`] instead of waiting longer than `max_wait`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn wait_for_permit(&self) -> CollaboratorResult<()> {
        match self.max_wait {
            Some(max_wait) => tokio::time::timeout(max_wait, self.limiter.until_ready())
                .await
                .map_err(|_| CollaboratorError::RateLimited),
            None => {
                self.limiter.until_ready().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<C: DetailCollaborator> DetailCollaborator for RateLimited<C> {
    async fn fetch(&self, url: &str) -> CollaboratorResult<ProductDetails> {
        self.wait_for_permit().await?;
        self.inner.fetch(url).await
    }

    fn keep(&self, details: &ProductDetails, threshold: f64) -> bool {
        self.inner.keep(details, threshold)
    }
}

#[async_trait]
impl<C: SearchCollaborator> SearchCollaborator for RateLimited<C> {
    async fn search(
        &self,
        term: &str,
        language: &Language,
        location: &Location,
        num_results: usize,
        marketplaces: Option<&[Host]>,
        excluded_urls: Option<&[Host]>,
    ) -> CollaboratorResult<Vec<SerpResult>> {
        self.wait_for_permit().await?;
        self.inner
            .search(term, language, location, num_results, marketplaces, excluded_urls)
            .await
    }
}

/// Extension trait for easy rate limiting.
pub trait RateLimitExt: Sized {
    fn rate_limited(self, requests_per_second: NonZeroU32) -> RateLimited<Self> {
        RateLimited::new(self, requests_per_second)
    }
}

impl<C: Sized> RateLimitExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDetail;
    use std::time::Instant;

    fn rps(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limiting() {
        let detail = MockDetail::new()
            .with_probability("https://shop.ch/1", 0.9)
            .with_probability("https://shop.ch/2", 0.9)
            .with_probability("https://shop.ch/3", 0.9)
            .rate_limited(rps(2));

        let start = Instant::now();
        for url in ["https://shop.ch/1", "https://shop.ch/2", "https://shop.ch/3"] {
            detail.fetch(url).await.unwrap();
        }
        let elapsed = start.elapsed();

        // first is immediate, the 2nd and 3rd wait
        assert!(elapsed.as_millis() >= 500, "Rate limiting not working: {:?}", elapsed);
        assert_eq!(detail.inner().calls().len(), 3);
    }

    #[tokio::test]
    async fn test_max_wait_reports_rate_limited() {
        let detail = RateLimited::new(MockDetail::new(), rps(1))
            .with_max_wait(Duration::from_millis(10));

        assert!(detail.fetch("https://shop.ch/a").await.is_ok());
        let second = detail.fetch("https://shop.ch/b").await;
        assert!(matches!(second, Err(CollaboratorError::RateLimited)));
        assert_eq!(detail.inner().calls().len(), 1);
    }

    #[test]
    fn test_keep_is_delegated() {
        let detail = MockDetail::new().rate_limited(rps(5));
        let details = ProductDetails {
            probability: Some(0.2),
            ..Default::default()
        };
        assert!(detail.keep(&details, 0.1));
        assert!(!detail.keep(&details, 0.3));
    }
}
