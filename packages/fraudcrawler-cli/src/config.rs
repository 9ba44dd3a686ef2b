use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use fraudcrawler::security::SecretString;
use fraudcrawler::types::config::DEFAULT_MODEL;
use fraudcrawler::{OrchestratorConfig, RetryPolicy};

/// Credentials and tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub serpapi_key: SecretString,
    pub dataforseo_user: String,
    pub dataforseo_pwd: SecretString,
    pub zyteapi_key: SecretString,
    pub openaiapi_key: SecretString,
    pub orchestrator: OrchestratorConfig,
    pub retry: RetryPolicy,
    pub model: String,
    /// Shared request budget for the Zyte API, if any.
    pub zyte_requests_per_second: Option<NonZeroU32>,
}

impl Settings {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{name} must be set"))
        };

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig::default()
            .with_search_workers(
                parse_var(&lookup, "FRAUDCRAWLER_N_SEARCH_WORKERS")?
                    .unwrap_or(defaults.n_search_workers),
            )
            .with_detail_workers(
                parse_var(&lookup, "FRAUDCRAWLER_N_DETAIL_WORKERS")?
                    .unwrap_or(defaults.n_detail_workers),
            )
            .with_classify_workers(
                parse_var(&lookup, "FRAUDCRAWLER_N_CLASSIFY_WORKERS")?
                    .unwrap_or(defaults.n_classify_workers),
            )
            .with_probability_threshold(
                parse_var(&lookup, "FRAUDCRAWLER_PROBABILITY_THRESHOLD")?
                    .unwrap_or(defaults.probability_threshold),
            );

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            parse_var(&lookup, "FRAUDCRAWLER_MAX_RETRIES")?.unwrap_or(retry_defaults.max_retries),
            parse_var(&lookup, "FRAUDCRAWLER_RETRY_DELAY_SECS")?
                .map(Duration::from_secs_f64)
                .unwrap_or(retry_defaults.retry_delay),
        );

        Ok(Self {
            serpapi_key: required("SERPAPI_KEY")?.into(),
            dataforseo_user: required("DATAFORSEO_USER")?,
            dataforseo_pwd: required("DATAFORSEO_PWD")?.into(),
            zyteapi_key: required("ZYTEAPI_KEY")?.into(),
            openaiapi_key: required("OPENAIAPI_KEY")?.into(),
            orchestrator,
            retry,
            model: lookup("FRAUDCRAWLER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            zyte_requests_per_second: parse_var(&lookup, "FRAUDCRAWLER_ZYTE_RPS")?,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a valid number, got {value:?}"))
        })
        .transpose()
}
