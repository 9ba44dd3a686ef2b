//! SerpAPI-backed search collaborator.
//!
//! Marketplace allow-lists and exclusions are pushed into the Google query
//! as `site:` operators; the locale rule and exclusions are then applied
//! again to the returned links, which are flagged rather than dropped.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::retry::{error_for_status, with_retries};
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::security::SecretString;
use crate::traits::searcher::SearchCollaborator;
use crate::types::{
    config::RetryPolicy,
    locale::{normalize_domain, Host, Language, Location},
    product::{FilterReason, SerpResult},
};

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search";
const SERPAPI_ENGINE: &str = "google";

/// Marketplace name for results not matching any configured marketplace.
pub const DEFAULT_MARKETPLACE: &str = "Google";

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    link: Option<String>,
}

/// Google search through SerpAPI.
#[derive(Debug, Clone)]
pub struct SerpApi {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    retry: RetryPolicy,
}

impl SerpApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::new(api_key),
            endpoint: SERPAPI_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point at a different endpoint (proxies, local fakes).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_links(
        &self,
        query: &str,
        language: &Language,
        location: &Location,
        num_results: usize,
    ) -> CollaboratorResult<Vec<String>> {
        let num = num_results.to_string();
        let params = [
            ("engine", SERPAPI_ENGINE),
            ("q", query),
            ("num", num.as_str()),
            ("location", location.name.as_str()),
            ("hl", language.code.as_str()),
            ("gl", location.code.as_str()),
            ("api_key", self.api_key.expose()),
        ];

        let client = &self.client;
        let endpoint = self.endpoint.as_str();
        let params = &params;
        let response = with_retries(&self.retry, "serpapi.search", move || async move {
            let response = client.get(endpoint).query(params).send().await?;
            let body = error_for_status(response).await?.json::<SerpResponse>().await?;
            Ok::<_, CollaboratorError>(body)
        })
        .await?;

        Ok(response
            .organic_results
            .into_iter()
            .filter_map(|r| r.link)
            .collect())
    }
}

#[async_trait]
impl SearchCollaborator for SerpApi {
    async fn search(
        &self,
        term: &str,
        language: &Language,
        location: &Location,
        num_results: usize,
        marketplaces: Option<&[Host]>,
        excluded_urls: Option<&[Host]>,
    ) -> CollaboratorResult<Vec<SerpResult>> {
        let query = build_query(term, marketplaces, excluded_urls);
        info!(query = %query, num_results, "Performing SerpAPI search");

        let links = self
            .fetch_links(&query, language, location, num_results)
            .await?;
        let results: Vec<SerpResult> = links
            .iter()
            .filter_map(|link| to_serp_result(link, location, marketplaces, excluded_urls))
            .take(num_results)
            .collect();

        debug!(
            links = links.len(),
            results = results.len(),
            filtered = results.iter().filter(|r| r.is_filtered()).count(),
            "SerpAPI search finished"
        );
        Ok(results)
    }
}

/// `term (site:a OR site:b) -site:x` for the given marketplaces and exclusions.
pub fn build_query(term: &str, marketplaces: Option<&[Host]>, excluded: Option<&[Host]>) -> String {
    let mut query = term.trim().to_string();

    let sites: Vec<String> = marketplaces
        .unwrap_or_default()
        .iter()
        .flat_map(|host| host.domains.iter())
        .map(|domain| format!("site:{domain}"))
        .collect();
    if !sites.is_empty() {
        query.push_str(&format!(" ({})", sites.join(" OR ")));
    }

    for domain in excluded.unwrap_or_default().iter().flat_map(|h| h.domains.iter()) {
        query.push_str(&format!(" -site:{domain}"));
    }
    query
}

/// Whether `url` plausibly targets `location`: a `.{code}` domain or `.com`.
pub fn matches_locale(url: &str, location: &Location) -> bool {
    let tld = format!(".{}", location.code);
    url.contains(&format!("{tld}/")) || url.ends_with(&tld) || url.contains(".com")
}

fn to_serp_result(
    link: &str,
    location: &Location,
    marketplaces: Option<&[Host]>,
    excluded: Option<&[Host]>,
) -> Option<SerpResult> {
    let domain = match url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().and_then(normalize_domain))
    {
        Some(domain) => domain,
        None => {
            warn!(link, "Skipping search result without a usable host");
            return None;
        }
    };

    let marketplace_name = marketplaces
        .unwrap_or_default()
        .iter()
        .find(|host| host.matches(&domain))
        .map_or(DEFAULT_MARKETPLACE, |host| host.name.as_str())
        .to_string();

    let result = SerpResult::new(link, domain.clone(), marketplace_name);
    let excluded = excluded
        .unwrap_or_default()
        .iter()
        .any(|host| host.matches(&domain));

    Some(if excluded {
        result.filtered_by(FilterReason::SerpExcludedUrl)
    } else if !matches_locale(link, location) {
        result.filtered_by(FilterReason::SerpLocale)
    } else {
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switzerland() -> Location {
        Location::new("Switzerland", "CH")
    }

    #[test]
    fn test_build_query_with_sites() {
        let marketplaces = vec![Host::new("Galaxus", "galaxus.ch, digitec.ch")];
        let excluded = vec![Host::new("Ricardo", "ricardo.ch")];

        let query = build_query(
            " sildenafil ",
            Some(marketplaces.as_slice()),
            Some(excluded.as_slice()),
        );
        assert_eq!(
            query,
            "sildenafil (site:digitec.ch OR site:galaxus.ch) -site:ricardo.ch"
        );
        assert_eq!(build_query("sildenafil", None, None), "sildenafil");
    }

    #[test]
    fn test_locale_rule() {
        let ch = switzerland();
        assert!(matches_locale("https://www.shop.ch/product/1", &ch));
        assert!(matches_locale("https://shop.ch", &ch));
        assert!(matches_locale("https://amazon.com/dp/1", &ch));
        assert!(!matches_locale("https://shop.de/product/1", &ch));
    }

    #[test]
    fn test_serp_result_flags() {
        let ch = switzerland();
        let marketplaces = vec![Host::new("Galaxus", "galaxus.ch")];
        let excluded = vec![Host::new("Ebay", "ebay.ch")];

        let kept = to_serp_result(
            "https://www.galaxus.ch/p/1",
            &ch,
            Some(marketplaces.as_slice()),
            Some(excluded.as_slice()),
        )
        .unwrap();
        assert_eq!(kept.domain, "galaxus.ch");
        assert_eq!(kept.marketplace_name, "Galaxus");
        assert!(!kept.is_filtered());

        let foreign = to_serp_result("https://shop.de/p/1", &ch, None, None).unwrap();
        assert_eq!(foreign.marketplace_name, DEFAULT_MARKETPLACE);
        assert_eq!(foreign.filtered_at_stage(), Some(FilterReason::SerpLocale));

        let banned = to_serp_result(
            "https://www.ebay.ch/itm/1",
            &ch,
            None,
            Some(excluded.as_slice()),
        )
        .unwrap();
        assert_eq!(banned.filtered_at_stage(), Some(FilterReason::SerpExcludedUrl));

        assert!(to_serp_result("not a url", &ch, None, None).is_none());
    }
}
