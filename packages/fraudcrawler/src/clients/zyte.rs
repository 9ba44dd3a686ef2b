//! Zyte API-backed detail collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::retry::{error_for_status, with_retries};
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::security::SecretString;
use crate::traits::detail::DetailCollaborator;
use crate::types::{config::RetryPolicy, product::ProductDetails};

const ZYTE_ENDPOINT: &str = "https://api.zyte.com/v1/extract";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractRequest<'a> {
    url: &'a str,
    http_response_body: bool,
    product: bool,
    product_options: ProductOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    geolocation: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductOptions {
    extract_from: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    product: Option<ZyteProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct ZyteProduct {
    name: Option<String>,
    price: Option<String>,
    description: Option<String>,
    #[serde(default)]
    images: Option<Vec<ZyteImage>>,
    #[serde(default)]
    metadata: Option<ZyteMetadata>,
}

#[derive(Debug, Deserialize)]
struct ZyteImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ZyteMetadata {
    probability: Option<f64>,
}

impl From<ExtractResponse> for ProductDetails {
    fn from(response: ExtractResponse) -> Self {
        let product = response.product.unwrap_or_default();
        ProductDetails {
            name: product.name,
            price: product.price,
            description: product.description,
            images: product
                .images
                .map(|images| images.into_iter().map(|image| image.url).collect()),
            probability: product.metadata.and_then(|m| m.probability),
        }
    }
}

/// Product extraction through the Zyte API.
#[derive(Debug, Clone)]
pub struct ZyteApi {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    geolocation: Option<String>,
    retry: RetryPolicy,
}

impl ZyteApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::new(api_key),
            endpoint: ZYTE_ENDPOINT.to_string(),
            geolocation: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Fetch pages as seen from this country (ISO code, e.g. `"CH"`).
    pub fn with_geolocation(mut self, country: impl Into<String>) -> Self {
        self.geolocation = Some(country.into().to_uppercase());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl DetailCollaborator for ZyteApi {
    async fn fetch(&self, url: &str) -> CollaboratorResult<ProductDetails> {
        let request = ExtractRequest {
            url,
            http_response_body: true,
            product: true,
            product_options: ProductOptions {
                extract_from: "httpResponseBody",
            },
            geolocation: self.geolocation.as_deref(),
        };

        let client = &self.client;
        let endpoint = self.endpoint.as_str();
        let api_key = &self.api_key;
        let request = &request;
        let response = with_retries(&self.retry, "zyte.extract", move || async move {
            let response = client
                .post(endpoint)
                .basic_auth(api_key.expose(), Some(""))
                .json(request)
                .send()
                .await?;
            let data = error_for_status(response).await?.json::<ExtractResponse>().await?;
            Ok::<_, CollaboratorError>(data)
        })
        .await?;

        let details = ProductDetails::from(response);
        debug!(url, probability = ?details.probability, "Fetched product details");
        Ok(details)
    }
}
