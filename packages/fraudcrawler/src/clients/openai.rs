//! OpenAI chat-completions classifier.
//!
//! Each prompt is answered with a single token that must parse as an integer.
//!
//! ```rust,ignore
//! let classifier = OpenAiClassifier::new("sk-...").with_model("gpt-4o-mini");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clients::retry::{error_for_status, with_retries};
use crate::error::{CollaboratorError, CollaboratorResult};
use crate::security::SecretString;
use crate::traits::classifier::ClassifierCollaborator;
use crate::types::config::{Prompt, RetryPolicy, DEFAULT_MODEL};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// LLM classifier using OpenAI chat completions.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAiClassifier {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::new(api_key),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (Azure, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> CollaboratorResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: 1,
        };

        let client = &self.client;
        let url = format!("{}/chat/completions", self.base_url);
        let url = url.as_str();
        let api_key = &self.api_key;
        let request = &request;
        let response = with_retries(&self.retry, "openai.chat", move || async move {
            let response = client
                .post(url)
                .bearer_auth(api_key.expose())
                .json(request)
                .send()
                .await?;
            let data = error_for_status(response).await?.json::<ChatResponse>().await?;
            Ok::<_, CollaboratorError>(data)
        })
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| CollaboratorError::Parse("empty response from OpenAI".into()))
    }
}

#[async_trait]
impl ClassifierCollaborator for OpenAiClassifier {
    async fn classify(
        &self,
        prompt: &Prompt,
        url: &str,
        name: &str,
        description: &str,
    ) -> CollaboratorResult<i32> {
        let user_prompt = prompt.render_user_prompt(url, name, description);
        let content = self.complete(&prompt.system_prompt, &user_prompt).await?;
        let class = parse_class(&content)?;
        debug!(url, prompt = %prompt.name, class, "Classified product");
        Ok(class)
    }
}

/// Parse a single-token class reply.
pub fn parse_class(content: &str) -> CollaboratorResult<i32> {
    let trimmed = content.trim();
    trimmed
        .parse()
        .map_err(|_| CollaboratorError::Parse(format!("non-integer class reply: {trimmed:?}")))
}
