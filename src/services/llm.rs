use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("model {name} is not known. Choose from {known:?}")]
    UnknownModel { name: String, known: Vec<&'static str> },
    #[error("no tokenizer for model {0}: {1}")]
    Tokenizer(String, String),
}

impl LlmError {
    /// Transient failures are recognised by their message alone, whatever the variant.
    pub fn is_rate_limit(&self) -> bool {
        self.to_string().to_lowercase().contains("rate limit")
    }
}

/// A text-completion backend: one system prompt, one user instruction, one reply.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        instruction: &str,
    ) -> Result<String, LlmError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Self {
        OpenAiClient {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        instruction: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.api_url);
        debug!(model, %url, "chat completion request");

        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": instruction},
                ],
            }));

        // Local OpenAI-compatible servers usually run without a key
        if let Some(key) = &self.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = request_builder.send().await?;

        let status = response.status().as_u16();
        if status == 429 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited(body));
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::Parse("missing choices[0].message.content".into()))?
            .to_string();

        Ok(content)
    }
}
