use std::fmt;
use std::sync::Arc;

use crate::services::llm::{CompletionClient, LlmError};
use crate::services::tokenizer::Encoder;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub max_context_tokens: usize,
    pub cost_per_token: f64,
}

pub const KNOWN_MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "gpt-3.5-turbo",
        max_context_tokens: 16_385,
        cost_per_token: 0.5 / 1_000_000.0,
    },
    ModelSpec {
        name: "gpt-4o",
        max_context_tokens: 128_000,
        cost_per_token: 5.0 / 1_000_000.0,
    },
    ModelSpec {
        name: "gpt-4o-mini",
        max_context_tokens: 128_000,
        cost_per_token: 0.15 / 1_000_000.0,
    },
];

impl ModelSpec {
    pub fn encoder(&self) -> Result<Encoder, LlmError> {
        Encoder::for_model(self.name)
    }

    pub fn cost_of(&self, tokens: usize) -> f64 {
        tokens as f64 * self.cost_per_token
    }
}

pub fn lookup(name: &str) -> Result<&'static ModelSpec, LlmError> {
    KNOWN_MODELS
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| LlmError::UnknownModel {
            name: name.to_string(),
            known: KNOWN_MODELS.iter().map(|spec| spec.name).collect(),
        })
}

/// A validated model identity together with the client that serves it.
///
/// Profiles are only built from names found in [`KNOWN_MODELS`], so code that
/// holds one never has to re-check the model.
#[derive(Clone)]
pub struct ModelProfile {
    name: String,
    max_context_tokens: usize,
    cost_per_token: f64,
    encoder: Encoder,
    client: Arc<dyn CompletionClient>,
}

impl fmt::Debug for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelProfile")
            .field("name", &self.name)
            .field("max_context_tokens", &self.max_context_tokens)
            .field("cost_per_token", &self.cost_per_token)
            .finish()
    }
}

impl ModelProfile {
    pub fn from_name(name: &str, client: Arc<dyn CompletionClient>) -> Result<Self, LlmError> {
        let spec = lookup(name)?;
        Ok(ModelProfile {
            name: spec.name.to_string(),
            max_context_tokens: spec.max_context_tokens,
            cost_per_token: spec.cost_per_token,
            encoder: spec.encoder()?,
            client,
        })
    }

    /// Same model, smaller advertised context window.
    #[cfg(test)]
    pub fn with_context_window(mut self, max_context_tokens: usize) -> Self {
        self.max_context_tokens = max_context_tokens;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_context_tokens(&self) -> usize {
        self.max_context_tokens
    }

    pub fn cost_per_token(&self) -> f64 {
        self.cost_per_token
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub async fn call(&self, system_prompt: &str, instruction: &str) -> Result<String, LlmError> {
        self.client
            .complete(&self.name, system_prompt, instruction)
            .await
    }
}
