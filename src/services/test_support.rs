use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::services::llm::{CompletionClient, LlmError};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub system_prompt: String,
    pub instruction: String,
}

type Responder = Box<dyn Fn(&RecordedCall) -> Option<Result<String, LlmError>> + Send + Sync>;

/// Test double that replays queued replies, falls back to a responder
/// closure, and records every call it receives.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn replying<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(results: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        ScriptedClient {
            replies: Mutex::new(results.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&RecordedCall) -> Option<Result<String, LlmError>> + Send + Sync + 'static,
    {
        ScriptedClient {
            responder: Some(Box::new(responder)),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, model: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.model == model)
            .collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        instruction: &str,
    ) -> Result<String, LlmError> {
        let call = RecordedCall {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            instruction: instruction.to_string(),
        };
        self.calls.lock().unwrap().push(call.clone());

        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return reply;
        }
        if let Some(reply) = self.responder.as_ref().and_then(|f| f(&call)) {
            return reply;
        }
        Err(LlmError::Parse("no scripted reply left".into()))
    }
}
