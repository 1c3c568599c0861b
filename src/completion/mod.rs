//! Completion provider trait and implementations
//!
//! The fallback pipeline talks to an external text-completion service
//! through this trait. The provider is injected by whoever builds the
//! orchestrator, so tests can swap in a scripted one.

use crate::error::AssistantError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Trait for text completion (single attempt, no retry)
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Deterministic provider for tests and offline runs.
/// Replies with a fixed text (or fails) and records every request.
pub struct ScriptedProvider {
    reply: std::result::Result<String, String>,
    received: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if let Ok(mut received) = self.received.lock() {
            received.push(request.clone());
        }

        self.reply
            .clone()
            .map_err(AssistantError::CompletionError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_instruction: "You are a helpful financial assistant.".to_string(),
            user_prompt: "How should I budget?".to_string(),
            max_output_tokens: 128,
            temperature: 0.3,
        }
    }

    #[test]
    fn test_scripted_reply_is_recorded() {
        let provider = ScriptedProvider::replying("Spend less on food.");
        let answer = tokio_test::block_on(provider.complete(&request())).unwrap();

        assert_eq!(answer, "Spend less on food.");
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.requests()[0].user_prompt, "How should I budget?");
    }

    #[test]
    fn test_scripted_failure() {
        let provider = ScriptedProvider::failing("quota exceeded");
        let result = tokio_test::block_on(provider.complete(&request()));

        assert!(matches!(result, Err(AssistantError::CompletionError(m)) if m == "quota exceeded"));
        assert_eq!(provider.call_count(), 1);
    }
}
