//! Pluggable AI backend for messages the rule parser cannot read
//!
//! - `AIBackend` trait: the operations every backend provides
//! - `AIClient` enum: Clone + static dispatch over the concrete backends
//! - Backends: `GeminiBackend`, `OpenAICompatibleBackend` (Qwen and friends),
//!   `MockBackend`
//!
//! # Configuration
//!
//! - `AI_BACKEND`: gemini (default), qwen, openai_compatible, mock
//! - `GEMINI_API_KEY` (required for gemini), `GEMINI_MODEL`, `GEMINI_HOST`
//! - `QWEN_API_KEY` (required for qwen), `QWEN_MODEL`, `QWEN_HOST`
//! - `OPENAI_COMPATIBLE_HOST` (required), `OPENAI_COMPATIBLE_MODEL`,
//!   `OPENAI_COMPATIBLE_API_KEY`

mod gemini;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};

#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Read a free-text chat message
    ///
    /// `categories` are the user's category names, offered as hints.
    async fn extract_transaction(
        &self,
        text: &str,
        today: NaiveDate,
        categories: &[String],
    ) -> Result<AIExtraction>;

    /// Read a receipt or transfer-slip photo
    async fn extract_receipt(
        &self,
        image: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<AIExtraction>;

    async fn health_check(&self) -> bool;

    fn model(&self) -> &str;

    fn host(&self) -> &str;
}

#[derive(Clone)]
pub enum AIClient {
    /// Google Gemini `generateContent` API
    Gemini(GeminiBackend),
    /// OpenAI chat completions (Qwen via DashScope compatible mode, vLLM, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    Mock(MockBackend),
}

impl AIClient {
    /// Create an AI client from environment variables
    ///
    /// Returns None when the selected backend is missing its required settings.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "gemini".to_string());

        match backend.to_lowercase().as_str() {
            "gemini" => GeminiBackend::from_env().map(AIClient::Gemini),
            "qwen" | "dashscope" => OpenAICompatibleBackend::qwen_from_env().map(AIClient::OpenAICompatible),
            "openai_compatible" | "openai" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to gemini");
                GeminiBackend::from_env().map(AIClient::Gemini)
            }
        }
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    /// Backend name for logs and health output
    pub fn backend_name(&self) -> &'static str {
        match self {
            AIClient::Gemini(_) => "gemini",
            AIClient::OpenAICompatible(_) => "openai_compatible",
            AIClient::Mock(_) => "mock",
        }
    }
}

#[async_trait]
impl AIBackend for AIClient {
    async fn extract_transaction(
        &self,
        text: &str,
        today: NaiveDate,
        categories: &[String],
    ) -> Result<AIExtraction> {
        match self {
            AIClient::Gemini(b) => b.extract_transaction(text, today, categories).await,
            AIClient::OpenAICompatible(b) => b.extract_transaction(text, today, categories).await,
            AIClient::Mock(b) => b.extract_transaction(text, today, categories).await,
        }
    }

    async fn extract_receipt(
        &self,
        image: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<AIExtraction> {
        match self {
            AIClient::Gemini(b) => b.extract_receipt(image, mime_type, caption).await,
            AIClient::OpenAICompatible(b) => b.extract_receipt(image, mime_type, caption).await,
            AIClient::Mock(b) => b.extract_receipt(image, mime_type, caption).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Gemini(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Gemini(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }
}

/// A prompt rendered for one request
pub(crate) struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

/// Render a prompt from a shared library
pub(crate) fn render_prompt(
    prompts: &RwLock<PromptLibrary>,
    id: PromptId,
    vars: &HashMap<&str, &str>,
) -> Result<RenderedPrompt> {
    let mut prompts = prompts
        .write()
        .map_err(|_| Error::Ai("Failed to acquire prompt library lock".into()))?;
    let prompt = prompts.get(id)?;
    Ok(RenderedPrompt {
        system: prompt.system_section().map(str::to_string),
        user: prompt.render_user(vars),
    })
}

/// Template variables for `extract_transaction`
pub(crate) fn transaction_vars<'a>(
    text: &'a str,
    today: &'a str,
    categories: &'a str,
) -> HashMap<&'a str, &'a str> {
    let mut vars = HashMap::new();
    vars.insert("message", text);
    vars.insert("today", today);
    vars.insert("categories", categories);
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_mock() {
        std::env::set_var("AI_BACKEND", "mock");
        let client = AIClient::from_env().unwrap();
        assert_eq!(client.backend_name(), "mock");
        std::env::remove_var("AI_BACKEND");
    }

    #[tokio::test]
    async fn test_client_delegates_to_backend() {
        let client = AIClient::mock();
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let extraction = client
            .extract_transaction("abis makan bakso 25 rebu", today, &[])
            .await
            .unwrap();
        assert_eq!(extraction.kind, ExtractionKind::Expense);
        assert_eq!(extraction.amount, Some(25_000));
        assert!(client.health_check().await);
        assert_eq!(client.model(), "mock");
    }
}
