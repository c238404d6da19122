//! OpenAI-compatible backend
//!
//! Speaks the `/v1/chat/completions` API. Used for Qwen through Alibaba
//! DashScope's compatible mode, and for any self-hosted server with the same
//! API (vLLM, LocalAI, llama-server).

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::parse_extraction;
use super::types::AIExtraction;
use super::{render_prompt, transaction_vars, AIBackend};

pub const QWEN_DEFAULT_HOST: &str = "https://dashscope-intl.aliyuncs.com/compatible-mode";
pub const QWEN_DEFAULT_MODEL: &str = "qwen-plus";

#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        let mut backend = Self::new(base_url, model);
        backend.api_key = Some(api_key.to_string());
        backend
    }

    /// Create from `OPENAI_COMPATIBLE_*` environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let mut backend = Self::new(&host, &model);
        backend.api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();
        Some(backend)
    }

    /// Create a Qwen client from `QWEN_*` environment variables
    ///
    /// Required: `QWEN_API_KEY`
    pub fn qwen_from_env() -> Option<Self> {
        let api_key = std::env::var("QWEN_API_KEY").ok()?;
        let host = std::env::var("QWEN_HOST").unwrap_or_else(|_| QWEN_DEFAULT_HOST.to_string());
        let model = std::env::var("QWEN_MODEL").unwrap_or_else(|_| QWEN_DEFAULT_MODEL.to_string());
        Some(Self::with_api_key(&host, &model, &api_key))
    }

    async fn chat_completion(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.1),
            max_tokens: Some(1024),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Ai(format!("OpenAI API error {}: {}", status, body)));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Ai("No response from OpenAI API".into()))
    }
}

fn system_and_user(system: Option<String>, user: ChatContent) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: ChatContent::Text(system),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: user,
    });
    messages
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Text or multimodal content
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn extract_transaction(
        &self,
        text: &str,
        today: NaiveDate,
        categories: &[String],
    ) -> Result<AIExtraction> {
        let today = today.to_string();
        let categories = categories.join(", ");
        let prompt = render_prompt(
            &self.prompts,
            PromptId::ExtractTransaction,
            &transaction_vars(text, &today, &categories),
        )?;

        let response = self
            .chat_completion(system_and_user(prompt.system, ChatContent::Text(prompt.user)))
            .await?;
        debug!("OpenAI-compatible extraction response: {}", response);

        parse_extraction(&response)
    }

    async fn extract_receipt(
        &self,
        image: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<AIExtraction> {
        let mut vars = std::collections::HashMap::new();
        if let Some(caption) = caption {
            vars.insert("caption", caption);
        }
        let prompt = render_prompt(&self.prompts, PromptId::ExtractReceipt, &vars)?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let content = ChatContent::Parts(vec![
            ContentPart::Text { text: prompt.user },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", mime_type, encoded),
                },
            },
        ]);

        let response = self
            .chat_completion(system_and_user(prompt.system, content))
            .await?;
        debug!("OpenAI-compatible receipt response: {}", response);

        parse_extraction(&response)
    }

    async fn health_check(&self) -> bool {
        let mut req = self.http_client.get(format!("{}/v1/models", self.base_url));
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        matches!(req.send().await, Ok(resp) if resp.status().is_success())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
