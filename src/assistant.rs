//! LLM-backed text generation for reply emails and pricing checks.
//!
//! Everything here is optional: with no API key configured no request is
//! made, and callers always have a non-generated fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::email::text_to_html_paragraphs;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("LLM API key is not configured")]
    NotConfigured,

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("LLM returned no content")]
    EmptyResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: 300,
            timeout_seconds: 30,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenError>;
}

pub type DynCompletionClient = Arc<dyn CompletionClient>;

/// Client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiClient {
    config: LlmConfig,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();
        Self {
            config,
            api_key,
            client,
        }
    }

    /// Reads `OPENAI_API_KEY`, and lets `OPENAI_BASE_URL` / `OPENAI_MODEL`
    /// override the configured endpoint and model.
    pub fn from_env(mut config: LlmConfig) -> Self {
        if let Some(base_url) = crate::email::env_var("OPENAI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = crate::email::env_var("OPENAI_MODEL") {
            config.model = model;
        }
        Self::new(config, crate::email::env_var("OPENAI_API_KEY"))
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, GenError> {
        let api_key = self.api_key.as_deref().ok_or(GenError::NotConfigured)?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenError::Api { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(GenError::EmptyResponse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Booking,
    Inquiry,
}

#[derive(Debug, Clone)]
pub struct ReplyRequest<'a> {
    pub kind: ReplyKind,
    pub name: &'a str,
    pub message: Option<&'a str>,
    /// Extra facts for the model, e.g. the booked service.
    pub context: Option<&'a str>,
}

/// Writes the body of acknowledgement emails.
pub struct ReplyWriter {
    client: DynCompletionClient,
    company_name: String,
}

impl ReplyWriter {
    pub fn new(client: DynCompletionClient, company_name: impl Into<String>) -> Self {
        Self {
            client,
            company_name: company_name.into(),
        }
    }

    fn system_prompt(&self, kind: ReplyKind) -> String {
        let tone = match kind {
            ReplyKind::Booking => {
                "You confirm consultation bookings. Be warm and reassuring, restate what was \
                 booked, and say the team will confirm the exact time shortly."
            }
            ReplyKind::Inquiry => {
                "You acknowledge general inquiries. Be professional and helpful, briefly \
                 reflect the question back, and say the team will reply within 24-48 hours."
            }
        };
        format!(
            "You write short email replies on behalf of {}, an AI consulting company. {} \
             Write two or three short plain-text paragraphs. Do not include a greeting line, \
             a sign-off, links, or placeholders.",
            self.company_name, tone
        )
    }

    fn user_prompt(request: &ReplyRequest<'_>) -> String {
        let mut prompt = format!("Customer name: {}\n", request.name);
        if let Some(context) = request.context {
            prompt.push_str(&format!("Details: {}\n", context));
        }
        if let Some(message) = request.message {
            prompt.push_str(&format!("Their message:\n{}\n", message));
        }
        prompt
    }

    /// Generated reply as escaped HTML paragraphs.
    pub async fn generate(&self, request: &ReplyRequest<'_>) -> Result<String, GenError> {
        let text = self
            .client
            .complete(&self.system_prompt(request.kind), &Self::user_prompt(request))
            .await?;

        let html = text_to_html_paragraphs(&text);
        if html.is_empty() {
            return Err(GenError::EmptyResponse);
        }
        Ok(html)
    }

    /// `None` means "use the static template".
    pub async fn generate_reply(&self, request: &ReplyRequest<'_>) -> Option<String> {
        match self.generate(request).await {
            Ok(html) => Some(html),
            Err(GenError::NotConfigured) => {
                debug!("LLM not configured, using static reply template");
                None
            }
            Err(e) => {
                warn!("Reply generation failed, using static template: {}", e);
                None
            }
        }
    }
}
