//! Chat-completion provider (DeepSeek and other OpenAI-compatible endpoints)
//!
//! Every text is sent as its own request: a system message describing the
//! task, a user message holding only the text. The reply is expected to be
//! the bare translation.
//!
//! The key comes from `DEEPSEEK_API_KEY`, or `OPENAI_API_KEY` when the first
//! one is not set.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, language_name, validate_locale};

pub const API_KEY_VAR: &str = "DEEPSEEK_API_KEY";
pub const FALLBACK_API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ChatCompletionProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    model: String,
    /// Extra instructions appended to the system prompt (domain, glossary)
    context: Option<String>,
    temperature: f32,
}

impl ChatCompletionProvider {
    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            context: None,
            temperature: 0.2,
        })
    }

    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .or_else(|_| std::env::var(FALLBACK_API_KEY_VAR))
            .map_err(|_| {
                MtError::ConfigError(format!(
                    "neither {} nor {} environment variable is set",
                    API_KEY_VAR, FALLBACK_API_KEY_VAR
                ))
            })?;
        Self::new(api_key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn system_prompt(&self, source_locale: &str, target_locale: &str) -> String {
        let mut prompt = format!(
            "You are a professional translator. Translate the user's text from {} into {}. \
             Keep numbers, codes, units and proper names intact. \
             Reply with the translation only, without explanations, notes or summaries.",
            language_name(source_locale),
            language_name(target_locale)
        );
        if let Some(context) = &self.context {
            prompt.push_str("\n\n");
            prompt.push_str(context);
        }
        prompt
    }

    async fn complete(&self, system: &str, text: &str) -> MtResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 429 {
                MtError::RateLimited(format!("API error ({}): {}", status, error_text))
            } else if status.is_client_error() {
                MtError::ConfigError(format!("API client error ({}): {}", status, error_text))
            } else {
                MtError::TranslationError(format!("API server error ({}): {}", status, error_text))
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            MtError::TranslationError(format!(
                "Failed to parse API response: {}",
                e.without_url()
            ))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                MtError::TranslationError("Invalid API response: no message content".to_string())
            })?;

        Ok(clean_reply(&content))
    }
}

/// Drop reasoning some models prepend in `<think>` tags and surrounding blanks
fn clean_reply(content: &str) -> String {
    let answer = match content.rfind("</think>") {
        Some(pos) => &content[pos + "</think>".len()..],
        None => content,
    };
    answer.trim().to_string()
}

impl std::fmt::Debug for ChatCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for ChatCompletionProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let system = self.system_prompt(source_locale, target_locale);
        let started = std::time::Instant::now();
        let translated = self.complete(&system, text).await?;
        debug!(
            "{} translated {} chars in {:.2}s",
            self.model,
            text.chars().count(),
            started.elapsed().as_secs_f64()
        );
        Ok(translated)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text, source_locale, target_locale).await?);
        }
        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "Chat Completion"
    }
}
