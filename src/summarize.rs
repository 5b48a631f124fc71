use std::sync::Arc;

use async_trait::async_trait;
use eyre::{Result, bail};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::error::SummarizeError;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 4000;
pub const DEFAULT_HF_MODEL: &str = "Falconsai/text_summarization";

const HF_API_BASE: &str = "https://api-inference.huggingface.co/models";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes video transcripts. \
Write a short plain-text summary that captures the key points and main arguments.";

/// Output length window, in the model's own length unit (tokens)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLength {
    pub min: u32,
    pub max: u32,
}

impl Default for SummaryLength {
    fn default() -> Self {
        Self { min: 30, max: 230 }
    }
}

/// Which summarization service to load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    #[value(name = "huggingface")]
    HuggingFace,
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
    None,
}

#[async_trait]
pub trait SummaryModel: Send + Sync {
    fn name(&self) -> &str;

    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String>;
}

/// Builds a model; may be slow (remote model warm-up)
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn SummaryModel>>;
}

/// Load-once summarization handle.
///
/// The first call to [`Summarizer::load`] runs the loader; its outcome,
/// success or failure, is kept for the life of the handle.
pub struct Summarizer {
    loader: Box<dyn ModelLoader>,
    model: OnceCell<Result<Arc<dyn SummaryModel>, String>>,
    max_input_chars: usize,
    length: SummaryLength,
}

impl Summarizer {
    pub fn new(loader: Box<dyn ModelLoader>, max_input_chars: usize, length: SummaryLength) -> Self {
        Self {
            loader,
            model: OnceCell::new(),
            max_input_chars,
            length,
        }
    }

    pub async fn load(&self) -> Result<Arc<dyn SummaryModel>, SummarizeError> {
        let outcome = self
            .model
            .get_or_init(|| async {
                match self.loader.load().await {
                    Ok(model) => {
                        info!("Summarization model ready: {}", model.name());
                        Ok(model)
                    }
                    Err(e) => {
                        warn!("Summarization model failed to load: {e:#}");
                        Err(format!("{e:#}"))
                    }
                }
            })
            .await;
        outcome.clone().map_err(SummarizeError::Unavailable)
    }

    /// True once a load has been attempted and succeeded
    pub fn is_available(&self) -> bool {
        matches!(self.model.get(), Some(Ok(_)))
    }

    pub async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let model = self.load().await?;
        let input = truncate_chars(text, self.max_input_chars);
        debug!(
            "Summarizing {} of {} chars with {}",
            input.chars().count(),
            text.chars().count(),
            model.name()
        );

        let summary = model
            .summarize(input, self.length)
            .await
            .map_err(|e| SummarizeError::Inference(format!("{e:#}")))?;

        let summary = summary.trim();
        if summary.is_empty() {
            return Err(SummarizeError::Inference("model returned an empty summary".to_string()));
        }
        Ok(summary.to_string())
    }
}

/// Longest prefix of `text` holding at most `max` chars
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Loads one of the HTTP-backed models
pub struct BackendLoader {
    client: reqwest::Client,
    backend: Backend,
    model: Option<String>,
}

impl BackendLoader {
    pub fn new(client: reqwest::Client, backend: Backend, model: Option<String>) -> Self {
        Self { client, backend, model }
    }
}

#[async_trait]
impl ModelLoader for BackendLoader {
    async fn load(&self) -> Result<Arc<dyn SummaryModel>> {
        match self.backend {
            Backend::HuggingFace => {
                let model = HuggingFaceModel::new(
                    self.client.clone(),
                    env_key(&["HF_TOKEN", "HUGGINGFACE_API_TOKEN"])?,
                    self.model.clone().unwrap_or_else(|| DEFAULT_HF_MODEL.to_string()),
                );
                model.warm_up().await?;
                Ok(Arc::new(model))
            }
            Backend::Anthropic => Ok(Arc::new(AnthropicModel {
                client: self.client.clone(),
                api_key: env_key(&["ANTHROPIC_API_KEY"])?,
                model: self.model.clone().unwrap_or_else(|| "claude-sonnet-4-6".to_string()),
            })),
            Backend::OpenAi => Ok(Arc::new(OpenAiModel {
                client: self.client.clone(),
                api_key: env_key(&["OPENAI_API_KEY"])?,
                model: self.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            })),
            Backend::None => bail!("summarization disabled"),
        }
    }
}

fn env_key(names: &[&str]) -> Result<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| eyre::eyre!("{} environment variable not set", names.join(" or ")))
}

/// Hosted seq2seq summarization model on the Hugging Face inference API
pub struct HuggingFaceModel {
    client: reqwest::Client,
    api_token: String,
    model: String,
}

impl HuggingFaceModel {
    pub fn new(client: reqwest::Client, api_token: String, model: String) -> Self {
        Self { client, api_token, model }
    }

    fn url(&self) -> String {
        format!("{HF_API_BASE}/{}", self.model)
    }

    /// Block until the hosted model is loaded
    async fn warm_up(&self) -> Result<()> {
        debug!("Warming up {}", self.model);
        let body = serde_json::json!({
            "inputs": "Warm up.",
            "options": { "wait_for_model": true }
        });
        let resp = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Hugging Face model {} returned {status}: {body}", self.model);
        }
        Ok(())
    }
}

#[async_trait]
impl SummaryModel for HuggingFaceModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String> {
        let body = serde_json::json!({
            "inputs": text,
            "parameters": {
                "max_length": length.max,
                "min_length": length.min,
                "do_sample": false
            },
            "options": { "wait_for_model": true }
        });

        let resp = self
            .client
            .post(self.url())
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Hugging Face API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_hf_text(&json)
    }
}

fn extract_hf_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get(0)
        .and_then(|c| c.get("summary_text"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected Hugging Face API response format");
}

fn length_instruction(length: SummaryLength) -> String {
    format!(
        "Summarize this video transcript in roughly {} to {} tokens:",
        length.min, length.max
    )
}

pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[async_trait]
impl SummaryModel for AnthropicModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String> {
        debug!("Summarizing via Anthropic API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": length.max,
            "system": DEFAULT_SYSTEM_PROMPT,
            "messages": [
                {
                    "role": "user",
                    "content": format!("{}\n\n{text}", length_instruction(length))
                }
            ]
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Anthropic API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_anthropic_text(&json)
    }
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

pub struct OpenAiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

#[async_trait]
impl SummaryModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn summarize(&self, text: &str, length: SummaryLength) -> Result<String> {
        debug!("Summarizing via OpenAI API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": length.max,
            "messages": [
                {
                    "role": "system",
                    "content": DEFAULT_SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": format!("{}\n\n{text}", length_instruction(length))
                }
            ]
        });

        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_openai_text(&json)
    }
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected OpenAI API response format");
}
