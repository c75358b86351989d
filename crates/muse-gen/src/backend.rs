//! Captioning backend: credentials, request shape, and the HTTP client.
//!
//! `CaptionBackend` is the seam the generator talks to. `GeminiBackend`
//! implements it against the `generateContent` REST endpoint; tests plug in
//! scripted backends instead.

use crate::error::{GenerationError, Result};
use crate::prompt::{MAX_OUTPUT_TOKENS, SAFETY_CATEGORIES, TEMPERATURE, response_schema};
use muse_core::ModelTier;
use serde::Deserialize;
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Process environment variables consulted for a default key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ─── Credentials ─────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    /// User-supplied key first, then the process environment.
    pub fn resolve(user_key: Option<&str>, user_base_url: Option<&str>) -> Result<Self> {
        Self::resolve_with(user_key, user_base_url, |name| std::env::var(name).ok())
    }

    /// Like [`resolve`](Self::resolve) with an injectable environment.
    pub fn resolve_with(
        user_key: Option<&str>,
        user_base_url: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_key = non_blank(user_key)
            .map(str::to_string)
            .or_else(|| {
                API_KEY_ENV_VARS
                    .iter()
                    .filter_map(|name| env(*name))
                    .find(|value| !value.trim().is_empty())
            })
            .ok_or(GenerationError::MissingCredentials)?;
        let base_url = non_blank(user_base_url)
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            api_key: api_key.trim().to_string(),
            base_url,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// ─── Request ─────────────────────────────────────────────────────────────

/// One backend call: image plus instructions for a given tier.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub model: ModelTier,
    pub system_instruction: String,
    pub user_prompt: String,
    pub mime_type: String,
    /// Base64 image bytes.
    pub image_data: String,
}

impl ContentRequest {
    /// `generateContent` request body.
    pub fn to_body(&self) -> Value {
        let safety: Vec<Value> = SAFETY_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect();
        json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": self.mime_type, "data": self.image_data } },
                    { "text": self.user_prompt }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            },
            "safetySettings": safety
        })
    }
}

// ─── Backend trait ───────────────────────────────────────────────────────

/// Anything that can turn a request into raw model text.
pub trait CaptionBackend: Send + Sync + 'static {
    fn generate_content(
        &self,
        request: &ContentRequest,
    ) -> impl Future<Output = Result<String>> + Send;
}

// ─── Gemini ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// HTTP client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    credentials: Credentials,
}

impl GeminiBackend {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    fn endpoint(&self, model: ModelTier) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.credentials.base_url,
            model.model_name()
        )
    }
}

impl CaptionBackend for GeminiBackend {
    async fn generate_content(&self, request: &ContentRequest) -> Result<String> {
        let url = self.endpoint(request.model);
        log::debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.credentials.api_key)
            .json(&request.to_body())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_error_body(status.as_u16(), &body));
        }
        extract_text(&body)
    }
}

/// Map a non-2xx response to an error kind.
pub fn classify_error_body(status: u16, body: &str) -> GenerationError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = if envelope.error.status.is_empty() {
                envelope.error.message
            } else {
                format!("{} ({})", envelope.error.message, envelope.error.status)
            };
            GenerationError::from_status(status, &message)
        }
        Err(_) => GenerationError::from_status(status, body.trim()),
    }
}

/// Pull the model text out of a successful response body.
pub fn extract_text(body: &str) -> Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let Some(candidate) = response.candidates.first() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "empty candidates".into());
        return Err(GenerationError::SafetyBlocked(reason));
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason.as_deref() {
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                GenerationError::SafetyBlocked("candidate blocked".into())
            }
            _ => GenerationError::MalformedResponse("no response text".into()),
        });
    }
    Ok(text)
}
