//! OpenAI adapter (image text extraction and translation).
//!
//! Uses the `chat/completions` endpoint with the image inlined as a base64
//! data URL.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};

use stickerbot_core::{errors::Error, ports::VisionClient, Result};

const MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Clone, Debug)]
pub struct OpenAiVisionClient {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl OpenAiVisionClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("reqwest client build: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Request body for one image plus one instruction.
pub fn build_request(model: &str, image: &[u8], mime_type: &str, instruction: &str) -> Value {
    let b64 = base64::engine::general_purpose::STANDARD.encode(image);
    json!({
        "model": model,
        "max_tokens": MAX_OUTPUT_TOKENS,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": instruction },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:{mime_type};base64,{b64}") }
                }
            ]
        }]
    })
}

/// First choice's message text. An empty string is a valid "no text" answer.
pub fn parse_completion(v: &Value) -> Result<String> {
    if let Some(err) = v.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(Error::External(format!("openai error: {msg}")));
    }

    let content = v
        .pointer("/choices/0/message/content")
        .ok_or_else(|| Error::External("openai response has no choices".to_string()))?;
    Ok(content.as_str().unwrap_or("").to_string())
}

#[async_trait]
impl VisionClient for OpenAiVisionClient {
    async fn extract_text(&self, image: &[u8], mime_type: &str, instruction: &str) -> Result<String> {
        let body = build_request(&self.model, image, mime_type, instruction);

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("openai request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "openai vision request failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("openai json error: {e}")))?;

        let text = parse_completion(&v)?;
        tracing::debug!(model = %self.model, chars = text.chars().count(), "vision answer");
        Ok(text)
    }
}
