// ABOUTME: Gemini generateContent backend over reqwest
// ABOUTME: Streams server-sent events into BackendEvents; also serves infographic image requests

use super::{Backend, BackendEvent, Content, GenerationRequest, Part, ToolSet};
use crate::config::Config;
use crate::error::{BuddyError, Result};
use crate::models::{GroundingSource, InlineImage};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

/// Connection settings for the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub image_model: String,
    pub stream: bool,
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Settings from the loaded config; fails without an API key
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            BuddyError::Config(format!(
                "no API key: set {} or api.api_key",
                crate::config::API_KEY_ENV
            ))
        })?;
        Ok(Self {
            base_url: config.api.base_url.clone(),
            api_key,
            model: config.api.model.clone(),
            image_model: config.api.image_model.clone(),
            stream: config.api.stream,
            timeout_secs: config.api.timeout_secs,
        })
    }
}

pub struct GeminiBackend {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            model,
            method
        )
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<BoxStream<'static, BackendEvent>> {
        let streaming = self.config.stream;
        let url = if streaming {
            format!(
                "{}?alt=sse",
                self.endpoint(&self.config.model, "streamGenerateContent")
            )
        } else {
            self.endpoint(&self.config.model, "generateContent")
        };
        let body = request_body(&request);
        let client = self.client.clone();
        let api_key = self.config.api_key.clone();

        let (tx, rx) = mpsc::channel::<BackendEvent>(100);

        tokio::spawn(async move {
            tracing::debug!(url = %url, streaming, "Sending generation request");
            let result = client
                .post(&url)
                .header("x-goog-api-key", api_key)
                .json(&body)
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "Generation request failed");
                    let _ = tx.send(BackendEvent::Error(BuddyError::from(e).to_string())).await;
                    let _ = tx.send(BackendEvent::Done).await;
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = api_error_message(&text)
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                tracing::error!(status = status.as_u16(), error = %message, "Generation API rejected request");
                let _ = tx.send(BackendEvent::Error(message)).await;
                let _ = tx.send(BackendEvent::Done).await;
                return;
            }

            if streaming {
                let mut bytes = response.bytes_stream();
                let mut sse = SseBuffer::default();
                while let Some(item) = bytes.next().await {
                    match item {
                        Ok(chunk) => {
                            for payload in sse.push(&chunk) {
                                if !forward_payload(&tx, &payload).await {
                                    tracing::debug!("Event receiver closed, stopping stream");
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Generation stream broke");
                            let _ = tx.send(BackendEvent::Error(e.to_string())).await;
                            let _ = tx.send(BackendEvent::Done).await;
                            return;
                        }
                    }
                }
                for payload in sse.finish() {
                    if !forward_payload(&tx, &payload).await {
                        return;
                    }
                }
            } else {
                match response.json::<Value>().await {
                    Ok(value) => {
                        for event in parse_chunk(&value) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(BackendEvent::Error(e.to_string())).await;
                    }
                }
            }

            let _ = tx.send(BackendEvent::Done).await;
        });

        Ok(Box::pin(tokio_stream::wrappers::ReceiverStream::new(rx)))
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<InlineImage> {
        let url = self.endpoint(&self.config.image_model, "generateContent");
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": aspect_ratio }
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BuddyError::Request(
                api_error_message(&text).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| BuddyError::Request(format!("invalid image response: {}", e)))?;
        first_inline_image(&value)
            .ok_or_else(|| BuddyError::Request("image model returned no image".to_string()))
    }
}

/// Parse one SSE payload and forward its events. False once the receiver is gone.
async fn forward_payload(tx: &mpsc::Sender<BackendEvent>, payload: &str) -> bool {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unparsable stream chunk");
            return true;
        }
    };
    for event in parse_chunk(&value) {
        if tx.send(event).await.is_err() {
            return false;
        }
    }
    true
}

/// JSON body of a generateContent call
pub(crate) fn request_body(request: &GenerationRequest) -> Value {
    let contents: Vec<Value> = request.contents.iter().map(content_json).collect();
    let mut body = json!({
        "contents": contents,
        "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
    });
    match &request.tools {
        ToolSet::Functions(declarations) => {
            body["tools"] = json!([{ "functionDeclarations": declarations }]);
        }
        ToolSet::WebSearch => {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }
        ToolSet::None => {}
    }
    body
}

fn content_json(content: &Content) -> Value {
    let parts: Vec<Value> = content
        .parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => json!({ "text": text }),
            Part::InlineData { mime_type, data } => {
                json!({ "inlineData": { "mimeType": mime_type, "data": data } })
            }
        })
        .collect();
    json!({ "role": content.role.as_str(), "parts": parts })
}

/// Events carried by one response object (a full response or a stream chunk)
pub(crate) fn parse_chunk(value: &Value) -> Vec<BackendEvent> {
    let mut events = Vec::new();

    if let Some(message) = value.get("error").and_then(|e| e.get("message")).and_then(Value::as_str) {
        events.push(BackendEvent::Error(message.to_string()));
        return events;
    }
    if let Some(reason) = value
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str)
    {
        events.push(BackendEvent::Error(format!("prompt blocked: {}", reason)));
        return events;
    }

    let Some(candidate) = value.get("candidates").and_then(|c| c.get(0)) else {
        return events;
    };

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);
    for part in parts.into_iter().flatten() {
        // Thought summaries are internal reasoning, not answer text
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            if !text.is_empty() {
                events.push(BackendEvent::Text(text.to_string()));
            }
        } else if let Some(call) = part.get("functionCall") {
            let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            events.push(BackendEvent::FunctionCall {
                name: name.to_string(),
                args: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }

    let chunks = candidate
        .get("groundingMetadata")
        .and_then(|g| g.get("groundingChunks"))
        .and_then(Value::as_array);
    let sources: Vec<GroundingSource> = chunks
        .into_iter()
        .flatten()
        .filter_map(|chunk| {
            let web = chunk.get("web")?;
            let uri = web.get("uri").and_then(Value::as_str).filter(|u| !u.is_empty())?;
            let title = web
                .get("title")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or(uri);
            Some(GroundingSource {
                title: title.to_string(),
                uri: uri.to_string(),
            })
        })
        .collect();
    if !sources.is_empty() {
        events.push(BackendEvent::Grounding(sources));
    }

    events
}

fn first_inline_image(value: &Value) -> Option<InlineImage> {
    let parts = value
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    parts.iter().find_map(|part| {
        let inline = part.get("inlineData")?;
        Some(InlineImage {
            mime_type: inline
                .get("mimeType")
                .and_then(Value::as_str)
                .unwrap_or("image/png")
                .to_string(),
            data: inline.get("data")?.as_str()?.to_string(),
        })
    })
}

/// `error.message` of an API error body
fn api_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Reassembles `data:` lines of a server-sent event stream across network chunks
#[derive(Default)]
struct SseBuffer {
    pending: Vec<u8>,
}

impl SseBuffer {
    /// Feed bytes; returns every complete data payload
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Payload of a trailing line without a newline
    fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.pending);
        data_payload(&line).into_iter().collect()
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    Some(payload.to_string())
}
