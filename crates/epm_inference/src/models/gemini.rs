use async_trait::async_trait;
use epm_core::{Error, Result};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{
    ChatOptions, ChatSession, GenerationRequest, GenerationResponse, GenerativeModel,
    ResponseFormat, TextStream,
};
use crate::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Google Gemini over its public REST API.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiModel {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Inference("Gemini API key is required".to_string()))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, model: &str, method: &str, body: &GenerateContentRequest<'_>) -> Result<reqwest::Response> {
        post_content(&self.client, &self.base_url, &self.api_key, model, method, body).await
    }
}

async fn post_content(
    client: &Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    method: &str,
    body: &GenerateContentRequest<'_>,
) -> Result<reqwest::Response> {
    let url = format!("{}/models/{}:{}", base_url, model, method);
    debug!(model = %model, method = %method, "Gemini request");

    let response = client
        .post(&url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::Inference(format!(
            "Gemini API error ({}) for {}: {}",
            status, model, error_text
        )));
    }
    Ok(response)
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let contents = [Content::new(Some("user"), request.prompt.as_str())];
        let body = GenerateContentRequest {
            contents: &contents,
            system_instruction: None,
            generation_config: match request.options.response_format {
                ResponseFormat::Json => Some(GenerationConfig {
                    response_mime_type: "application/json",
                }),
                ResponseFormat::Text => None,
            },
            tools: if request.options.web_search {
                vec![Tool {
                    google_search: GoogleSearch {},
                }]
            } else {
                Vec::new()
            },
        };

        let response: GenerateContentResponse = self
            .post(&request.model, "generateContent", &body)
            .await?
            .json()
            .await?;

        let text = response.text();
        if text.trim().is_empty() {
            return Err(Error::Inference(format!("Empty response from {}", request.model)));
        }
        Ok(GenerationResponse { text })
    }

    async fn open_chat(&self, options: &ChatOptions) -> Result<Box<dyn ChatSession>> {
        Ok(Box::new(GeminiChatSession {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            options: options.clone(),
            history: Arc::new(Mutex::new(Vec::new())),
        }))
    }
}

struct GeminiChatSession {
    client: Client,
    api_key: String,
    base_url: String,
    options: ChatOptions,
    history: Arc<Mutex<Vec<Content>>>,
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send_stream(&mut self, message: &str) -> Result<TextStream> {
        // The user turn is only committed together with a complete reply.
        let user_turn = Content::new(Some("user"), message);
        let contents = {
            let history = self
                .history
                .lock()
                .map_err(|_| Error::Inference("Chat history poisoned".to_string()))?;
            let mut contents = history.clone();
            contents.push(user_turn.clone());
            contents
        };

        let body = GenerateContentRequest {
            contents: &contents,
            system_instruction: Some(Content::new(None, self.options.system_instruction.as_str())),
            generation_config: None,
            tools: Vec::new(),
        };
        let response = post_content(
            &self.client,
            &self.base_url,
            &self.api_key,
            &self.options.model,
            "streamGenerateContent?alt=sse",
            &body,
        )
        .await?;

        let history = self.history.clone();
        let mut events = sse_text_stream(response);
        let stream = async_stream::try_stream! {
            let mut reply = String::new();
            while let Some(delta) = events.next().await {
                let delta = delta?;
                reply.push_str(&delta);
                yield delta;
            }
            if let Ok(mut history) = history.lock() {
                history.push(user_turn);
                history.push(Content::new(Some("model"), reply));
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Splits a server-sent-event body into the text of each `data:` payload.
fn sse_text_stream(response: reqwest::Response) -> TextStream {
    let mut bytes = Box::pin(response.bytes_stream());
    let stream = async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(Error::from)?;
            buffer.extend_from_slice(&chunk);
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(text) = sse_line_text(&String::from_utf8_lossy(&line))? {
                    yield text;
                }
            }
        }
        if let Some(text) = sse_line_text(&String::from_utf8_lossy(&buffer))? {
            yield text;
        }
    };
    Box::pin(stream)
}

fn sse_line_text(line: &str) -> Result<Option<String>> {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    let event: GenerateContentResponse = serde_json::from_str(data)?;
    let text = event.text();
    Ok(if text.is_empty() { None } else { Some(text) })
}
