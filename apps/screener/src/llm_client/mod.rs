/// LLM Client: the single point of entry for all inference and file API calls.
///
/// No other module talks HTTP to the model provider. The batch pipeline and the
/// HTTP surface only see the `ModelEndpoint` and `FileStore` traits, which
/// `LlmClient` implements against an OpenAI-compatible API.
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

/// Low randomness so repeated runs over the same corpus stay comparable.
pub const TEMPERATURE: f32 = 0.3;
pub const MAX_TOKENS: u32 = 1500;
const MAX_RETRIES: u32 = 3;
const UPLOAD_PURPOSE: &str = "user_data";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// One part of the user message: instruction text or a previously uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    File { file: FileRef },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRef {
    pub file_id: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn file(file_id: impl Into<String>) -> Self {
        ContentPart::File {
            file: FileRef {
                file_id: file_id.into(),
            },
        }
    }
}

/// Chat inference: system prompt plus user parts in, free-form text out.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
    async fn complete(&self, system: &str, parts: &[ContentPart]) -> Result<String, LlmError>;
}

/// Remote file storage backing `ContentPart::File` handles.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, LlmError>;
    async fn delete(&self, file_id: &str) -> Result<(), LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Plain(&'a str),
    Parts(&'a [ContentPart]),
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatResponse {
    /// Text of the first choice, if the model returned any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// OpenAI-compatible client for chat completions and the files API.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: &str, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Makes a raw chat completion call, returning the full response object.
    /// Retries on 429 (rate limit), 5xx and connection errors with exponential backoff.
    pub async fn call(
        &self,
        system: &str,
        parts: &[ContentPart],
    ) -> Result<ChatResponse, LlmError> {
        let request_body = build_chat_request(&self.model, system, parts);

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(self.url("chat/completions"))
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(api_error(status.as_u16(), response).await);
            }

            let chat_response: ChatResponse = response.json().await?;

            if let Some(usage) = &chat_response.usage {
                debug!(
                    "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                    usage.prompt_tokens, usage.completion_tokens
                );
            }

            return Ok(chat_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl ModelEndpoint for LlmClient {
    async fn complete(&self, system: &str, parts: &[ContentPart]) -> Result<String, LlmError> {
        let response = self.call(system, parts).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl FileStore for LlmClient {
    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, LlmError> {
        let form = multipart::Form::new()
            .text("purpose", UPLOAD_PURPOSE)
            .part(
                "file",
                multipart::Part::bytes(bytes).file_name(filename.to_string()),
            );

        let response = self
            .client
            .post(self.url("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response).await);
        }

        let file: FileObject = response.json().await?;
        Ok(file.id)
    }

    async fn delete(&self, file_id: &str) -> Result<(), LlmError> {
        let response = self
            .client
            .delete(self.url(&format!("files/{file_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status.as_u16(), response).await);
        }
        Ok(())
    }
}

fn build_chat_request<'a>(
    model: &'a str,
    system: &'a str,
    parts: &'a [ContentPart],
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Plain(system),
            },
            ChatMessage {
                role: "user",
                content: MessageContent::Parts(parts),
            },
        ],
    }
}

async fn api_error(status: u16, response: reqwest::Response) -> LlmError {
    let body = response.text().await.unwrap_or_default();
    // Try to parse error message
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
