/// LLM Client — the single point of entry for all vision-model calls.
///
/// ARCHITECTURAL RULE: No other module may call the inference API directly.
/// All model interactions MUST go through this module.
///
/// Talks to an OpenRouter-compatible chat-completions endpoint. One request per
/// call, bounded by the configured timeout, never retried.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod image;
pub mod prompts;

pub use image::ImageInput;

/// Message surfaced when the upstream reply carries no usable error text.
const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered, but without a completion.
    #[error("API Error: {message}")]
    Upstream { message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Anything that can caption an image given an instruction.
///
/// Carried in `AppState` as `Arc<dyn CaptionModel>` so handlers can be driven
/// against a stub in tests.
#[async_trait]
pub trait CaptionModel: Send + Sync {
    /// Returns the raw completion text for `prompt` about `image`.
    async fn complete(&self, image: &ImageInput, prompt: &str) -> Result<String, LlmError>;
}

// --- Request types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ChatContent<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContent<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

// --- Response types ---

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    error: Option<Value>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// The vision client used by the caption handler.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.llm_timeout_secs))
                .build()?,
            api_key: config.openrouter_api_key.clone(),
            api_url: config.llm_api_url.clone(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, image: &ImageInput, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ChatContent::Text { text: prompt },
                    ChatContent::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl CaptionModel for LlmClient {
    async fn complete(&self, image: &ImageInput, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&self.request_body(image, prompt))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        let parsed: ChatResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(LlmError::Parse(e)),
            Err(_) => {
                warn!("LLM API returned {status} with a non-JSON body");
                return Err(LlmError::Upstream {
                    message: format!("{status}: {}", body.trim()),
                });
            }
        };

        if let Some(usage) = &parsed.usage {
            debug!(
                "LLM call finished: status={}, prompt_tokens={:?}, completion_tokens={:?}",
                status, usage.prompt_tokens, usage.completion_tokens
            );
        }

        extract_completion(parsed)
    }
}

/// Pulls the first choice's text out of a chat-completions reply, or turns
/// the reply's `error` into [`LlmError::Upstream`].
fn extract_completion(response: ChatResponse) -> Result<String, LlmError> {
    match response.choices.and_then(|c| c.into_iter().next()) {
        Some(choice) => Ok(choice.message.content.unwrap_or_default()),
        None => Err(LlmError::Upstream {
            message: error_message(response.error.as_ref()),
        }),
    }
}

/// Accepts both `{"error": {"message": "..."}}` and `{"error": "..."}`.
fn error_message(error: Option<&Value>) -> String {
    error
        .and_then(|e| match e {
            Value::String(s) => Some(s.as_str()),
            other => other.get("message").and_then(Value::as_str),
        })
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    fn parse(body: Value) -> ChatResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_extract_completion_takes_first_choice() {
        let response = parse(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "1. Hello #hi"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }));
        assert_eq!(extract_completion(response).unwrap(), "1. Hello #hi");
    }

    #[test]
    fn test_extract_completion_null_content_is_empty() {
        let response = parse(json!({"choices": [{"message": {"content": null}}]}));
        assert_eq!(extract_completion(response).unwrap(), "");
    }

    #[test]
    fn test_extract_completion_surfaces_error_message() {
        let response = parse(json!({"error": {"message": "invalid image", "code": 400}}));
        let err = extract_completion(response).unwrap_err();
        assert_eq!(err.to_string(), "API Error: invalid image");
    }

    #[test]
    fn test_extract_completion_string_error() {
        let response = parse(json!({"error": "quota exceeded"}));
        assert!(matches!(
            extract_completion(response),
            Err(LlmError::Upstream { message }) if message == "quota exceeded"
        ));
    }

    #[test]
    fn test_extract_completion_without_choices_or_error() {
        for body in [json!({}), json!({"choices": []}), json!({"error": {}})] {
            let err = extract_completion(parse(body)).unwrap_err();
            assert_eq!(err.to_string(), "API Error: Unknown error");
        }
    }

    #[test]
    fn test_request_body_shape() {
        let config = Config::for_tests("http://localhost/unused");
        let client = LlmClient::new(&config).unwrap();
        let image = ImageInput::from_upload(b"abc", Some("image/png"), None);

        let body = serde_json::to_value(client.request_body(&image, "Caption this")).unwrap();

        assert_eq!(body["model"], config.llm_model);
        assert_eq!(body["max_tokens"], config.llm_max_tokens);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(
            body["messages"][0]["content"],
            json!([
                {"type": "text", "text": "Caption this"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,YWJj"}}
            ])
        );
    }

    /// Serves `router` on an ephemeral port and returns its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/chat/completions")
    }

    #[tokio::test]
    async fn test_complete_round_trip_against_stub() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["messages"][0]["content"][0]["text"], "Caption this");
                Json(json!({
                    "choices": [{"message": {"content": "1. Sunny #sun"}}],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 5}
                }))
            }),
        );
        let url = serve(router).await;
        let client = LlmClient::new(&Config::for_tests(&url)).unwrap();
        let image = ImageInput::from_upload(b"img", None, None);

        let text = client.complete(&image, "Caption this").await.unwrap();
        assert_eq!(text, "1. Sunny #sun");
    }

    #[tokio::test]
    async fn test_complete_error_status_with_json_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": {"message": "invalid image"}})),
                )
            }),
        );
        let url = serve(router).await;
        let client = LlmClient::new(&Config::for_tests(&url)).unwrap();
        let image = ImageInput::from_upload(b"img", None, None);

        let err = client.complete(&image, "Caption this").await.unwrap_err();
        assert_eq!(err.to_string(), "API Error: invalid image");
    }

    #[tokio::test]
    async fn test_complete_error_status_with_plain_body() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let url = serve(router).await;
        let client = LlmClient::new(&Config::for_tests(&url)).unwrap();
        let image = ImageInput::from_upload(b"img", None, None);

        let err = client.complete(&image, "Caption this").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::Upstream { ref message } if message.contains("502") && message.contains("upstream down")
        ));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({"choices": []}))
            }),
        );
        let url = serve(router).await;
        let mut config = Config::for_tests(&url);
        config.llm_timeout_secs = 1;
        let client = LlmClient::new(&config).unwrap();
        let image = ImageInput::from_upload(b"img", None, None);

        let err = client.complete(&image, "Caption this").await.unwrap_err();
        assert!(matches!(err, LlmError::Http(ref e) if e.is_timeout()));
    }

    #[tokio::test]
    async fn test_complete_connection_refused_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = LlmClient::new(&Config::for_tests(&format!("http://{addr}/"))).unwrap();
        let image = ImageInput::from_upload(b"img", None, None);

        let err = client.complete(&image, "Caption this").await.unwrap_err();
        assert!(matches!(err, LlmError::Http(_)));
    }
}
