//! OpenAI-compatible chat completion provider (`/chat/completions`).
//!
//! All wire types are private to this module. Callers only see
//! `CompletionRequest` and `CompletionResponse`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::costs::model_cost;
use super::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider,
};
use crate::error::LlmError;

const PROVIDER: &str = "openai";

/// Adapter for any endpoint implementing the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_cost(&self.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %self.model,
            messages = payload.messages.len(),
            temperature = ?payload.temperature,
            max_tokens = ?payload.max_tokens,
            "Sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "LLM HTTP request failed");
                LlmError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: e.to_string(),
                }
            })?;

        let response = check_status(response).await?;

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to parse response body: {e}"),
            })?;

        into_completion(parsed)
    }
}

fn into_completion(parsed: ChatCompletionResponse) -> Result<CompletionResponse, LlmError> {
    let choice = parsed.choices.into_iter().next();
    let finish_reason = FinishReason::from_wire(
        choice.as_ref().and_then(|c| c.finish_reason.as_deref()),
    );

    let content = choice
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "empty or missing content in response".to_string(),
        })?;

    let (input_tokens, output_tokens) = parsed
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    debug!(input_tokens, output_tokens, ?finish_reason, "Received completion");

    Ok(CompletionResponse {
        content,
        input_tokens,
        output_tokens,
        finish_reason,
        response_id: parsed.id,
    })
}

// ── Private wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role.as_str(),
            content: &message.content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Return the response if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let err = status_error(status, retry_after, &body);
    error!(%status, error = %err, "LLM request returned HTTP error");
    Err(err)
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED => LlmError::AuthFailed {
            provider: PROVIDER.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after,
        },
        _ => {
            let message = serde_json::from_str::<ErrorEnvelope>(body)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| body.to_string());
            LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {message}"),
            }
        }
    }
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slash() {
        let provider = OpenAiProvider::new(
            "https://api.openai.com/v1/",
            "gpt-4o-mini",
            SecretString::from("sk-test"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn request_omits_unset_options() {
        let messages = [ChatMessage::system("rules"), ChatMessage::user("hi")];
        let payload = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: None,
            max_tokens: Some(1000),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 1000);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn parses_completion() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-1",
                "choices": [{"message": {"role": "assistant", "content": "  Revenue grew.  "}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
            }"#,
        )
        .unwrap();
        let response = into_completion(parsed).unwrap();
        assert_eq!(response.content, "Revenue grew.");
        assert_eq!(response.input_tokens, 120);
        assert_eq!(response.output_tokens, 8);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.response_id.as_deref(), Some("chatcmpl-1"));
    }

    #[test]
    fn empty_content_is_invalid_response() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "   "}, "finish_reason": "length"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            into_completion(parsed),
            Err(LlmError::InvalidResponse { .. })
        ));

        let parsed: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(into_completion(parsed).is_err());
    }

    #[test]
    fn status_errors_map_by_code() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, ""),
            LlmError::AuthFailed { .. }
        ));

        match status_error(StatusCode::TOO_MANY_REQUESTS, parse_retry_after("12"), "") {
            LlmError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = status_error(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"error": {"message": "model not found", "type": "invalid_request_error"}}"#,
        );
        assert!(err.to_string().contains("model not found"));

        let err = status_error(StatusCode::BAD_GATEWAY, None, "upstream down");
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn retry_after_ignores_http_dates() {
        assert_eq!(parse_retry_after(" 3 "), Some(Duration::from_secs(3)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
