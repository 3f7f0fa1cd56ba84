//! Client for a Gemini-compatible `generateContent` endpoint.
//!
//! One request per call, no retries. The request timeout comes from
//! [`GeminiConfig::timeout`](crate::config::GeminiConfig).

use std::future::Future;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeminiConfig;

#[derive(Debug, Error)]
pub enum RemoteAnalysisError {
    #[error("No API key configured for the description service")]
    MissingCredentials,

    #[error("Description request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Description request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Description service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Description service returned no text")]
    EmptyResponse,
}

/// Turns an image plus an instruction into free text.
pub trait Describer {
    fn describe(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> impl Future<Output = Result<String, RemoteAnalysisError>> + Send;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum RequestPart<'a> {
    Text(&'a str),
    InlineData { mime_type: &'a str, data: String },
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, RemoteAnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RemoteAnalysisError::Transport)?;
        Ok(Self { http, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn classify(&self, err: reqwest::Error) -> RemoteAnalysisError {
        if err.is_timeout() {
            RemoteAnalysisError::Timeout(self.config.timeout)
        } else {
            RemoteAnalysisError::Transport(err)
        }
    }
}

impl Describer for GeminiClient {
    async fn describe(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, RemoteAnalysisError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(RemoteAnalysisError::MissingCredentials)?;

        let request = build_request(image_bytes, mime_type, instruction);
        tracing::debug!(
            model = %self.config.model,
            payload_bytes = image_bytes.len(),
            "Sending description request"
        );

        let response = self
            .http
            .post(self.url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        if !status.is_success() {
            return Err(RemoteAnalysisError::Service {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        extract_text(&body)
    }
}

fn build_request<'a>(
    image_bytes: &[u8],
    mime_type: &'a str,
    instruction: &'a str,
) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Text(instruction),
                RequestPart::InlineData {
                    mime_type,
                    data: STANDARD.encode(image_bytes),
                },
            ],
        }],
    }
}

fn extract_text(body: &str) -> Result<String, RemoteAnalysisError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| RemoteAnalysisError::Service {
            status: 200,
            message: format!("unreadable response: {}", e),
        })?;

    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(RemoteAnalysisError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = build_request(b"\x89PNG", "image/png", "Describe this image.");
        let json = serde_json::to_value(&request).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Describe this image.");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "iVBORw==");
    }

    #[test]
    fn test_extracts_first_candidate_text() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "A kitchen "}, {"text": "counter."}], "role": "model"}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }"#;
        assert_eq!(extract_text(body).unwrap(), "A kitchen counter.");
    }

    #[test]
    fn test_blocked_response_is_empty() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        assert!(matches!(
            extract_text(body),
            Err(RemoteAnalysisError::EmptyResponse)
        ));
    }

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "API key not valid.");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = GeminiClient::new(GeminiConfig {
            endpoint: "http://localhost:9000/".to_string(),
            ..GeminiConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.url(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let err = client
            .describe(b"bytes", "image/png", "Describe this image.")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteAnalysisError::MissingCredentials));
    }
}
