//! Gemini API client for audio diagnosis.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("request blocked by model: {0}")]
    Blocked(String),
    #[error("model returned no text")]
    Empty,
    #[error("no response within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Anything that can turn a prompt plus an audio clip into diagnosis text.
#[async_trait]
pub trait Diagnoser: Send + Sync {
    async fn diagnose(&self, prompt: &str, audio: &[u8], mime_type: &str) -> Result<String, DiagnosisError>;
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, api_base: String, timeout: Duration) -> Result<Self, DiagnosisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiagnosisError::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { api_key, model, api_base, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

#[async_trait]
impl Diagnoser for GeminiClient {
    async fn diagnose(&self, prompt: &str, audio: &[u8], mime_type: &str) -> Result<String, DiagnosisError> {
        info!("🎧 Sending {} bytes of {} to {}", audio.len(), mime_type, self.model);

        let request = build_request(prompt, audio, mime_type);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DiagnosisError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DiagnosisError::Http(format!("failed to read response: {e}")))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(DiagnosisError::Api { status: status.as_u16(), body });
        }

        let text = extract_text(&body)?;
        info!("🩺 Diagnosis received ({} chars)", text.chars().count());
        Ok(text)
    }
}

fn build_request(prompt: &str, audio: &[u8], mime_type: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text { text: prompt.to_string() },
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(audio),
                    },
                },
            ],
        }],
    }
}

/// Joins the text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, DiagnosisError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| DiagnosisError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(DiagnosisError::Parse(format!("Gemini error: {}", error.message)));
    }

    if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(DiagnosisError::Blocked(reason));
    }

    let candidate = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .ok_or(DiagnosisError::Empty)?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(DiagnosisError::Empty);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_prompt_and_inline_audio() {
        let request = build_request("diagnose this", &[1, 2, 3], "audio/ogg");
        let json = serde_json::to_value(&request).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "diagnose this");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "audio/ogg");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn test_extract_text_joins_parts_and_trims() {
        let body = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": "  Detected symptoms:\n" }, { "text": "knock  " }] }
            }]
        }"#;
        assert_eq!(extract_text(body).unwrap(), "Detected symptoms:\nknock");
    }

    #[test]
    fn test_extract_text_uses_first_candidate() {
        let body = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": "first" }] } },
                { "content": { "parts": [{ "text": "second" }] } }
            ]
        }"#;
        assert_eq!(extract_text(body).unwrap(), "first");
    }

    #[test]
    fn test_extract_text_blocked() {
        let body = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;
        assert!(matches!(extract_text(body), Err(DiagnosisError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_extract_text_no_candidates() {
        assert!(matches!(extract_text(r#"{ "candidates": [] }"#), Err(DiagnosisError::Empty)));
        assert!(matches!(extract_text("{}"), Err(DiagnosisError::Empty)));
    }

    #[test]
    fn test_extract_text_whitespace_only_is_empty() {
        let body = r#"{ "candidates": [{ "content": { "parts": [{ "text": "  \n " }] } }] }"#;
        assert!(matches!(extract_text(body), Err(DiagnosisError::Empty)));
    }

    #[test]
    fn test_extract_text_error_payload() {
        let body = r#"{ "error": { "message": "API key not valid" } }"#;
        let err = extract_text(body).unwrap_err();
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn test_extract_text_malformed_json() {
        assert!(matches!(extract_text("not json"), Err(DiagnosisError::Parse(_))));
    }

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(
            "key".into(),
            "gemini-2.5-flash".into(),
            DEFAULT_API_BASE.into(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = DiagnosisError::Timeout(Duration::from_secs(60));
        assert_eq!(err.to_string(), "no response within 60s");
    }
}
