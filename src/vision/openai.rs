//! OpenAI-compatible chat completions client

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use super::parse::parse_reply;
use super::{VisionAnalysis, VisionAnalyzer};
use crate::errors::{AnalysisError, AnalysisResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

const MAX_TOKENS: u32 = 300;

const PROMPT: &str = r#"Analyze this image and provide:
1. A single descriptive sentence about what you see
2. 5-10 relevant tags/keywords (single words, comma-separated)

Format your response as JSON:
{
  "description": "A single sentence describing the image",
  "tags": ["tag1", "tag2", "tag3", "tag4", "tag5"]
}"#;

#[derive(Clone, Debug)]
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiVisionClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> AnalysisResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn request_body(&self, image: &[u8], mime_type: &str) -> Value {
        let data_url = format!(
            "data:{};base64,{}",
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(image)
        );

        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": PROMPT},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]
            }]
        })
    }
}

#[async_trait]
impl VisionAnalyzer for OpenAiVisionClient {
    async fn analyze(&self, image: &[u8], mime_type: &str) -> AnalysisResult<VisionAnalysis> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting vision analysis from {} ({} bytes)", url, image.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(image, mime_type))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AnalysisError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;
        let content = message_content(&body)?;

        let reply = parse_reply(content);
        Ok(VisionAnalysis {
            description: reply.description,
            tags: reply.tags,
        })
    }
}

fn message_content(body: &Value) -> AnalysisResult<&str> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AnalysisError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiVisionClient {
        OpenAiVisionClient::new(
            "sk-test",
            "https://vision.example/v1/",
            "gpt-4o",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_is_dropped() {
        assert_eq!(client().base_url, "https://vision.example/v1");
    }

    #[test]
    fn test_request_body_carries_image_as_data_url() {
        let body = client().request_body(b"abc", "image/png");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(
            body.pointer("/messages/0/content/1/image_url/url").unwrap(),
            "data:image/png;base64,YWJj"
        );
        assert!(body
            .pointer("/messages/0/content/0/text")
            .and_then(Value::as_str)
            .unwrap()
            .contains("5-10 relevant tags"));
    }

    #[test]
    fn test_message_content_extraction() {
        let body = json!({"choices": [{"message": {"content": "{\"description\": \"x\"}"}}]});
        assert_eq!(message_content(&body).unwrap(), "{\"description\": \"x\"}");

        let body = json!({"choices": []});
        assert!(matches!(
            message_content(&body),
            Err(AnalysisError::InvalidResponse(_))
        ));
    }
}
