use crate::config::{API_KEY_ENV, Config};
use crate::error::RelayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Request sent to the model service
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub temperature: Option<f32>,
}

/// Message in the conversation sent upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain string content, or the multi-part form used when an image is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// User turn carrying text and one image reference
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url.into() },
                },
            ]),
        }
    }

    /// Text portion of the message, ignoring images
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                ContentPart::ImageUrl { .. } => None,
            }),
        }
    }
}

impl LlmRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self {
            messages,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// A single chat-completion call against a hosted model.
///
/// Returns the completion text; `Ok("")` when the service answered without content.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, RelayError>;

    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions API
#[derive(Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.completions_url(),
            model: config.model.clone(),
            api_key: config.get_api_key(),
        })
    }

    fn parse_completion(body: &str) -> Result<String, RelayError> {
        let response: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| RelayError::MalformedResponse(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::MalformedResponse("response has no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

#[async_trait]
impl ModelService for LlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, RelayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(RelayError::MissingApiKey(API_KEY_ENV))?;

        let payload = ChatCompletionBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        tracing::debug!(url = %self.url, model = %self.model, messages = request.messages.len(), "sending chat completion");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "model service rejected the request");
            return Err(RelayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_completion(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_message_serializes_as_string() {
        let value = serde_json::to_value(LlmMessage::user("hi")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "hi" }));
    }

    #[test]
    fn image_message_serializes_as_parts() {
        let message = LlmMessage::user_with_image("보세요", "data:image/png;base64,AAAA");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "보세요" },
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA" } }
                ]
            })
        );
        assert_eq!(message.text(), Some("보세요"));
    }

    #[test]
    fn completion_content_is_returned_verbatim() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"정답: 4\n"}}]}"#;
        assert_eq!(LlmClient::parse_completion(body).unwrap(), "정답: 4\n");
    }

    #[test]
    fn null_content_is_empty_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(LlmClient::parse_completion(body).unwrap(), "");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = LlmClient::parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(_)));

        let err = LlmClient::parse_completion("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn missing_key_fails_before_network() {
        let config = Config {
            openai_api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let mut client = LlmClient::new(&config).unwrap();
        client.api_key = None;

        let err = client
            .complete(LlmRequest::new(vec![LlmMessage::user("x")]))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
