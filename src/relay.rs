//! Prompt composition and the single upstream call behind `/api/solve`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::events::Subject;
use crate::llm::{LlmMessage, LlmRequest, ModelService};
use crate::prompts::system_instruction;

/// Filler used when a text-only question arrives empty
pub const EMPTY_QUESTION_FILLER: &str = "문제를 입력해줘.";
/// Filler used when only an image was submitted
pub const IMAGE_ONLY_FILLER: &str = "이 이미지를 분석해줘.";

/// Relay request, identical to the JSON body of `POST /api/solve`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    /// Subject tag; anything but `math`/`chem`/`bio` selects the base instruction only
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub question: Option<String>,
    /// Image as a data URL (`data:image/png;base64,...`)
    #[serde(default)]
    pub image: Option<String>,
}

impl SolveRequest {
    pub fn new(subject: Subject, question: impl Into<String>, image: Option<String>) -> Self {
        Self {
            subject: subject.tag().to_string(),
            question: Some(question.into()),
            image,
        }
    }

    fn question_text(&self) -> Option<&str> {
        self.question.as_deref().filter(|q| !q.is_empty())
    }

    fn image_url(&self) -> Option<&str> {
        self.image.as_deref().filter(|i| !i.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResponse {
    pub answer: String,
}

/// Anything that can answer a [`SolveRequest`]: the in-process relay or a remote one.
#[async_trait]
pub trait Solver: Send + Sync {
    async fn solve(&self, request: SolveRequest) -> Result<String, RelayError>;
}

/// Build the conversation for one question: system instruction, then a single user turn.
pub fn compose_messages(request: &SolveRequest) -> Vec<LlmMessage> {
    let subject = Subject::from_tag(&request.subject);
    let mut messages = vec![LlmMessage::system(system_instruction(subject))];

    match request.image_url() {
        Some(image) => messages.push(LlmMessage::user_with_image(
            request.question_text().unwrap_or(IMAGE_ONLY_FILLER),
            image,
        )),
        None => messages.push(LlmMessage::user(
            request.question_text().unwrap_or(EMPTY_QUESTION_FILLER),
        )),
    }

    messages
}

/// Stateless prompt composer in front of a [`ModelService`]
#[derive(Clone)]
pub struct Relay {
    service: Arc<dyn ModelService>,
    temperature: f32,
}

impl Relay {
    pub fn new(service: Arc<dyn ModelService>, temperature: f32) -> Self {
        Self {
            service,
            temperature,
        }
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }
}

#[async_trait]
impl Solver for Relay {
    async fn solve(&self, request: SolveRequest) -> Result<String, RelayError> {
        let messages = compose_messages(&request);
        tracing::info!(
            subject = %request.subject,
            has_image = request.image_url().is_some(),
            model = self.service.model_name(),
            "relaying question"
        );

        let llm_request = LlmRequest::new(messages).with_temperature(self.temperature);
        let answer = self.service.complete(llm_request).await;

        match &answer {
            Ok(text) => tracing::debug!(chars = text.chars().count(), "relay answered"),
            Err(e) => tracing::warn!(error = %e, "relay call failed"),
        }

        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentPart, MessageContent};
    use crate::prompts::BASE_INSTRUCTION;
    use std::sync::Mutex;

    /// Records the last request and replies with a canned answer
    struct RecordingService {
        reply: Result<String, String>,
        last: Mutex<Option<LlmRequest>>,
    }

    impl RecordingService {
        fn answering(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                last: Mutex::new(None),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(message.to_string()),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ModelService for RecordingService {
        async fn complete(&self, request: LlmRequest) -> Result<String, RelayError> {
            *self.last.lock().unwrap() = Some(request);
            self.reply
                .clone()
                .map_err(RelayError::MalformedResponse)
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn text_question_yields_two_messages() {
        let messages = compose_messages(&SolveRequest::new(Subject::Math, "2+2=?", None));
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].text().unwrap().contains("과목 지침(수학)"));
        assert_eq!(messages[1], LlmMessage::user("2+2=?"));
    }

    #[test]
    fn empty_question_uses_filler() {
        let messages = compose_messages(&SolveRequest::new(Subject::Bio, "", None));
        assert_eq!(messages[1], LlmMessage::user(EMPTY_QUESTION_FILLER));
    }

    #[test]
    fn image_is_attached_to_the_user_turn() {
        let request = SolveRequest {
            subject: "chem".to_string(),
            question: None,
            image: Some("data:image/png;base64,AAAA".to_string()),
        };
        let messages = compose_messages(&request);
        assert_eq!(messages.len(), 2);

        let MessageContent::Parts(parts) = &messages[1].content else {
            panic!("expected multi-part content, got {:?}", messages[1].content);
        };
        assert_eq!(
            parts[0],
            ContentPart::Text {
                text: IMAGE_ONLY_FILLER.to_string()
            }
        );
        assert!(matches!(&parts[1], ContentPart::ImageUrl { image_url } if image_url.url == "data:image/png;base64,AAAA"));
    }

    #[test]
    fn unknown_subject_uses_base_instruction_only() {
        let request = SolveRequest {
            subject: "physics".to_string(),
            question: Some("F=ma?".to_string()),
            image: None,
        };
        let messages = compose_messages(&request);
        assert_eq!(messages[0].text(), Some(BASE_INSTRUCTION));
    }

    #[tokio::test]
    async fn relay_forwards_temperature_and_returns_text_verbatim() {
        let service = RecordingService::answering("  정답: 4  ");
        let relay = Relay::new(service.clone(), 0.2);

        let answer = relay
            .solve(SolveRequest::new(Subject::Math, "2+2=?", None))
            .await
            .unwrap();
        assert_eq!(answer, "  정답: 4  ");

        let sent = service.last.lock().unwrap().take().unwrap();
        assert_eq!(sent.temperature, Some(0.2));
        assert_eq!(sent.messages.len(), 2);
    }

    #[tokio::test]
    async fn relay_surfaces_service_failure() {
        let relay = Relay::new(RecordingService::failing("boom"), 0.2);
        let err = relay
            .solve(SolveRequest::new(Subject::Math, "2+2=?", None))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedResponse(ref m) if m == "boom"));
    }

    #[test]
    fn request_json_tolerates_missing_fields() {
        let request: SolveRequest = serde_json::from_str(r#"{"subject":"math"}"#).unwrap();
        assert_eq!(request.subject, "math");
        assert_eq!(request.question, None);
        assert_eq!(request.image, None);
    }
}
