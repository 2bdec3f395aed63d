use std::sync::Arc;

use uuid::Uuid;

use crate::error::RelayError;
use crate::events::{ChatTurn, Subject};
use crate::image::ImageAttachment;
use crate::relay::{SolveRequest, Solver};

/// User turn shown when only an image was sent
pub const IMAGE_ONLY_PLACEHOLDER: &str = "(이미지 분석)";
/// Bot turn used when the relay answered with no text
pub const EMPTY_ANSWER_FALLBACK: &str = "응답이 없습니다.";
/// Bot turn used when the relay call failed
pub const ERROR_MESSAGE: &str = "오류가 발생했습니다.";

/// What happened to a submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No question and no image: nothing appended, no call made
    Empty,
    /// A request is already in flight
    Busy,
    /// The relay answered and the bot turn holds its text (or the empty fallback)
    Answered,
    /// The relay failed and the bot turn holds the error message
    Failed,
}

/// A submission whose user turn is already in the transcript, awaiting its answer
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub request: SolveRequest,
}

/// One chat session: transcript, draft input, subject and the pending flag.
///
/// Turns are only ever appended. A submission is two-phase: [`begin_submit`]
/// appends the user turn and raises `pending`; [`complete`] appends the bot
/// turn and clears `pending` together with the draft.
///
/// [`begin_submit`]: ChatSession::begin_submit
/// [`complete`]: ChatSession::complete
pub struct ChatSession {
    id: Uuid,
    solver: Arc<dyn Solver>,
    subject: Subject,
    transcript: Vec<ChatTurn>,
    question: String,
    image: Option<ImageAttachment>,
    pending: bool,
}

impl ChatSession {
    pub fn new(solver: Arc<dyn Solver>, subject: Subject) -> Self {
        Self {
            id: Uuid::new_v4(),
            solver,
            subject,
            transcript: Vec::new(),
            question: String::new(),
            image: None,
            pending: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Switch subject; the transcript is kept.
    pub fn set_subject(&mut self, subject: Subject) {
        if subject != self.subject {
            tracing::debug!(session = %self.id, from = %self.subject, to = %subject, "subject switched");
            self.subject = subject;
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn set_question(&mut self, question: impl Into<String>) {
        self.question = question.into();
    }

    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }

    pub fn attach_image(&mut self, image: ImageAttachment) {
        self.image = Some(image);
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    pub fn solver(&self) -> Arc<dyn Solver> {
        Arc::clone(&self.solver)
    }

    /// First phase: validate the draft, append the user turn and mark the session pending.
    pub fn begin_submit(&mut self) -> Result<PendingSubmission, SubmitOutcome> {
        if self.pending {
            return Err(SubmitOutcome::Busy);
        }
        if self.question.trim().is_empty() && self.image.is_none() {
            return Err(SubmitOutcome::Empty);
        }

        self.pending = true;
        let shown = if self.question.is_empty() {
            IMAGE_ONLY_PLACEHOLDER.to_string()
        } else {
            self.question.clone()
        };
        self.transcript.push(ChatTurn::user(shown));

        let request = SolveRequest::new(
            self.subject,
            self.question.clone(),
            self.image.as_ref().map(|i| i.data_url().to_string()),
        );
        tracing::info!(session = %self.id, subject = %self.subject, turns = self.transcript.len(), "submitting question");

        Ok(PendingSubmission { request })
    }

    /// Second phase: append the bot turn for `result` and reset the draft.
    pub fn complete(&mut self, result: Result<String, RelayError>) -> SubmitOutcome {
        let (content, outcome) = match result {
            Ok(answer) if answer.is_empty() => (EMPTY_ANSWER_FALLBACK.to_string(), SubmitOutcome::Answered),
            Ok(answer) => (answer, SubmitOutcome::Answered),
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "question failed");
                (ERROR_MESSAGE.to_string(), SubmitOutcome::Failed)
            }
        };
        self.transcript.push(ChatTurn::bot(content));

        self.pending = false;
        self.question.clear();
        self.image = None;
        outcome
    }

    /// Submit the current draft and wait for the answer.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let pending = match self.begin_submit() {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };
        let result = self.solver.solve(pending.request).await;
        self.complete(result)
    }

    /// Replace the draft with `question`/`image`, then [`submit`](ChatSession::submit).
    pub async fn ask(
        &mut self,
        question: impl Into<String>,
        image: Option<ImageAttachment>,
    ) -> SubmitOutcome {
        self.question = question.into();
        self.image = image;
        self.submit().await
    }
}
