use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Duration;

use crate::error::RelayError;
use crate::relay::{SolveRequest, Solver};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `answer` may be `null` when the upstream message had no content
#[derive(Deserialize)]
struct AnswerBody {
    #[serde(default)]
    answer: Option<String>,
}

/// Talks to a running `solvr serve` over its HTTP contract
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/solve", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Solver for RelayClient {
    async fn solve(&self, request: SolveRequest) -> Result<String, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(RelayError::Api {
                status: status.as_u16(),
                body: message,
            });
        }

        let answer: AnswerBody = serde_json::from_str(&body)
            .map_err(|e| RelayError::MalformedResponse(e.to_string()))?;
        Ok(answer.answer.unwrap_or_default())
    }
}
