//! HTTP boundary: answer submission and the analytics payload

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::session::PendingAnswer;
use crate::{Error, Result};

/// Submission request body
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    /// The trimmed answer text
    pub answer: String,
    /// Data-URL JPEG snapshot; `null` in degraded no-camera mode
    pub image: Option<String>,
}

/// Submission response body
#[derive(Debug, Clone, Deserialize)]
struct SubmitResponse {
    done: bool,
    next_question: Option<String>,
    current: Option<u32>,
}

/// Server instruction applied to the session after a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// Move to the next question
    Advance {
        /// Text of the next question
        next_question: String,
        /// New question ordinal (1-based)
        next_index: u32,
    },
    /// No further questions remain
    Complete,
}

/// Aggregate sentiment/emotion payload from `GET /api/analytics`
///
/// Key order is significant downstream (chart slices follow it), hence
/// the order-preserving maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    /// Sentiment label -> count
    pub sentiment_counts: IndexMap<String, u64>,
    /// Emotion label -> count
    pub emotion_counts: IndexMap<String, u64>,
}

/// Submits answers to the interview server
#[async_trait]
pub trait SubmissionApi {
    /// Submit one answer, consuming it, and return the server's instruction
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed
    async fn submit(&self, answer: PendingAnswer) -> Result<SubmissionResult>;
}

/// HTTP client for the interview server
pub struct SubmitClient {
    client: reqwest::Client,
    base_url: String,
}

impl SubmitClient {
    /// Create a client for the given server base URL
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the aggregate analytics payload
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the payload does not decode
    pub async fn fetch_analytics(&self) -> Result<AnalyticsSummary> {
        let url = format!("{}/api/analytics", self.base_url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "analytics fetch failed {status}: {body}"
            )));
        }

        let summary = response.json().await?;
        Ok(summary)
    }
}

#[async_trait]
impl SubmissionApi for SubmitClient {
    async fn submit(&self, answer: PendingAnswer) -> Result<SubmissionResult> {
        let url = format!("{}/submit", self.base_url);
        let request = SubmitRequest {
            answer: answer.text,
            image: answer.snapshot,
        };

        tracing::debug!(url, has_image = request.image.is_some(), "submitting answer");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "submission request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "submission rejected");
            return Err(Error::Transport(format!(
                "submission failed {status}: {body}"
            )));
        }

        let body: SubmitResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse submission response");
            e
        })?;

        into_result(body)
    }
}

/// Map the wire response to a [`SubmissionResult`], rejecting an advance
/// that lacks its question or ordinal
fn into_result(body: SubmitResponse) -> Result<SubmissionResult> {
    if body.done {
        return Ok(SubmissionResult::Complete);
    }

    match (body.next_question, body.current) {
        (Some(next_question), Some(next_index)) => Ok(SubmissionResult::Advance {
            next_question,
            next_index,
        }),
        _ => Err(Error::Transport(
            "malformed advance response: missing next_question or current".to_string(),
        )),
    }
}
