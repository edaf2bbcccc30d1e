//! Session controller - the interview orchestrator
//!
//! Owns the session state and mediates the three I/O channels (speech
//! output, speech recognition, camera capture) around the submission
//! request/response cycle. Every failure path returns control to a
//! well-defined state; nothing advances the session except an `Advance`
//! result from the server.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::capture::CaptureSource;
use crate::client::{SubmissionApi, SubmissionResult};
use crate::config::Config;
use crate::voice::{RecognitionEvent, RecognitionUpdate, Recognizer, Speaker};
use crate::{Error, Result};

/// Logical progress of one interview run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    current_question: String,
    current_index: u32,
    total_questions: u32,
    terminated: bool,
}

impl Session {
    /// Text of the question currently awaiting an answer
    #[must_use]
    pub fn current_question(&self) -> &str {
        &self.current_question
    }

    /// Ordinal of the current question (1-based)
    #[must_use]
    pub const fn current_index(&self) -> u32 {
        self.current_index
    }

    /// Total number of questions, fixed for the session lifetime
    #[must_use]
    pub const fn total_questions(&self) -> u32 {
        self.total_questions
    }

    /// Whether the server has reported completion
    #[must_use]
    pub const fn terminated(&self) -> bool {
        self.terminated
    }
}

/// An answer bundled for submission; ephemeral, never kept past the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    /// Non-empty trimmed answer text
    pub text: String,
    /// Data-URL JPEG snapshot, or `None` in degraded no-camera mode
    pub snapshot: Option<String>,
}

/// Where the controller is in the question cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for a recognized, typed, or re-triggered answer
    AwaitingAnswer,
    /// A submission request is in flight
    Submitting,
    /// Terminal; no further recognition or capture activity
    Complete,
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Blocking notice (the alert boundary of the interface)
    Alert,
    /// Inline message next to the answer field
    Inline,
}

/// A message surfaced to the respondent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Text shown to the respondent
    pub message: String,
    /// When it was raised
    pub at: DateTime<Utc>,
}

/// What the caller should do after a submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Keep the session going
    Continue,
    /// Navigate to the completion destination; the session is over
    Complete {
        /// Destination path, e.g. `/complete`
        destination: String,
    },
}

/// Server-rendered initial page context
#[derive(Debug, Clone)]
pub struct InitialContext {
    /// First question text
    pub question: String,
    /// Literal progress label, `"Question <current> of <total>"`
    pub progress: String,
}

/// Drives one interview session end to end
pub struct SessionController {
    id: Uuid,
    session: Session,
    phase: SessionPhase,
    answer: String,
    recognition_epoch: u64,
    submitting: bool,
    camera_ready: bool,
    notices: Vec<Notice>,
    speaker: Box<dyn Speaker>,
    recognizer: Box<dyn Recognizer>,
    capture: Box<dyn CaptureSource>,
    api: Box<dyn SubmissionApi>,
    initial_listen_delay: Duration,
    advance_listen_delay: Duration,
    complete_path: String,
}

impl SessionController {
    /// Create a controller from the initial page context
    ///
    /// # Errors
    ///
    /// Returns error if the progress label does not parse
    pub fn new(
        context: InitialContext,
        speaker: Box<dyn Speaker>,
        recognizer: Box<dyn Recognizer>,
        capture: Box<dyn CaptureSource>,
        api: Box<dyn SubmissionApi>,
        config: &Config,
    ) -> Result<Self> {
        let (current_index, total_questions) = parse_progress(&context.progress)?;

        Ok(Self {
            id: Uuid::new_v4(),
            session: Session {
                current_question: context.question,
                current_index,
                total_questions,
                terminated: false,
            },
            phase: SessionPhase::AwaitingAnswer,
            answer: String::new(),
            recognition_epoch: 0,
            submitting: false,
            camera_ready: false,
            notices: Vec::new(),
            speaker,
            recognizer,
            capture,
            api,
            initial_listen_delay: config.timing.initial_listen_delay,
            advance_listen_delay: config.timing.advance_listen_delay,
            complete_path: config.complete_path.clone(),
        })
    }

    /// Init: open the camera, speak the first question, then start
    /// listening after the configured delay (so the recognizer does not
    /// pick up the synthesized voice)
    pub async fn start(&mut self) {
        tracing::info!(
            session = %self.id,
            progress = %self.progress_label(),
            "session started"
        );

        match self.capture.open() {
            Ok(()) => self.camera_ready = true,
            Err(e) => {
                tracing::warn!(error = %e, "camera unavailable, continuing without imagery");
                self.notify(NoticeLevel::Alert, format!("Unable to access camera: {e}"));
            }
        }

        self.speaker.speak(self.session.current_question());
        tokio::time::sleep(self.initial_listen_delay).await;
        self.begin_listening();
    }

    /// Manual mic re-trigger (the Speak button)
    pub fn retrigger_listening(&mut self) {
        if self.session.terminated {
            return;
        }
        self.begin_listening();
    }

    fn begin_listening(&mut self) {
        match self.recognizer.start() {
            Ok(epoch) => {
                self.recognition_epoch = epoch;
                tracing::debug!(epoch, "listening for answer");
            }
            Err(Error::Unsupported(_)) => {
                self.notify(
                    NoticeLevel::Alert,
                    "Speech recognition is not available. Please type your answer instead.",
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not start listening");
                self.notify(NoticeLevel::Alert, format!("Could not start listening: {e}"));
            }
        }
    }

    /// Consume one recognition event
    ///
    /// Events from a listening session other than the current one are
    /// dropped; a straggler from a previous question can never touch the
    /// current answer field.
    pub fn handle_recognition(&mut self, update: RecognitionUpdate) {
        if self.session.terminated {
            tracing::trace!("recognition event after completion ignored");
            return;
        }
        if update.epoch != self.recognition_epoch {
            tracing::trace!(
                epoch = update.epoch,
                current = self.recognition_epoch,
                "stale recognition event ignored"
            );
            return;
        }

        match update.event {
            RecognitionEvent::Result(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    tracing::info!(transcript = %text, "recognized answer");
                    self.answer = text.to_string();
                }
            }
            RecognitionEvent::Error(code) if code == "no-speech" => {
                self.notify(NoticeLevel::Alert, "No speech detected. Please try again.");
            }
            RecognitionEvent::Error(code) => {
                self.notify(
                    NoticeLevel::Alert,
                    format!("Speech recognition error: {code}"),
                );
            }
            RecognitionEvent::Ended => {
                tracing::debug!("listening session ended");
            }
        }
    }

    /// Manual text entry; last write wins
    pub fn set_answer(&mut self, text: impl Into<String>) {
        if !self.session.terminated {
            self.answer = text.into();
        }
    }

    /// Explicit submission of the current answer
    ///
    /// Transport and validation failures are surfaced as notices and
    /// leave the session in `AwaitingAnswer` with the answer intact.
    pub async fn submit_answer(&mut self) -> SessionOutcome {
        if self.session.terminated {
            return SessionOutcome::Complete {
                destination: self.complete_path.clone(),
            };
        }
        if self.submitting {
            tracing::debug!("submission already in flight, ignored");
            return SessionOutcome::Continue;
        }

        let text = self.answer.trim().to_string();
        if text.is_empty() {
            self.notify(
                NoticeLevel::Inline,
                "Please provide an answer, either by speaking or typing.",
            );
            return SessionOutcome::Continue;
        }

        self.submitting = true;
        self.phase = SessionPhase::Submitting;

        // Snapshot is taken fresh per attempt; a failed submission
        // discards it and it is recomputed on retry.
        let snapshot = if self.camera_ready {
            self.capture.snapshot().map(|s| s.data_url)
        } else {
            None
        };

        let pending = PendingAnswer { text, snapshot };
        let result = self.api.submit(pending).await;
        self.submitting = false;

        match result {
            Err(e) => {
                tracing::error!(error = %e, "submission failed");
                self.notify(
                    NoticeLevel::Alert,
                    "Error submitting your answer. Please try again.",
                );
                self.phase = SessionPhase::AwaitingAnswer;
                SessionOutcome::Continue
            }
            Ok(SubmissionResult::Complete) => {
                self.session.terminated = true;
                self.phase = SessionPhase::Complete;
                self.recognition_epoch = 0;
                tracing::info!(session = %self.id, "session complete");
                SessionOutcome::Complete {
                    destination: self.complete_path.clone(),
                }
            }
            Ok(SubmissionResult::Advance {
                next_question,
                next_index,
            }) => self.advance(next_question, next_index).await,
        }
    }

    /// Apply an `Advance` result: new question, cleared field, spoken
    /// prompt, delayed recognition restart
    async fn advance(&mut self, next_question: String, next_index: u32) -> SessionOutcome {
        // The ordinal must stay monotone and within the fixed total; a
        // server response violating that is treated like a transport
        // failure and applies nothing.
        if next_index < self.session.current_index || next_index > self.session.total_questions {
            tracing::error!(
                next_index,
                current = self.session.current_index,
                total = self.session.total_questions,
                "out-of-range ordinal in advance response"
            );
            self.notify(
                NoticeLevel::Alert,
                "Error submitting your answer. Please try again.",
            );
            self.phase = SessionPhase::AwaitingAnswer;
            return SessionOutcome::Continue;
        }

        self.session.current_question = next_question;
        self.session.current_index = next_index;
        self.answer.clear();
        self.recognition_epoch = 0;
        self.phase = SessionPhase::AwaitingAnswer;

        tracing::info!(progress = %self.progress_label(), "advanced to next question");

        self.speaker.speak(self.session.current_question());
        tokio::time::sleep(self.advance_listen_delay).await;
        self.begin_listening();

        SessionOutcome::Continue
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "user notice");
        self.notices.push(Notice {
            level,
            message,
            at: Utc::now(),
        });
    }

    /// Session identifier (for log correlation)
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The observable session state
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// The answer field as currently displayed
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// The progress label, `"Question <current> of <total>"`
    #[must_use]
    pub fn progress_label(&self) -> String {
        format!(
            "Question {} of {}",
            self.session.current_index, self.session.total_questions
        )
    }

    /// Whether the camera opened at session start
    #[must_use]
    pub const fn camera_ready(&self) -> bool {
        self.camera_ready
    }

    /// Epoch of the listening session whose events are currently accepted
    #[must_use]
    pub const fn recognition_epoch(&self) -> u64 {
        self.recognition_epoch
    }

    /// Notices raised so far, oldest first
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drain accumulated notices for display
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Parse `"Question <current> of <total>"` into (current, total)
fn parse_progress(progress: &str) -> Result<(u32, u32)> {
    let parse = || {
        let (left, right) = progress.split_once(" of ")?;
        let current: u32 = left.split_whitespace().last()?.parse().ok()?;
        let total: u32 = right.trim().parse().ok()?;
        (current >= 1 && total >= 1 && current <= total).then_some((current, total))
    };

    parse().ok_or_else(|| Error::Config(format!("unparseable progress label: {progress:?}")))
}
