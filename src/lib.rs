//! Interview Kiosk - voice-driven interview session client
//!
//! Drives an automated interview against a remote server: each question is
//! spoken aloud, the respondent's spoken or typed answer is captured
//! together with a camera snapshot, and the pair is submitted until the
//! server reports completion. A companion analytics module shapes the
//! aggregate sentiment/emotion payload into chart models.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │               SessionController                  │
//! │  question cycle · validation · submission guard  │
//! └───────┬──────────┬──────────┬──────────┬─────────┘
//!         │          │          │          │
//!    VoiceOutput VoiceInput CaptureSource SubmitClient
//!      (TTS)     (mic+STT)   (snapshots)  (HTTP server)
//! ```

pub mod analytics;
pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod voice;

pub use analytics::AnalyticsView;
pub use capture::{CameraCapture, CaptureSource, Frame, FrameSink, Snapshot};
pub use client::{AnalyticsSummary, SubmissionApi, SubmissionResult, SubmitClient, SubmitRequest};
pub use config::{Config, TimingConfig, VoiceConfig};
pub use error::{Error, Result};
pub use session::{
    InitialContext, Notice, NoticeLevel, PendingAnswer, Session, SessionController,
    SessionOutcome, SessionPhase,
};
pub use voice::{
    InputState, RecognitionEvent, RecognitionUpdate, Recognizer, Speaker, VoiceInput, VoiceOutput,
};
