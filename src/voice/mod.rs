//! Voice input/output processing
//!
//! Speech synthesis for question playback, microphone capture with
//! utterance segmentation, and cloud transcription of completed segments.

mod input;
mod mic;
mod output;
mod stt;

pub use input::{InputState, UtteranceDetector, VoiceInput};
pub use mic::{AudioSource, Microphone, samples_to_wav};
pub use output::VoiceOutput;
pub use stt::{Transcribe, Transcriber};

use crate::Result;

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Event emitted by a recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A finalized transcript; all finalized segments of the session joined
    Result(String),
    /// Recognizer failure code (e.g. "no-speech")
    Error(String),
    /// The listening session stopped, successfully or not
    Ended,
}

/// A recognition event stamped with the listening session that produced it
///
/// The epoch lets consumers drop events from a session they are no longer
/// interested in, so stragglers cannot contaminate a later question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionUpdate {
    /// Listening-session epoch, monotonically increasing per input source
    pub epoch: u64,
    /// The event itself
    pub event: RecognitionEvent,
}

/// Speaks text aloud, fire-and-forget
pub trait Speaker {
    /// Begin speaking `text`. Returns immediately; playback failures are
    /// logged by the implementation and never reach the caller.
    fn speak(&self, text: &str);
}

/// Starts listening sessions on a speech recognizer
pub trait Recognizer {
    /// Begin a listening session, returning its epoch.
    ///
    /// Starting while already listening is a no-op and returns the epoch of
    /// the session already in progress.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::Error::Unsupported`] when the capability was
    /// never available, or with a device error if the microphone cannot start.
    fn start(&mut self) -> Result<u64>;
}
