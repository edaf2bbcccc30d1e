//! Speech recognition input
//!
//! Segments microphone audio into utterances, transcribes completed
//! segments, and reports the outcome of each listening session as
//! [`RecognitionEvent`]s. One `Result` at most is emitted per session,
//! carrying every finalized segment since the session began; `Ended`
//! is emitted on every stop. Restart policy belongs to the consumer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{
    AudioSource, Microphone, RecognitionEvent, RecognitionUpdate, Recognizer, SAMPLE_RATE,
    Transcribe, Transcriber, samples_to_wav,
};
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Minimum audio energy to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum utterance length to keep (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence run that finalizes an utterance (0.5s)
const SILENCE_SAMPLES: usize = 8000;

/// How long after the last finalized segment the session stays open
/// for a follow-on utterance before emitting the result
const RESUME_WINDOW: Duration = Duration::from_millis(1000);

/// State of the voice input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    /// Capability absent at startup; terminal
    Unavailable,
    /// Ready to start a listening session
    Idle,
    /// A listening session is in progress
    Listening,
}

/// Segments a sample stream into finalized utterances by RMS energy
#[derive(Debug, Default)]
pub struct UtteranceDetector {
    in_speech: bool,
    buffer: Vec<f32>,
    silence_run: usize,
}

impl UtteranceDetector {
    /// Create a detector in its initial state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed captured samples; returns a finalized utterance when one completes
    pub fn feed(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let is_speech = rms_energy(samples) > ENERGY_THRESHOLD;

        if self.in_speech {
            self.buffer.extend_from_slice(samples);

            if is_speech {
                self.silence_run = 0;
            } else {
                self.silence_run += samples.len();
            }

            if self.silence_run > SILENCE_SAMPLES {
                let trailing = self.silence_run;
                let utterance = std::mem::take(&mut self.buffer);
                self.reset();

                // Length check excludes the trailing silence run
                if utterance.len().saturating_sub(trailing) > MIN_SPEECH_SAMPLES {
                    tracing::debug!(samples = utterance.len(), "utterance finalized");
                    return Some(utterance);
                }
                tracing::trace!(samples = utterance.len(), "utterance too short, dropped");
            }
        } else if is_speech {
            self.in_speech = true;
            self.silence_run = 0;
            self.buffer.clear();
            self.buffer.extend_from_slice(samples);
            tracing::trace!("speech onset");
        }

        None
    }

    /// Whether the detector is mid-utterance
    #[must_use]
    pub const fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Return to the initial state, discarding any buffered audio
    pub fn reset(&mut self) {
        self.in_speech = false;
        self.buffer.clear();
        self.silence_run = 0;
    }
}

/// Speech recognition input source
///
/// Drive it by calling [`VoiceInput::process`] periodically while listening;
/// events arrive on the channel given at construction, stamped with the
/// epoch of the session that produced them.
pub struct VoiceInput {
    state: InputState,
    epoch: u64,
    mic: Option<Box<dyn AudioSource>>,
    transcriber: Option<Box<dyn Transcribe>>,
    detector: UtteranceDetector,
    segments: Vec<String>,
    started_at: Option<Instant>,
    last_segment_at: Option<Instant>,
    no_speech_timeout: Duration,
    events: mpsc::UnboundedSender<RecognitionUpdate>,
}

impl VoiceInput {
    /// Build a voice input from config. Degrades to `Unavailable` (rather
    /// than failing) when voice is disabled, the API key is missing, or no
    /// microphone exists.
    #[must_use]
    pub fn new(
        config: &VoiceConfig,
        no_speech_timeout: Duration,
        events: mpsc::UnboundedSender<RecognitionUpdate>,
    ) -> Self {
        if !config.enabled {
            tracing::info!("voice input disabled by configuration");
            return Self::unavailable(events);
        }

        let Some(api_key) = config.api_key.clone() else {
            tracing::warn!("no speech API key, voice input unavailable");
            return Self::unavailable(events);
        };

        let transcriber = match Transcriber::new(api_key, config.stt_model.clone()) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "voice input unavailable");
                return Self::unavailable(events);
            }
        };

        let mic = match Microphone::new() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "no microphone, voice input unavailable");
                return Self::unavailable(events);
            }
        };

        Self::from_parts(Box::new(mic), Box::new(transcriber), no_speech_timeout, events)
    }

    /// Build a voice input over explicit audio and transcription sources
    #[must_use]
    pub fn from_parts(
        mic: Box<dyn AudioSource>,
        transcriber: Box<dyn Transcribe>,
        no_speech_timeout: Duration,
        events: mpsc::UnboundedSender<RecognitionUpdate>,
    ) -> Self {
        Self {
            state: InputState::Idle,
            epoch: 0,
            mic: Some(mic),
            transcriber: Some(transcriber),
            detector: UtteranceDetector::new(),
            segments: Vec::new(),
            started_at: None,
            last_segment_at: None,
            no_speech_timeout,
            events,
        }
    }

    /// A voice input whose capability is permanently absent
    #[must_use]
    pub fn unavailable(events: mpsc::UnboundedSender<RecognitionUpdate>) -> Self {
        Self {
            state: InputState::Unavailable,
            epoch: 0,
            mic: None,
            transcriber: None,
            detector: UtteranceDetector::new(),
            segments: Vec::new(),
            started_at: None,
            last_segment_at: None,
            no_speech_timeout: Duration::ZERO,
            events,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> InputState {
        self.state
    }

    /// Epoch of the current (or most recent) listening session
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Process captured audio. Call periodically while listening;
    /// a no-op otherwise.
    pub async fn process(&mut self) {
        if self.state != InputState::Listening {
            return;
        }

        let samples = match self.mic.as_mut() {
            Some(mic) => mic.take_samples(),
            None => Vec::new(),
        };

        if let Some(utterance) = self.detector.feed(&samples) {
            self.transcribe_segment(&utterance).await;
        }

        // Session end rules: a segment exists and the speaker has stayed
        // quiet, or nothing was ever heard within the timeout.
        if !self.segments.is_empty() {
            let quiet_for = self.last_segment_at.map_or(Duration::ZERO, |t| t.elapsed());
            if quiet_for >= RESUME_WINDOW && !self.detector.in_speech() {
                let transcript = self.segments.join(" ");
                self.finish(Some(RecognitionEvent::Result(transcript)));
            }
        } else if let Some(started) = self.started_at {
            if started.elapsed() >= self.no_speech_timeout && !self.detector.in_speech() {
                tracing::debug!("no speech within timeout");
                self.finish(Some(RecognitionEvent::Error("no-speech".to_string())));
            }
        }
    }

    /// Stop the current listening session without a result
    pub fn stop(&mut self) {
        if self.state == InputState::Listening {
            self.finish(None);
        }
    }

    async fn transcribe_segment(&mut self, utterance: &[f32]) {
        let Some(transcriber) = self.transcriber.as_ref() else {
            return;
        };

        let wav = match samples_to_wav(utterance, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode utterance");
                self.finish(Some(RecognitionEvent::Error("audio-capture".to_string())));
                return;
            }
        };

        match transcriber.transcribe(&wav).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    tracing::debug!("empty transcript, segment discarded");
                } else {
                    self.segments.push(text);
                    self.last_segment_at = Some(Instant::now());
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                self.finish(Some(RecognitionEvent::Error("network".to_string())));
            }
        }
    }

    /// End the session: emit the terminal event (if any), always emit
    /// `Ended`, and return to `Idle`.
    fn finish(&mut self, terminal: Option<RecognitionEvent>) {
        if let Some(event) = terminal {
            self.emit(event);
        }
        self.emit(RecognitionEvent::Ended);

        if let Some(mic) = self.mic.as_mut() {
            mic.stop();
        }
        self.detector.reset();
        self.segments.clear();
        self.started_at = None;
        self.last_segment_at = None;
        self.state = InputState::Idle;
    }

    fn emit(&self, event: RecognitionEvent) {
        let update = RecognitionUpdate {
            epoch: self.epoch,
            event,
        };
        if self.events.send(update).is_err() {
            tracing::trace!("recognition event receiver dropped");
        }
    }
}

impl Recognizer for VoiceInput {
    fn start(&mut self) -> Result<u64> {
        match self.state {
            InputState::Unavailable => Err(Error::Unsupported(
                "speech recognition not available on this system".to_string(),
            )),
            // Restart while listening is a no-op; the running session keeps
            // its epoch.
            InputState::Listening => Ok(self.epoch),
            InputState::Idle => {
                if let Some(mic) = self.mic.as_mut() {
                    mic.start()?;
                }
                self.epoch += 1;
                self.detector.reset();
                self.segments.clear();
                self.started_at = Some(Instant::now());
                self.last_segment_at = None;
                self.state = InputState::Listening;

                tracing::debug!(epoch = self.epoch, "listening session started");
                Ok(self.epoch)
            }
        }
    }
}

/// RMS energy of a sample slice
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy() {
        let silence = vec![0.0f32; 100];
        let loud = vec![0.5f32; 100];

        assert!(rms_energy(&silence) < 0.001);
        assert!(rms_energy(&loud) > 0.4);
        assert!(rms_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_detector_finalizes_after_silence() {
        let mut detector = UtteranceDetector::new();
        let speech = vec![0.3f32; MIN_SPEECH_SAMPLES + 1];
        let silence = vec![0.0f32; SILENCE_SAMPLES + 1];

        // Speech long enough to keep, then silence past the threshold
        assert!(detector.feed(&speech).is_none());
        assert!(detector.in_speech());

        let utterance = detector.feed(&silence);
        assert!(utterance.is_some());
        assert!(!detector.in_speech());
    }

    #[test]
    fn test_detector_drops_short_blips() {
        let mut detector = UtteranceDetector::new();
        let blip = vec![0.3f32; 800];
        let silence = vec![0.0f32; SILENCE_SAMPLES + 1];

        detector.feed(&blip);
        let utterance = detector.feed(&silence);

        assert!(utterance.is_none());
        assert!(!detector.in_speech());
    }

    #[test]
    fn test_unavailable_start_is_unsupported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut input = VoiceInput::unavailable(tx);

        assert_eq!(input.state(), InputState::Unavailable);
        assert!(matches!(input.start(), Err(Error::Unsupported(_))));
    }
}
