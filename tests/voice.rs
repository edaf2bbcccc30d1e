//! Voice input integration tests
//!
//! Exercises utterance segmentation and WAV encoding without audio
//! hardware, using synthetic samples.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use interview_kiosk::voice::{
    samples_to_wav, AudioSource, InputState, Transcribe, UtteranceDetector, VoiceInput,
    SAMPLE_RATE,
};
use interview_kiosk::{Error, RecognitionEvent, Recognizer, Result};
use tokio::sync::mpsc;

/// Generate sine wave audio samples
fn sine(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
fn silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

#[test]
fn test_silence_never_starts_an_utterance() {
    let mut detector = UtteranceDetector::new();

    assert!(detector.feed(&silence(0.5)).is_none());
    assert!(!detector.in_speech());
}

#[test]
fn test_speech_then_silence_finalizes() {
    let mut detector = UtteranceDetector::new();

    assert!(detector.feed(&sine(440.0, 0.5, 0.3)).is_none());
    assert!(detector.in_speech());

    let utterance = detector.feed(&silence(0.6)).expect("utterance finalized");
    assert!(utterance.len() >= (SAMPLE_RATE as f32 * 0.5) as usize);
    assert!(!detector.in_speech());
}

#[test]
fn test_brief_blip_is_discarded() {
    let mut detector = UtteranceDetector::new();

    detector.feed(&sine(440.0, 0.1, 0.3));
    assert!(detector.feed(&silence(0.6)).is_none());
    assert!(!detector.in_speech());
}

#[test]
fn test_detector_handles_consecutive_utterances() {
    let mut detector = UtteranceDetector::new();

    detector.feed(&sine(440.0, 0.5, 0.3));
    assert!(detector.feed(&silence(0.6)).is_some());

    detector.feed(&sine(220.0, 0.4, 0.3));
    assert!(detector.feed(&silence(0.6)).is_some());
}

#[test]
fn test_reset_discards_buffered_speech() {
    let mut detector = UtteranceDetector::new();

    detector.feed(&sine(440.0, 0.5, 0.3));
    detector.reset();

    assert!(!detector.in_speech());
    assert!(detector.feed(&silence(0.6)).is_none());
}

#[test]
fn test_wav_encoding_of_an_utterance() {
    let samples = sine(440.0, 0.25, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    assert_eq!(&wav[..4], b"RIFF");
    // 44-byte header plus two bytes per 16-bit sample
    assert_eq!(wav.len(), 44 + samples.len() * 2);
}

/// Audio source that replays scripted sample batches, one per poll
struct ScriptedAudio {
    batches: VecDeque<Vec<f32>>,
}

impl AudioSource for ScriptedAudio {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn take_samples(&mut self) -> Vec<f32> {
        self.batches.pop_front().unwrap_or_default()
    }
}

/// Transcriber that replays scripted replies
struct ScriptedTranscriber {
    replies: RefCell<VecDeque<Result<String>>>,
}

#[async_trait(?Send)]
impl Transcribe for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

fn scripted_input(
    batches: Vec<Vec<f32>>,
    replies: Vec<Result<String>>,
    events: mpsc::UnboundedSender<interview_kiosk::RecognitionUpdate>,
) -> VoiceInput {
    VoiceInput::from_parts(
        Box::new(ScriptedAudio {
            batches: batches.into(),
        }),
        Box::new(ScriptedTranscriber {
            replies: RefCell::new(replies.into()),
        }),
        Duration::from_secs(6),
        events,
    )
}

#[tokio::test(start_paused = true)]
async fn test_listening_session_joins_segments_into_one_result() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let batches = vec![
        sine(440.0, 0.5, 0.3),
        silence(0.6),
        sine(220.0, 0.5, 0.3),
        silence(0.6),
    ];
    let replies = vec![Ok("hello".to_string()), Ok("there".to_string())];
    let mut input = scripted_input(batches, replies, tx);

    assert_eq!(input.start().unwrap(), 1);
    assert_eq!(input.state(), InputState::Listening);

    for _ in 0..4 {
        input.process().await;
    }
    // The session stays open for a follow-on utterance
    assert!(rx.try_recv().is_err());

    tokio::time::advance(Duration::from_millis(1100)).await;
    input.process().await;

    let first = rx.try_recv().unwrap();
    assert_eq!(first.epoch, 1);
    assert_eq!(
        first.event,
        RecognitionEvent::Result("hello there".to_string())
    );
    assert_eq!(rx.try_recv().unwrap().event, RecognitionEvent::Ended);
    // One result max per session, then nothing further
    assert!(rx.try_recv().is_err());
    assert_eq!(input.state(), InputState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_no_speech_times_out_with_error_then_ended() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut input = scripted_input(Vec::new(), Vec::new(), tx);

    input.start().unwrap();
    input.process().await;
    assert!(rx.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(6)).await;
    input.process().await;

    assert_eq!(
        rx.try_recv().unwrap().event,
        RecognitionEvent::Error("no-speech".to_string())
    );
    assert_eq!(rx.try_recv().unwrap().event, RecognitionEvent::Ended);
    assert_eq!(input.state(), InputState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_transcription_failure_ends_the_session_as_network_error() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let batches = vec![sine(440.0, 0.5, 0.3), silence(0.6)];
    let replies = vec![Err(Error::Stt("service unavailable".to_string()))];
    let mut input = scripted_input(batches, replies, tx);

    input.start().unwrap();
    for _ in 0..2 {
        input.process().await;
    }

    assert_eq!(
        rx.try_recv().unwrap().event,
        RecognitionEvent::Error("network".to_string())
    );
    assert_eq!(rx.try_recv().unwrap().event, RecognitionEvent::Ended);
    assert_eq!(input.state(), InputState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_a_session_bumps_the_epoch() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let batches = vec![sine(440.0, 0.5, 0.3), silence(0.6)];
    let replies = vec![Ok("first".to_string())];
    let mut input = scripted_input(batches, replies, tx);

    assert_eq!(input.start().unwrap(), 1);
    // Restart while listening is a no-op that keeps the epoch
    assert_eq!(input.start().unwrap(), 1);

    for _ in 0..2 {
        input.process().await;
    }
    tokio::time::advance(Duration::from_millis(1100)).await;
    input.process().await;
    assert_eq!(rx.try_recv().unwrap().epoch, 1);
    assert_eq!(rx.try_recv().unwrap().event, RecognitionEvent::Ended);

    // A fresh session gets the next epoch
    assert_eq!(input.start().unwrap(), 2);
}

#[tokio::test]
async fn test_unavailable_input_reports_unsupported() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut input = VoiceInput::unavailable(tx);

    assert_eq!(input.state(), InputState::Unavailable);
    assert!(matches!(input.start(), Err(Error::Unsupported(_))));

    // No events were emitted and processing is a quiet no-op
    input.process().await;
    assert!(rx.try_recv().is_err());
}
