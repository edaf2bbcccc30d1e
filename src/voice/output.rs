//! Speech synthesis output
//!
//! `speak` is fire-and-forget: text goes to a background worker that
//! synthesizes and plays it. Nothing here gates session progress, and no
//! failure propagates to the caller; an absent capability means silence.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tokio::sync::mpsc;

use super::Speaker;
use crate::config::VoiceConfig;
use crate::{Error, Result};

/// Sample rate of decoded TTS audio
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Speaks question text aloud
pub struct VoiceOutput {
    tx: Option<mpsc::UnboundedSender<String>>,
}

impl VoiceOutput {
    /// Build a voice output from config. Degrades to silent (rather than
    /// failing) when voice is disabled or the API key is missing.
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        if !config.enabled {
            tracing::info!("voice output disabled by configuration");
            return Self::disabled();
        }

        let Some(api_key) = config.api_key.clone() else {
            tracing::warn!("no speech API key, voice output unavailable");
            return Self::disabled();
        };

        let synth = Synthesizer {
            client: reqwest::Client::new(),
            api_key,
            model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            speed: config.tts_speed,
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                match synth.synthesize(&text).await {
                    Ok(audio) => {
                        let played =
                            tokio::task::spawn_blocking(move || play_mp3(&audio)).await;
                        match played {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::warn!(error = %e, "playback failed"),
                            Err(e) => tracing::warn!(error = %e, "playback task failed"),
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "synthesis failed"),
                }
            }
        });

        Self { tx: Some(tx) }
    }

    /// A voice output that swallows everything (capability absent)
    #[must_use]
    pub const fn disabled() -> Self {
        Self { tx: None }
    }

    /// Whether speech will actually be produced
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.tx.is_some()
    }
}

impl Speaker for VoiceOutput {
    fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        match &self.tx {
            Some(tx) => {
                tracing::debug!(text, "speaking");
                if tx.send(text.to_string()).is_err() {
                    tracing::warn!("speech worker gone, question not spoken");
                }
            }
            None => tracing::trace!("speech output unavailable, staying silent"),
        }
    }
}

/// Cloud TTS client
struct Synthesizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
    speed: f64,
}

impl Synthesizer {
    /// Synthesize text to MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Decode MP3 bytes and play them on the default output device, blocking
/// until playback finishes
fn play_mp3(mp3_data: &[u8]) -> Result<()> {
    let samples = decode_mp3(mp3_data)?;
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() <= 2
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported
        .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
        .config();
    let channels = config.channels as usize;

    let total = samples.len();
    let cursor = Arc::new(Mutex::new(0usize));
    let cursor_cb = Arc::clone(&cursor);
    let samples = Arc::new(samples);
    let samples_cb = Arc::clone(&samples);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pos) = cursor_cb.lock() else {
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    let sample = samples_cb.get(*pos).copied().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                    if *pos < samples_cb.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (total as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let deadline = std::time::Instant::now() + std::time::Duration::from_millis(duration_ms + 500);

    loop {
        let done = cursor.lock().map(|pos| *pos >= total).unwrap_or(true);
        if done || std::time::Instant::now() > deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    drop(stream);
    tracing::debug!(samples = total, "playback complete");
    Ok(())
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
