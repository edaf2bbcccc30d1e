//! Configuration for the interview kiosk

use std::time::Duration;

/// Kiosk configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the interview server
    pub server_url: String,

    /// Path navigated to when the session completes
    pub complete_path: String,

    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// Session timing configuration
    pub timing: TimingConfig,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// API key for the speech provider (STT and TTS)
    pub api_key: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

/// Session timing configuration
///
/// The listen delays keep the recognizer from picking up the tail of the
/// synthesized question. They mirror the original interface timings.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Delay between speaking the first question and starting recognition
    pub initial_listen_delay: Duration,

    /// Delay between speaking an advanced-to question and restarting recognition
    pub advance_listen_delay: Duration,

    /// How long a listening session waits for any speech before giving up
    pub no_speech_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            complete_path: "/complete".to_string(),
            voice: VoiceConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_listen_delay: Duration::from_millis(500),
            advance_listen_delay: Duration::from_millis(700),
            no_speech_timeout: Duration::from_secs(6),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("KIOSK_SERVER_URL") {
            config.server_url = url;
        }
        if let Ok(path) = std::env::var("KIOSK_COMPLETE_PATH") {
            config.complete_path = path;
        }
        if let Ok(key) = std::env::var("KIOSK_SPEECH_API_KEY") {
            if !key.is_empty() {
                config.voice.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("KIOSK_STT_MODEL") {
            config.voice.stt_model = model;
        }
        if let Ok(model) = std::env::var("KIOSK_TTS_MODEL") {
            config.voice.tts_model = model;
        }
        if let Ok(voice) = std::env::var("KIOSK_TTS_VOICE") {
            config.voice.tts_voice = voice;
        }
        if let Ok(speed) = std::env::var("KIOSK_TTS_SPEED") {
            if let Ok(speed) = speed.parse::<f64>() {
                config.voice.tts_speed = speed.clamp(0.25, 4.0);
            }
        }

        config
    }
}
