//! Shared test doubles for the session controller
//!
//! The controller is exercised entirely through its trait seams: a
//! recording speaker, a scripted recognizer, a stub camera, and a
//! scripted submission API. No audio hardware, no network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use interview_kiosk::{
    CaptureSource, Config, Error, InitialContext, PendingAnswer, Recognizer, Result,
    SessionController, Snapshot, Speaker, SubmissionApi, SubmissionResult,
};

/// Speaker that records everything it is asked to say
pub struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl Speaker for RecordingSpeaker {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

/// Recognizer that hands out sequential epochs, or always fails as
/// unsupported
pub struct ScriptedRecognizer {
    epoch: Arc<Mutex<u64>>,
    unsupported: bool,
}

impl Recognizer for ScriptedRecognizer {
    fn start(&mut self) -> Result<u64> {
        if self.unsupported {
            return Err(Error::Unsupported("no speech recognition".to_string()));
        }
        let mut epoch = self.epoch.lock().unwrap();
        *epoch += 1;
        Ok(*epoch)
    }
}

/// Camera that either serves a fixed frame or never opens
pub struct StubCamera {
    available: bool,
    snapshots: Arc<AtomicUsize>,
}

impl CaptureSource for StubCamera {
    fn open(&mut self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::Camera("permission denied".to_string()))
        }
    }

    fn snapshot(&self) -> Option<Snapshot> {
        if !self.available {
            return None;
        }
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        Some(Snapshot {
            data_url: "data:image/jpeg;base64,dGVzdC1mcmFtZQ==".to_string(),
            width: 320,
            height: 240,
        })
    }
}

/// Submission API that replays a script and records every call
pub struct ScriptedApi {
    script: Mutex<VecDeque<Result<SubmissionResult>>>,
    calls: Arc<Mutex<Vec<PendingAnswer>>>,
}

#[async_trait]
impl SubmissionApi for ScriptedApi {
    async fn submit(&self, answer: PendingAnswer) -> Result<SubmissionResult> {
        self.calls.lock().unwrap().push(answer);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("unscripted submission".to_string())))
    }
}

/// A fully wired controller plus handles to observe its collaborators
pub struct Harness {
    pub controller: SessionController,
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub calls: Arc<Mutex<Vec<PendingAnswer>>>,
    pub snapshots: Arc<AtomicUsize>,
    pub epochs: Arc<Mutex<u64>>,
}

impl Harness {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<PendingAnswer> {
        self.calls.lock().unwrap().clone()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }
}

/// Options for building a harness
pub struct HarnessSpec<'a> {
    pub question: &'a str,
    pub progress: &'a str,
    pub script: Vec<Result<SubmissionResult>>,
    pub camera: bool,
    pub speech: bool,
}

impl Default for HarnessSpec<'_> {
    fn default() -> Self {
        Self {
            question: "What is your favorite color?",
            progress: "Question 1 of 3",
            script: Vec::new(),
            camera: true,
            speech: true,
        }
    }
}

/// Build a controller over test doubles with zeroed listen delays
#[must_use]
pub fn harness(spec: HarnessSpec) -> Harness {
    let spoken = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let snapshots = Arc::new(AtomicUsize::new(0));
    let epochs = Arc::new(Mutex::new(0));

    let config = Config {
        timing: interview_kiosk::TimingConfig {
            initial_listen_delay: Duration::ZERO,
            advance_listen_delay: Duration::ZERO,
            ..interview_kiosk::TimingConfig::default()
        },
        ..Config::default()
    };

    let controller = SessionController::new(
        InitialContext {
            question: spec.question.to_string(),
            progress: spec.progress.to_string(),
        },
        Box::new(RecordingSpeaker {
            spoken: Arc::clone(&spoken),
        }),
        Box::new(ScriptedRecognizer {
            epoch: Arc::clone(&epochs),
            unsupported: !spec.speech,
        }),
        Box::new(StubCamera {
            available: spec.camera,
            snapshots: Arc::clone(&snapshots),
        }),
        Box::new(ScriptedApi {
            script: Mutex::new(spec.script.into()),
            calls: Arc::clone(&calls),
        }),
        &config,
    )
    .expect("valid initial context");

    Harness {
        controller,
        spoken,
        calls,
        snapshots,
        epochs,
    }
}
