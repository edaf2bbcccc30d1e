//! Camera capture and snapshot encoding
//!
//! The camera feed is a single shared device: whatever platform integration
//! drives it pushes JPEG frames into a [`FrameSink`], and [`CameraCapture`]
//! reads the latest frame on demand. A snapshot is the current frame wrapped
//! as a base64 data-URL, ready for the submission body.

use std::sync::{Arc, Mutex};

use base64::Engine;

use crate::{Error, Result};

/// Fallback logical width while the feed is still warming up
pub const FALLBACK_WIDTH: u32 = 320;

/// Fallback logical height while the feed is still warming up
pub const FALLBACK_HEIGHT: u32 = 240;

/// A JPEG-encoded video frame with native dimensions when known
#[derive(Debug, Clone)]
pub struct Frame {
    /// JPEG bytes as delivered by the device
    pub jpeg: Vec<u8>,
    /// Native width, if the device has reported it yet
    pub width: Option<u32>,
    /// Native height, if the device has reported it yet
    pub height: Option<u32>,
}

/// A still image taken from the live feed, encoded for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// `data:image/jpeg;base64,...` payload for the submission body
    pub data_url: String,
    /// Logical width (native, or the fallback)
    pub width: u32,
    /// Logical height (native, or the fallback)
    pub height: u32,
}

/// Produces on-demand snapshots of the live camera feed
pub trait CaptureSource {
    /// Acquire the camera. Called exactly once at session start; failure is
    /// non-fatal to the session (answers are submitted without imagery).
    ///
    /// # Errors
    ///
    /// Returns error if the device is absent or permission was denied
    fn open(&mut self) -> Result<()>;

    /// Render the current live frame into a still image. Safe to call
    /// repeatedly; `None` while no frame has arrived yet or the camera
    /// never opened.
    fn snapshot(&self) -> Option<Snapshot>;
}

type SharedFrame = Arc<Mutex<Option<Frame>>>;

/// Handle the device integration uses to publish frames
#[derive(Clone)]
pub struct FrameSink {
    frame: SharedFrame,
}

impl FrameSink {
    /// Replace the latest frame
    pub fn push(&self, frame: Frame) {
        if let Ok(mut latest) = self.frame.lock() {
            *latest = Some(frame);
        }
    }
}

/// Camera capture over a platform video feed
pub struct CameraCapture {
    frame: SharedFrame,
    connected: bool,
}

impl Default for CameraCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraCapture {
    /// Create a capture source with no device attached yet
    #[must_use]
    pub fn new() -> Self {
        Self {
            frame: Arc::new(Mutex::new(None)),
            connected: false,
        }
    }

    /// Attach a device feed, returning the sink it should push frames into
    pub fn attach(&mut self) -> FrameSink {
        self.connected = true;
        FrameSink {
            frame: Arc::clone(&self.frame),
        }
    }
}

impl CaptureSource for CameraCapture {
    fn open(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::Camera("no video device attached".to_string()));
        }

        tracing::debug!("camera feed opened");
        Ok(())
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let guard = self.frame.lock().ok()?;
        guard.as_ref().map(encode_snapshot)
    }
}

/// Encode a frame as a transport-ready snapshot, falling back to the
/// default logical dimensions while native ones are unknown
fn encode_snapshot(frame: &Frame) -> Snapshot {
    let encoded = base64::engine::general_purpose::STANDARD.encode(&frame.jpeg);

    Snapshot {
        data_url: format!("data:image/jpeg;base64,{encoded}"),
        width: frame.width.unwrap_or(FALLBACK_WIDTH),
        height: frame.height.unwrap_or(FALLBACK_HEIGHT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_frame(width: Option<u32>, height: Option<u32>) -> Frame {
        Frame {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xE0],
            width,
            height,
        }
    }

    #[test]
    fn test_open_without_device_fails() {
        let mut capture = CameraCapture::new();

        assert!(matches!(capture.open(), Err(Error::Camera(_))));
        assert!(capture.snapshot().is_none());
    }

    #[test]
    fn test_snapshot_encodes_latest_frame() {
        let mut capture = CameraCapture::new();
        let sink = capture.attach();
        capture.open().unwrap();

        assert!(capture.snapshot().is_none());

        sink.push(jpeg_frame(Some(640), Some(480)));
        let snapshot = capture.snapshot().unwrap();

        assert!(snapshot.data_url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(snapshot.width, 640);
        assert_eq!(snapshot.height, 480);
    }

    #[test]
    fn test_snapshot_falls_back_while_warming_up() {
        let mut capture = CameraCapture::new();
        let sink = capture.attach();
        capture.open().unwrap();

        sink.push(jpeg_frame(None, None));
        let snapshot = capture.snapshot().unwrap();

        assert_eq!(snapshot.width, FALLBACK_WIDTH);
        assert_eq!(snapshot.height, FALLBACK_HEIGHT);
    }

    #[test]
    fn test_snapshot_repeatable() {
        let mut capture = CameraCapture::new();
        let sink = capture.attach();
        capture.open().unwrap();
        sink.push(jpeg_frame(Some(320), Some(240)));

        let first = capture.snapshot().unwrap();
        let second = capture.snapshot().unwrap();
        assert_eq!(first, second);
    }
}
