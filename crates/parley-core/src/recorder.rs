//! MediaRecorder trait definition.
//!
//! Capturing audio or video is platform work that lives outside the core.
//! The view only needs to start a capture and receive the finished clip,
//! which it uploads and attaches to the draft like any other file.

use parley_types::chat::MessageType;
use parley_types::error::RecordingError;

/// What to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingKind {
    Audio,
    Video,
}

impl RecordingKind {
    /// Declared message type for a clip of this kind. Recorded clips are
    /// usually `.webm`, so the declared type decides how they render.
    pub fn message_type(self) -> MessageType {
        match self {
            RecordingKind::Audio => MessageType::Audio,
            RecordingKind::Video => MessageType::Video,
        }
    }
}

/// A finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedClip {
    pub kind: RecordingKind,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Port for audio/video capture.
pub trait MediaRecorder: Send + Sync {
    fn start(
        &self,
        kind: RecordingKind,
    ) -> impl std::future::Future<Output = Result<(), RecordingError>> + Send;

    /// Stop the running capture and return the clip.
    fn stop(&self) -> impl std::future::Future<Output = Result<RecordedClip, RecordingError>> + Send;

    fn is_recording(&self) -> bool;
}

/// Recorder for environments without capture devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecorder;

impl MediaRecorder for NoRecorder {
    async fn start(&self, _kind: RecordingKind) -> Result<(), RecordingError> {
        Err(RecordingError::Unavailable(
            "no capture device configured".to_string(),
        ))
    }

    async fn stop(&self) -> Result<RecordedClip, RecordingError> {
        Err(RecordingError::NotRecording)
    }

    fn is_recording(&self) -> bool {
        false
    }
}
