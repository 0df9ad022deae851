//! Capture types and error definitions

use crate::interpret::Round;
use thiserror::Error;

/// A finalized recording
///
/// An opaque encoded blob plus the round it was bound to when recording
/// started. The core never looks inside the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub round: Round,
    pub bytes: Vec<u8>,
    pub label: &'static str,
}

impl RecordingArtifact {
    pub fn new(round: Round, bytes: Vec<u8>) -> Self {
        Self {
            round,
            bytes,
            label: round.label(),
        }
    }
}

/// Errors that can occur while managing the capture device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("Access to the capture device was denied")]
    PermissionDenied,

    #[error("No capture device is available")]
    DeviceUnavailable,

    #[error("No active capture device")]
    NoActiveDevice,

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording is in progress")]
    NotRecording,

    #[error("Capture device error: {0}")]
    Device(String),
}
