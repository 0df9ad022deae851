//! Recording artifact export
//!
//! Saves finalized recordings to the user's Documents folder, or a custom
//! location given by `MINDMIRROR_RECORDINGS_DIR`. A one-shot, best-effort
//! side effect; the session never depends on it succeeding.

use crate::capture::RecordingArtifact;
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

/// Get the recordings directory
///
/// The environment override takes precedence; otherwise recordings land
/// under Documents.
pub(crate) fn recordings_dir() -> Option<PathBuf> {
    if let Ok(custom) = std::env::var("MINDMIRROR_RECORDINGS_DIR") {
        if !custom.trim().is_empty() {
            return Some(PathBuf::from(custom));
        }
    }
    dirs::document_dir().map(|d| d.join("MindMirror").join("recordings"))
}

/// Ensure the recordings directory exists
fn ensure_recordings_dir() -> Result<PathBuf, ExportError> {
    let dir = recordings_dir().ok_or(ExportError::NoDocumentsDir)?;

    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| ExportError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;
        info!("Created recordings directory: {:?}", dir);
    }

    Ok(dir)
}

/// Save a recording artifact to a file
///
/// Returns the path to the saved file.
pub(crate) fn save_artifact(artifact: &RecordingArtifact) -> Result<PathBuf, ExportError> {
    if artifact.bytes.is_empty() {
        return Err(ExportError::EmptyArtifact);
    }

    let dir = ensure_recordings_dir()?;

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let filename = format!("reflection-{}-{}.wav", artifact.label, timestamp);
    let filepath = dir.join(&filename);

    let mut file = fs::File::create(&filepath).map_err(|e| ExportError::WriteFile {
        path: filepath.clone(),
        source: e,
    })?;
    file.write_all(&artifact.bytes)
        .map_err(|e| ExportError::WriteFile {
            path: filepath.clone(),
            source: e,
        })?;
    file.flush().map_err(|e| ExportError::WriteFile {
        path: filepath.clone(),
        source: e,
    })?;

    info!("Saved recording to: {:?}", filepath);
    Ok(filepath)
}

/// Export errors with contextual information
#[derive(Debug, thiserror::Error)]
pub(crate) enum ExportError {
    #[error("Could not find Documents directory")]
    NoDocumentsDir,

    #[error("Recording is empty")]
    EmptyArtifact,

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
