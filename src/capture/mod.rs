//! Media capture management
//!
//! Owns the microphone on behalf of the current session: acquire/release of
//! the device, and the single-recording lifecycle that turns captured PCM
//! into immutable WAV artifacts. The session core talks to the
//! `CaptureManager` trait only; tests substitute a fake.

mod resampler;
mod types;

pub use types::{CaptureError, RecordingArtifact};

use crate::interpret::Round;
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use resampler::{SampleSink, ARTIFACT_SAMPLE_RATE};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Port trait for the capture device
///
/// At most one recording is active at any time, and the round a recording
/// belongs to is bound when it starts, never inferred later.
#[async_trait]
pub trait CaptureManager: Send {
    /// Request access to the capture device. Idempotent: acquiring while
    /// already acquired succeeds without side effects.
    async fn acquire(&mut self) -> Result<(), CaptureError>;

    /// Stop any in-progress capture and invalidate the device handle.
    /// Always safe to call, including when nothing was ever acquired.
    fn release(&mut self);

    /// Begin recording, binding `round` to the eventual artifact.
    fn start_recording(&mut self, round: Round) -> Result<(), CaptureError>;

    /// Finalize the in-progress recording into an artifact attributed to the
    /// round bound at start time.
    fn stop_recording(&mut self) -> Result<RecordingArtifact, CaptureError>;
}

/// Production capture manager over the default system microphone.
pub struct MicCapture {
    acquired: bool,
    active: Option<ActiveRecording>,
}

/// State of one in-progress recording.
struct ActiveRecording {
    round: Round,
    running: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<i16>>>,
    thread: Option<JoinHandle<()>>,
}

impl MicCapture {
    pub fn new() -> Self {
        Self {
            acquired: false,
            active: None,
        }
    }

    /// Check whether the device handle is currently valid
    #[allow(dead_code)]
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }

    /// Check whether a recording is in progress
    #[allow(dead_code)]
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureManager for MicCapture {
    async fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.acquired {
            return Ok(());
        }

        // Device probing can block on some backends; keep it off the
        // cooperative executor.
        tokio::task::spawn_blocking(probe_device)
            .await
            .map_err(|e| CaptureError::Device(e.to_string()))??;

        self.acquired = true;
        info!("Capture device acquired");
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.running.store(false, Ordering::SeqCst);
            if let Some(handle) = active.thread.take() {
                let _ = handle.join();
            }
            info!("In-progress recording discarded on release");
        }
        if self.acquired {
            self.acquired = false;
            info!("Capture device released");
        }
    }

    fn start_recording(&mut self, round: Round) -> Result<(), CaptureError> {
        if !self.acquired {
            return Err(CaptureError::NoActiveDevice);
        }
        if self.active.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let running = Arc::new(AtomicBool::new(true));
        let samples: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));

        let running_thread = running.clone();
        let samples_thread = samples.clone();
        let thread = thread::spawn(move || {
            if let Err(e) = run_capture(running_thread, samples_thread) {
                error!("Capture thread error: {}", e);
            }
        });

        self.active = Some(ActiveRecording {
            round,
            running,
            samples,
            thread: Some(thread),
        });
        info!(round = %round, "Recording started");
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<RecordingArtifact, CaptureError> {
        let mut active = self.active.take().ok_or(CaptureError::NotRecording)?;

        active.running.store(false, Ordering::SeqCst);
        if let Some(handle) = active.thread.take() {
            let _ = handle.join();
        }

        let samples = active
            .samples
            .lock()
            .map_err(|_| CaptureError::Device("recording buffer poisoned".into()))?;
        let bytes = encode_wav(&samples, ARTIFACT_SAMPLE_RATE)?;
        info!(
            round = %active.round,
            samples = samples.len(),
            "Recording finalized"
        );
        Ok(RecordingArtifact::new(active.round, bytes))
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.release();
    }
}

/// Check that a usable input device exists without keeping it open.
fn probe_device() -> Result<(), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::DeviceUnavailable)?;
    device
        .default_input_config()
        .map(|_| ())
        .map_err(map_config_error)
}

/// Run one capture stream until `running` is cleared (blocking).
fn run_capture(
    running: Arc<AtomicBool>,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<(), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::DeviceUnavailable)?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let default_config = device.default_input_config().map_err(map_config_error)?;
    let sample_format = default_config.sample_format();
    let config: cpal::StreamConfig = default_config.into();
    let device_rate = config.sample_rate.0;
    let channels = config.channels as usize;
    info!(
        "Recording from '{}': {} channels, {} Hz",
        device_name, channels, device_rate
    );

    let mut sink = SampleSink::new(samples, device_rate);
    let err_callback = |err| {
        error!("Capture stream error: {}", err);
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let running_cb = running.clone();
            device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        if !running_cb.load(Ordering::SeqCst) {
                            return;
                        }
                        sink.push(data, channels);
                    },
                    err_callback,
                    None,
                )
                .map_err(map_build_error)?
        }
        SampleFormat::F32 => {
            let running_cb = running.clone();
            device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        if !running_cb.load(Ordering::SeqCst) {
                            return;
                        }
                        let converted: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * 32_767.0) as i16)
                            .collect();
                        sink.push(&converted, channels);
                    },
                    err_callback,
                    None,
                )
                .map_err(map_build_error)?
        }
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported sample format {:?}",
                other
            )));
        }
    };

    stream
        .play()
        .map_err(|e| CaptureError::Device(e.to_string()))?;

    while running.load(Ordering::SeqCst) {
        thread::sleep(std::time::Duration::from_millis(50));
    }

    drop(stream);
    Ok(())
}

/// Encode mono PCM samples into an in-memory WAV container.
fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Device(format!("WAV encoding failed: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| CaptureError::Device(format!("WAV encoding failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Device(format!("WAV encoding failed: {}", e)))?;
    }
    Ok(cursor.into_inner())
}

fn map_config_error(e: cpal::DefaultStreamConfigError) -> CaptureError {
    match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        cpal::DefaultStreamConfigError::BackendSpecific { err } => classify_backend(err.description),
        other => CaptureError::Device(other.to_string()),
    }
}

fn map_build_error(e: cpal::BuildStreamError) -> CaptureError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
        cpal::BuildStreamError::BackendSpecific { err } => classify_backend(err.description),
        other => CaptureError::Device(other.to_string()),
    }
}

fn classify_backend(description: String) -> CaptureError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Device(description)
    }
}
