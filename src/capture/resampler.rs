//! Mono folding and resampling for recorded audio
//!
//! Device callbacks deliver interleaved samples at whatever rate the
//! hardware runs at; recordings are stored as mono PCM at a fixed artifact
//! rate, resampled on the fly when the device rate differs.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Sample rate of every finalized recording (16kHz mono PCM).
pub(crate) const ARTIFACT_SAMPLE_RATE: u32 = 16_000;

/// Resampler output chunk size (0.1 seconds of audio at 16kHz).
const OUTPUT_CHUNK: usize = 1_600;

/// Accumulates device samples into a shared recording buffer.
///
/// Owned by the stream callback; all resampling state lives here so the
/// callback needs no locking beyond the final buffer append.
pub(crate) struct SampleSink {
    target: Arc<Mutex<Vec<i16>>>,
    resampler: Option<SincFixedIn<f32>>,
    input_frames: usize,
    pending: Vec<i16>,
}

impl SampleSink {
    pub(crate) fn new(target: Arc<Mutex<Vec<i16>>>, device_rate: u32) -> Self {
        let (resampler, input_frames) = if device_rate == ARTIFACT_SAMPLE_RATE {
            (None, OUTPUT_CHUNK)
        } else {
            info!(
                "Creating resampler: {} Hz -> {} Hz",
                device_rate, ARTIFACT_SAMPLE_RATE
            );
            let params = SincInterpolationParameters {
                sinc_len: 256,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            };
            let input_frames = (OUTPUT_CHUNK as f64 * device_rate as f64
                / ARTIFACT_SAMPLE_RATE as f64)
                .ceil() as usize;
            match SincFixedIn::<f32>::new(
                ARTIFACT_SAMPLE_RATE as f64 / device_rate as f64,
                2.0,
                params,
                input_frames,
                1, // mono
            ) {
                Ok(resampler) => (Some(resampler), input_frames),
                Err(e) => {
                    error!("Failed to create resampler, storing at device rate: {}", e);
                    (None, OUTPUT_CHUNK)
                }
            }
        };

        Self {
            target,
            resampler,
            input_frames,
            pending: Vec::with_capacity(input_frames * 2),
        }
    }

    /// Fold interleaved samples to mono and append them to the recording.
    pub(crate) fn push(&mut self, data: &[i16], channels: usize) {
        let mono = fold_to_mono(data, channels);

        if self.resampler.is_none() {
            if let Ok(mut target) = self.target.lock() {
                target.extend(mono);
            }
            return;
        }

        self.pending.extend(mono);
        while self.pending.len() >= self.input_frames {
            let input: Vec<f32> = self
                .pending
                .drain(..self.input_frames)
                .map(|s| s as f32 / 32_768.0)
                .collect();

            let resampler = self.resampler.as_mut().expect("checked above");
            match resampler.process(&[input], None) {
                Ok(resampled) => {
                    let output: Vec<i16> = resampled[0]
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32_767.0) as i16)
                        .collect();
                    if let Ok(mut target) = self.target.lock() {
                        target.extend(output);
                    }
                }
                Err(e) => {
                    error!("Resampling error: {}", e);
                }
            }
        }
    }
}

/// Average interleaved channels down to a single mono stream.
pub(crate) fn fold_to_mono(data: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}
