use std::{fs, io::Cursor, path::Path};

use hound::{SampleFormat, WavReader};

use crate::{Result, RhythmError};

/// One decoded channel of a track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    /// Amplitudes in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz. A zero rate marks a buffer that cannot be analysed.
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the buffer in seconds, or zero when the rate is unusable.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / f64::from(self.sample_rate)
        }
    }
}

/// Platform audio-decoding service.
pub trait AudioDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer>;
}

/// Decodes RIFF/WAVE data, keeping only the first channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer> {
        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let samples = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .step_by(channels)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = int_scale(spec.bits_per_sample)?;
                reader
                    .samples::<i32>()
                    .step_by(channels)
                    .map(|sample| sample.map(|value| (value as f32 / scale).clamp(-1.0, 1.0)))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        Ok(SampleBuffer::new(samples, spec.sample_rate))
    }
}

fn int_scale(bits_per_sample: u16) -> Result<f32> {
    match bits_per_sample {
        1..=32 => Ok((1u64 << (bits_per_sample - 1)) as f32),
        other => Err(RhythmError::decode(format!(
            "unsupported bit depth {other}"
        ))),
    }
}

/// Reads a track from disk and decodes it.
///
/// Read failures are reported as [`RhythmError::Decode`] as well: callers only
/// distinguish "track loaded" from "load failed".
pub fn load_track(path: impl AsRef<Path>, decoder: &dyn AudioDecoder) -> Result<SampleBuffer> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .map_err(|err| RhythmError::decode(format!("{}: {err}", path.display())))?;

    match decoder.decode(&bytes) {
        Ok(buffer) => {
            tracing::info!(
                path = %path.display(),
                samples = buffer.len(),
                sample_rate = buffer.sample_rate,
                "decoded track"
            );
            Ok(buffer)
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "track failed to decode");
            Err(err)
        }
    }
}
