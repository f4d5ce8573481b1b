use std::{ops::Deref, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{OnsetConfig, SampleBuffer};

/// Ordered, strictly increasing beat timestamps in seconds.
///
/// The sequence is frozen once built. Clones share the same storage, so the
/// scheduler and the judgment engine can both hold it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct BeatSequence(Arc<[f64]>);

impl Default for BeatSequence {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl BeatSequence {
    /// Builds a sequence from arbitrary timestamps, dropping non-finite or
    /// negative values and anything that does not strictly increase.
    pub fn new(times: impl IntoIterator<Item = f64>) -> Self {
        let mut accepted: Vec<f64> = Vec::new();
        for time in times {
            if !time.is_finite() || time < 0.0 {
                continue;
            }
            if accepted.last().is_some_and(|last| time <= *last) {
                continue;
            }
            accepted.push(time);
        }
        Self(accepted.into())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl Deref for BeatSequence {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

impl From<Vec<f64>> for BeatSequence {
    fn from(value: Vec<f64>) -> Self {
        Self::new(value)
    }
}

impl From<BeatSequence> for Vec<f64> {
    fn from(value: BeatSequence) -> Self {
        value.0.to_vec()
    }
}

/// Metadata gathered while extracting onsets from a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub sample_rate: u32,
    pub frame_count: usize,
    pub average_energy: f32,
    pub threshold: f32,
    pub duration_seconds: f64,
    pub beat_count: usize,
}

/// Beats of one track together with how they were obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatTrack {
    pub beats: BeatSequence,
    pub summary: AnalysisSummary,
}

/// Extracts percussive onsets using frame RMS energy against a global
/// threshold, strict local-maximum peak picking and a refractory gap.
///
/// Buffers that are empty, shorter than three frames or carry a zero sample
/// rate produce an empty sequence.
pub fn extract_onsets(buffer: &SampleBuffer, config: &OnsetConfig) -> BeatTrack {
    let mut summary = AnalysisSummary {
        sample_rate: buffer.sample_rate,
        duration_seconds: buffer.duration_seconds(),
        ..Default::default()
    };

    if buffer.sample_rate == 0 || config.frame_size == 0 || buffer.is_empty() {
        return BeatTrack {
            beats: BeatSequence::default(),
            summary,
        };
    }

    let frame_size = config.frame_size;
    let energies = frame_energies(&buffer.samples, frame_size);
    let average_energy = energies.iter().sum::<f32>() / energies.len() as f32;
    let threshold = average_energy * config.sensitivity;

    summary.frame_count = energies.len();
    summary.average_energy = average_energy;
    summary.threshold = threshold;

    let sample_rate = f64::from(buffer.sample_rate);
    let mut beats: Vec<f64> = Vec::new();

    for (offset, window) in energies.windows(3).enumerate() {
        let [previous, energy, next] = [window[0], window[1], window[2]];
        if energy <= threshold || energy <= previous || energy <= next {
            continue;
        }

        let index = offset + 1;
        let time = (index * frame_size) as f64 / sample_rate;
        let clear_of_previous = beats
            .last()
            .map(|last| time - last >= config.min_beat_gap)
            .unwrap_or(true);

        if clear_of_previous {
            beats.push(time);
        }
    }

    summary.beat_count = beats.len();
    tracing::info!(
        frames = summary.frame_count,
        beats = summary.beat_count,
        average_energy,
        threshold,
        "extracted onsets"
    );

    BeatTrack {
        beats: BeatSequence::new(beats),
        summary,
    }
}

/// RMS energy of consecutive non-overlapping frames. A trailing partial frame
/// is still normalised by the full frame size.
fn frame_energies(samples: &[f32], frame_size: usize) -> Vec<f32> {
    samples
        .chunks(frame_size)
        .map(|frame| compute_rms(frame, frame_size))
        .collect()
}

fn compute_rms(samples: &[f32], frame_size: usize) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / frame_size as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    const RATE: u32 = 10_240;

    fn config() -> OnsetConfig {
        OnsetConfig::default()
    }

    fn noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len)
            .map(|_| rng.gen_range(-amplitude..=amplitude))
            .collect()
    }

    /// Overwrites `frame` with a loud square burst.
    fn spike(samples: &mut [f32], frame: usize, frame_size: usize) {
        for (i, sample) in samples[frame * frame_size..(frame + 1) * frame_size]
            .iter_mut()
            .enumerate()
        {
            *sample = if i % 2 == 0 { 0.9 } else { -0.9 };
        }
    }

    #[test]
    fn empty_and_unusable_buffers_yield_no_beats() {
        let empty = extract_onsets(&SampleBuffer::new(Vec::new(), RATE), &config());
        assert!(empty.beats.is_empty());

        let no_rate = extract_onsets(&SampleBuffer::new(vec![0.5; 8_192], 0), &config());
        assert!(no_rate.beats.is_empty());

        let short = extract_onsets(&SampleBuffer::new(vec![0.5; 1_500], RATE), &config());
        assert!(short.beats.is_empty());
    }

    #[test]
    fn silent_buffer_yields_no_beats() {
        let track = extract_onsets(&SampleBuffer::new(vec![0.0; 1024 * 40], RATE), &config());

        assert_eq!(track.summary.average_energy, 0.0);
        assert_eq!(track.summary.threshold, 0.0);
        assert!(track.beats.is_empty());
    }

    #[test]
    fn faint_peak_on_silence_still_counts_as_a_beat() {
        let frame_size = config().frame_size;
        let mut samples = vec![0.0; frame_size * 40];
        samples[15 * frame_size..16 * frame_size].fill(0.001);

        let track = extract_onsets(&SampleBuffer::new(samples, RATE), &config());

        // The threshold scales with the mean, so quiet audio has no noise floor.
        assert!(track.summary.threshold < 0.001);
        assert_eq!(track.beats.as_slice(), &[1.5]);
    }

    #[test]
    fn isolated_spike_produces_one_beat() {
        let frame_size = config().frame_size;
        let mut samples = noise(frame_size * 40, 0.01, 7);
        spike(&mut samples, 20, frame_size);

        let track = extract_onsets(&SampleBuffer::new(samples, RATE), &config());

        assert_eq!(track.beats.len(), 1);
        let expected = (20 * frame_size) as f64 / f64::from(RATE);
        let resolution = frame_size as f64 / f64::from(RATE);
        assert!((track.beats[0] - expected).abs() <= resolution);
    }

    #[test]
    fn refractory_gap_suppresses_close_spikes() {
        let frame_size = config().frame_size;
        let mut samples = vec![0.0; frame_size * 60];
        // 0.1 s per frame at this rate: frames 10 and 12 are 0.2 s apart.
        spike(&mut samples, 10, frame_size);
        spike(&mut samples, 12, frame_size);
        spike(&mut samples, 30, frame_size);

        let track = extract_onsets(&SampleBuffer::new(samples, RATE), &config());

        assert_eq!(track.beats.as_slice(), &[1.0, 3.0]);
    }

    #[test]
    fn plateaus_are_not_local_maxima() {
        let frame_size = config().frame_size;
        let mut samples = vec![0.0; frame_size * 20];
        spike(&mut samples, 8, frame_size);
        spike(&mut samples, 9, frame_size);

        let track = extract_onsets(&SampleBuffer::new(samples, RATE), &config());
        assert!(track.beats.is_empty());
    }

    #[test]
    fn first_and_last_frames_are_never_beats() {
        let frame_size = config().frame_size;
        let mut samples = vec![0.0; frame_size * 10];
        spike(&mut samples, 0, frame_size);
        spike(&mut samples, 9, frame_size);

        let track = extract_onsets(&SampleBuffer::new(samples, RATE), &config());
        assert!(track.beats.is_empty());
    }

    #[test]
    fn beats_are_increasing_spaced_and_in_range_for_noisy_tracks() {
        let config = config();
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let len = rng.gen_range(0..RATE as usize * 6);
            let mut samples = noise(len, 0.2, seed + 100);
            for sample in samples.iter_mut() {
                if rng.gen_bool(0.001) {
                    *sample = 1.0;
                }
            }
            let buffer = SampleBuffer::new(samples, RATE);

            let track = extract_onsets(&buffer, &config);

            for pair in track.beats.windows(2) {
                assert!(pair[1] > pair[0], "seed {seed}: {pair:?} not increasing");
                assert!(
                    pair[1] - pair[0] >= config.min_beat_gap,
                    "seed {seed}: {pair:?} closer than refractory gap"
                );
            }
            for beat in track.beats.iter() {
                assert!(*beat >= 0.0 && *beat < buffer.duration_seconds());
            }
            assert_eq!(track.summary.beat_count, track.beats.len());
        }
    }

    #[test]
    fn sequence_constructor_enforces_strict_order() {
        let beats = BeatSequence::new([0.5, 0.5, 0.2, f64::NAN, -1.0, 1.0]);
        assert_eq!(beats.as_slice(), &[0.5, 1.0]);
    }

    #[test]
    fn sequence_serialises_as_plain_array() {
        let beats = BeatSequence::new([1.0, 2.5]);
        let json = serde_json::to_string(&beats).unwrap();
        assert_eq!(json, "[1.0,2.5]");

        let parsed: BeatSequence = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, beats);
    }
}
