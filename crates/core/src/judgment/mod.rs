use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{JudgmentConfig, WindowPreset};

/// Latency calibration selected by the player before a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calibration {
    /// Tight windows, no offset.
    #[default]
    Strict,
    /// Wider windows with a positive offset for slow output paths.
    Compensated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Perfect,
    Good,
    Miss,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Perfect => "PERFECT",
            Self::Good => "GOOD",
            Self::Miss => "MISS",
        };
        f.write_str(label)
    }
}

/// Ordered pair of windows plus the offset subtracted before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingWindows {
    pub perfect: f64,
    pub good: f64,
    pub offset: f64,
}

impl TimingWindows {
    pub fn classify(&self, diff: f64) -> Tier {
        if diff < self.perfect {
            Tier::Perfect
        } else if diff < self.good {
            Tier::Good
        } else {
            Tier::Miss
        }
    }
}

impl From<WindowPreset> for TimingWindows {
    fn from(preset: WindowPreset) -> Self {
        Self {
            perfect: preset.perfect,
            good: preset.good,
            offset: preset.offset,
        }
    }
}

/// Outcome of one input, handed back to the caller for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub tier: Tier,
    /// Absolute offset-corrected distance to the matched beat, in seconds.
    pub diff: f64,
    pub beat_index: usize,
    pub beat_time: f64,
    pub input_time: f64,
}

/// Index of the beat nearest to `time`.
///
/// On an exact tie the earlier beat wins.
pub fn closest_beat(beats: &[f64], time: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, beat) in beats.iter().enumerate() {
        let distance = (beat - time).abs();
        match best {
            Some((_, closest)) if distance >= closest => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// Grades raw input timestamps against the beat sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgmentEngine {
    windows: TimingWindows,
}

impl JudgmentEngine {
    pub fn new(windows: TimingWindows) -> Self {
        Self { windows }
    }

    pub fn from_config(config: &JudgmentConfig, calibration: Calibration) -> Self {
        Self::new(config.preset(calibration).into())
    }

    pub fn windows(&self) -> TimingWindows {
        self.windows
    }

    /// Judges `input_time` (playback-time frame) against the closest beat.
    /// Returns `None` when there is nothing to judge against.
    pub fn judge(&self, beats: &[f64], input_time: f64) -> Option<Judgment> {
        let beat_index = closest_beat(beats, input_time)?;
        let beat_time = beats[beat_index];
        let diff = (input_time - beat_time - self.windows.offset).abs();
        let tier = self.windows.classify(diff);

        tracing::debug!(%tier, diff, beat_index, input_time, "judged input");

        Some(Judgment {
            tier,
            diff,
            beat_index,
            beat_time,
            input_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> JudgmentEngine {
        JudgmentEngine::from_config(&JudgmentConfig::default(), Calibration::Strict)
    }

    #[test]
    fn close_input_is_perfect() {
        let judgment = strict().judge(&[1.0, 2.0, 3.0], 1.05).unwrap();

        assert_eq!(judgment.tier, Tier::Perfect);
        assert_eq!(judgment.beat_index, 0);
        assert!((judgment.diff - 0.05).abs() < 1e-9);
    }

    #[test]
    fn late_input_is_a_miss() {
        let judgment = strict().judge(&[1.0, 2.0, 3.0], 2.20).unwrap();

        assert_eq!(judgment.tier, Tier::Miss);
        assert_eq!(judgment.beat_index, 1);
    }

    #[test]
    fn window_boundaries_are_exclusive_below() {
        let windows = TimingWindows {
            perfect: 0.08,
            good: 0.15,
            offset: 0.0,
        };

        assert_eq!(windows.classify(0.0), Tier::Perfect);
        assert_eq!(windows.classify(0.08), Tier::Good);
        assert_eq!(windows.classify(0.149), Tier::Good);
        assert_eq!(windows.classify(0.15), Tier::Miss);
    }

    #[test]
    fn compensated_mode_subtracts_offset() {
        let engine = JudgmentEngine::from_config(&JudgmentConfig::default(), Calibration::Compensated);
        let judgment = engine.judge(&[5.0], 5.18).unwrap();

        assert_eq!(judgment.tier, Tier::Perfect);
        assert!((judgment.diff - 0.02).abs() < 1e-9);
    }

    #[test]
    fn early_input_in_compensated_mode_can_miss() {
        let engine = JudgmentEngine::from_config(&JudgmentConfig::default(), Calibration::Compensated);
        // 0.2 s early plus the 0.2 s offset lands 0.4 s away.
        let judgment = engine.judge(&[5.0], 4.8).unwrap();
        assert_eq!(judgment.tier, Tier::Miss);
    }

    #[test]
    fn ties_resolve_to_the_earlier_beat() {
        assert_eq!(closest_beat(&[1.0, 2.0], 1.5), Some(0));
        assert_eq!(closest_beat(&[1.0, 2.0], 1.5000001), Some(1));
    }

    #[test]
    fn lookup_scans_the_whole_sequence() {
        assert_eq!(closest_beat(&[0.5, 1.0, 4.0, 9.0], 8.0), Some(3));
        assert_eq!(closest_beat(&[0.5, 1.0, 4.0, 9.0], -3.0), Some(0));
    }

    #[test]
    fn empty_sequence_is_not_judged() {
        assert!(strict().judge(&[], 1.0).is_none());
    }

    #[test]
    fn repeated_judgments_match_the_same_beat() {
        let engine = strict();
        let beats = [1.0, 2.0, 3.0];
        let first = engine.judge(&beats, 2.4).unwrap();
        let second = engine.judge(&beats, 2.4).unwrap();
        assert_eq!(first, second);
    }
}
