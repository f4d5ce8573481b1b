use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Calibration, Result, RhythmError};

/// Top-level configuration structure for the engine.
///
/// Every section falls back to its defaults, so a JSON file only needs to
/// spell out the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub onset: OnsetConfig,
    pub scheduler: SchedulerConfig,
    pub judgment: JudgmentConfig,
    pub scoring: ScoringConfig,
    pub swing: SwingConfig,
}

impl AppConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        tracing::info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.onset.validate()?;
        self.scheduler.validate()?;
        self.judgment.validate()?;
        self.scoring.validate()?;
        self.swing.validate()
    }
}

/// Onset extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// Samples per analysis frame.
    pub frame_size: usize,
    /// Multiplier applied to the mean frame energy to obtain the threshold.
    pub sensitivity: f32,
    /// Refractory window in seconds between accepted beats.
    pub min_beat_gap: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            sensitivity: 1.5,
            min_beat_gap: 0.35,
        }
    }
}

impl OnsetConfig {
    fn validate(&self) -> Result<()> {
        if self.frame_size == 0 {
            return Err(invalid("onset.frame_size must be at least one sample"));
        }
        require_non_negative("onset.sensitivity", f64::from(self.sensitivity))?;
        require_non_negative("onset.min_beat_gap", self.min_beat_gap)
    }
}

/// Lookahead scheduler timing, all in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub lookahead_poll_interval: f64,
    pub schedule_ahead_window: f64,
    pub visual_lead_time: f64,
    /// Gap between starting a session and the playback epoch.
    pub start_delay: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_poll_interval: 0.1,
            schedule_ahead_window: 0.2,
            visual_lead_time: 1.5,
            start_delay: 0.1,
        }
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<()> {
        require_positive(
            "scheduler.lookahead_poll_interval",
            self.lookahead_poll_interval,
        )?;
        require_non_negative("scheduler.schedule_ahead_window", self.schedule_ahead_window)?;
        require_non_negative("scheduler.visual_lead_time", self.visual_lead_time)?;
        require_non_negative("scheduler.start_delay", self.start_delay)
    }
}

/// Timing windows and latency offset for one calibration mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowPreset {
    pub perfect: f64,
    pub good: f64,
    /// Signed latency compensation subtracted from the raw difference.
    pub offset: f64,
}

impl WindowPreset {
    fn validate(&self, name: &str) -> Result<()> {
        require_positive(&format!("judgment.{name}.perfect"), self.perfect)?;
        require_positive(&format!("judgment.{name}.good"), self.good)?;
        if !self.offset.is_finite() {
            return Err(invalid(format!("judgment.{name}.offset must be finite")));
        }
        if self.perfect >= self.good {
            return Err(invalid(format!(
                "judgment.{name}: perfect window ({}) must be narrower than good window ({})",
                self.perfect, self.good
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgmentConfig {
    pub strict: WindowPreset,
    /// Relaxed windows plus a fixed offset for high-latency output paths such
    /// as wireless headphones.
    pub compensated: WindowPreset,
}

impl Default for JudgmentConfig {
    fn default() -> Self {
        Self {
            strict: WindowPreset {
                perfect: 0.08,
                good: 0.15,
                offset: 0.0,
            },
            compensated: WindowPreset {
                perfect: 0.15,
                good: 0.30,
                offset: 0.20,
            },
        }
    }
}

impl JudgmentConfig {
    /// Returns the preset selected by the calibration mode.
    pub fn preset(&self, calibration: Calibration) -> WindowPreset {
        match calibration {
            Calibration::Strict => self.strict,
            Calibration::Compensated => self.compensated,
        }
    }

    fn validate(&self) -> Result<()> {
        self.strict.validate("strict")?;
        self.compensated.validate("compensated")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub base_hit_value: f64,
    pub combo_multiplier_step: f64,
    pub flat_good_value: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_hit_value: 1000.0,
            combo_multiplier_step: 0.1,
            flat_good_value: 500.0,
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<()> {
        require_non_negative("scoring.base_hit_value", self.base_hit_value)?;
        require_non_negative("scoring.combo_multiplier_step", self.combo_multiplier_step)?;
        require_non_negative("scoring.flat_good_value", self.flat_good_value)
    }
}

/// Motion-sensor swing detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwingConfig {
    /// Acceleration magnitude that counts as a swing.
    pub magnitude_threshold: f64,
    /// Seconds during which further crossings are ignored after a hit.
    pub cooldown: f64,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            magnitude_threshold: 25.0,
            cooldown: 0.8,
        }
    }
}

impl SwingConfig {
    fn validate(&self) -> Result<()> {
        require_positive("swing.magnitude_threshold", self.magnitude_threshold)?;
        require_non_negative("swing.cooldown", self.cooldown)
    }
}

fn invalid(reason: impl Into<String>) -> RhythmError {
    RhythmError::InvalidConfig(reason.into())
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be a positive number, got {value}")))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            AppConfig::from_json_str(r#"{ "scheduler": { "visual_lead_time": 2.0 } }"#).unwrap();

        assert_eq!(config.scheduler.visual_lead_time, 2.0);
        assert_eq!(config.scheduler.lookahead_poll_interval, 0.1);
        assert_eq!(config.onset, OnsetConfig::default());
    }

    #[test]
    fn rejects_inverted_windows() {
        let err = AppConfig::from_json_str(
            r#"{ "judgment": { "strict": { "perfect": 0.2, "good": 0.1, "offset": 0.0 } } }"#,
        )
        .unwrap_err();

        assert!(matches!(err, RhythmError::InvalidConfig(_)));
        assert!(err.to_string().contains("judgment.strict"));
    }

    #[test]
    fn rejects_zero_frame_size() {
        let err = AppConfig::from_json_str(r#"{ "onset": { "frame_size": 0 } }"#).unwrap_err();
        assert!(err.to_string().contains("frame_size"));
    }

    #[test]
    fn selects_preset_by_calibration() {
        let judgment = JudgmentConfig::default();
        assert_eq!(judgment.preset(Calibration::Strict).offset, 0.0);
        assert_eq!(judgment.preset(Calibration::Compensated).offset, 0.20);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "swing": {{ "cooldown": 1.0 }} }}"#).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.swing.cooldown, 1.0);
        assert_eq!(config.swing.magnitude_threshold, 25.0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RhythmError::Io(_)));
    }
}
