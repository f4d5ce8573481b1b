use serde::{Deserialize, Serialize};

use crate::{ScoringConfig, Tier};

/// Score and combo bookkeeping for one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreState {
    config: ScoringConfig,
    score: f64,
    combo: u32,
    max_combo: u32,
    hit_count: u32,
    perfect_count: u32,
    good_count: u32,
    miss_count: u32,
    peak_magnitude: f64,
}

impl ScoreState {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Counts an input attempt, whatever it is later judged as.
    pub fn register_input(&mut self) {
        self.hit_count += 1;
    }

    pub fn apply(&mut self, tier: Tier) {
        match tier {
            Tier::Perfect => {
                self.perfect_count += 1;
                self.combo += 1;
                // Uses the combo including this hit.
                self.score += self.config.base_hit_value
                    * (1.0 + f64::from(self.combo) * self.config.combo_multiplier_step);
            }
            Tier::Good => {
                self.good_count += 1;
                self.combo += 1;
                self.score += self.config.flat_good_value;
            }
            Tier::Miss => {
                self.miss_count += 1;
                self.combo = 0;
            }
        }

        self.max_combo = self.max_combo.max(self.combo);
    }

    /// Scores a swing with no beat to match it against.
    pub fn apply_swing(&mut self, magnitude: f64) {
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.score += self.config.flat_good_value;
        self.track_swing(magnitude);
    }

    /// Records the strength of a swing without scoring it.
    pub fn track_swing(&mut self, magnitude: f64) {
        self.peak_magnitude = self.peak_magnitude.max(magnitude);
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Score as shown to the player.
    pub fn display_score(&self) -> u64 {
        self.score.floor() as u64
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn hit_count(&self) -> u32 {
        self.hit_count
    }

    pub fn judged_count(&self) -> u32 {
        self.perfect_count + self.good_count + self.miss_count
    }

    /// Share of judged inputs that were not misses, in [0, 1].
    pub fn accuracy(&self) -> f64 {
        let judged = self.judged_count();
        if judged == 0 {
            return 1.0;
        }
        f64::from(self.perfect_count + self.good_count) / f64::from(judged)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot {
            display_score: self.display_score(),
            combo: self.combo,
            max_combo: self.max_combo,
            hit_count: self.hit_count,
            perfect: self.perfect_count,
            good: self.good_count,
            miss: self.miss_count,
            accuracy: self.accuracy(),
            peak_magnitude: self.peak_magnitude,
        }
    }
}

/// Presentation view of [`ScoreState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub display_score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub hit_count: u32,
    pub perfect: u32,
    pub good: u32,
    pub miss: u32,
    pub accuracy: f64,
    pub peak_magnitude: f64,
}
