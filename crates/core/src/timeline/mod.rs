use std::{
    cell::Cell,
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    time::Instant,
};

use serde::{Deserialize, Serialize};

use crate::{Judgment, ScoreSnapshot, SchedulerConfig};

/// Monotonic time source, in seconds from an arbitrary origin.
///
/// Elapsed playback time is `now() - audio_start_time` of the session.
pub trait ClockSource {
    fn now(&self) -> f64;
}

/// Wall clock backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for deterministic playback and tests.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    time_seconds: Cell<f64>,
}

impl ManualClock {
    pub fn new(time_seconds: f64) -> Self {
        Self {
            time_seconds: Cell::new(time_seconds),
        }
    }

    pub fn set(&self, time_seconds: f64) {
        self.time_seconds.set(time_seconds);
    }

    pub fn advance(&self, delta: f64) {
        self.time_seconds.set(self.time_seconds.get() + delta);
    }

    pub fn reset(&self) {
        self.time_seconds.set(0.0);
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        self.time_seconds.get()
    }
}

/// Spawn a visual cue that will reach the target at `beat_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisualCue {
    pub beat_index: usize,
    pub beat_time: f64,
    /// Playback time at which the cue should appear.
    pub target_time: f64,
}

/// A beat has been reached in playback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatCue {
    pub beat_index: usize,
    pub beat_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cue {
    Visual(VisualCue),
    Beat(BeatCue),
}

/// Receives the side effects of a running session. Implementations must
/// return quickly; they run on the session's only task.
pub trait CueSink {
    fn on_visual_cue_due(&mut self, cue: &VisualCue);

    fn on_beat_due(&mut self, cue: &BeatCue);

    /// Feedback for a judged input.
    fn on_judgment(&mut self, _judgment: &Judgment, _score: &ScoreSnapshot) {}

    fn dispatch(&mut self, cue: &Cue) {
        match cue {
            Cue::Visual(visual) => self.on_visual_cue_due(visual),
            Cue::Beat(beat) => self.on_beat_due(beat),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ArmedTrigger {
    /// Clock time at which the cue fires.
    fire_at: f64,
    sequence: u64,
    cue: Cue,
}

impl PartialEq for ArmedTrigger {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ArmedTrigger {}

impl PartialOrd for ArmedTrigger {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArmedTrigger {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_at
            .total_cmp(&other.fire_at)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Two-stage lookahead scheduler.
///
/// Each poll decides which beats fall inside the lookahead horizon and arms
/// one-shot triggers for them; [`LookaheadScheduler::fire_due`] then releases
/// the triggers whose clock time has come. The beat cursor only moves
/// forward, so every beat is armed at most once.
#[derive(Debug)]
pub struct LookaheadScheduler {
    config: SchedulerConfig,
    next_beat_index: usize,
    armed: BinaryHeap<Reverse<ArmedTrigger>>,
    sequence: u64,
    watermark: f64,
}

impl LookaheadScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            next_beat_index: 0,
            armed: BinaryHeap::new(),
            sequence: 0,
            watermark: f64::NEG_INFINITY,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn next_beat_index(&self) -> usize {
        self.next_beat_index
    }

    pub fn pending(&self) -> usize {
        self.armed.len()
    }

    /// Clock time of the earliest armed trigger.
    pub fn next_deadline(&self) -> Option<f64> {
        self.armed.peek().map(|Reverse(trigger)| trigger.fire_at)
    }

    /// Arms every beat inside the horizon. Triggers that are already past due
    /// fire straight away. Returns the number of beats armed.
    pub fn poll(
        &mut self,
        beats: &[f64],
        audio_start_time: f64,
        now: f64,
        sink: &mut dyn CueSink,
    ) -> usize {
        let elapsed = now - audio_start_time;
        if elapsed < self.watermark {
            tracing::warn!(
                elapsed,
                watermark = self.watermark,
                "playback clock moved backwards"
            );
        } else {
            self.watermark = elapsed;
        }

        let horizon = elapsed + self.config.schedule_ahead_window + self.config.visual_lead_time;
        let mut armed = 0;

        while let Some(&beat_time) = beats.get(self.next_beat_index) {
            if beat_time >= horizon {
                break;
            }

            let beat_index = self.next_beat_index;
            let target_time = beat_time - self.config.visual_lead_time;
            self.arm(
                audio_start_time + target_time,
                Cue::Visual(VisualCue {
                    beat_index,
                    beat_time,
                    target_time,
                }),
                now,
                sink,
            );
            self.arm(
                audio_start_time + beat_time,
                Cue::Beat(BeatCue {
                    beat_index,
                    beat_time,
                }),
                now,
                sink,
            );

            self.next_beat_index += 1;
            armed += 1;
        }

        armed
    }

    /// Fires every armed trigger due at or before `now`, earliest first.
    pub fn fire_due(&mut self, now: f64, sink: &mut dyn CueSink) -> usize {
        let mut fired = 0;
        while let Some(Reverse(trigger)) = self.armed.peek() {
            if trigger.fire_at > now {
                break;
            }
            let cue = trigger.cue;
            self.armed.pop();
            sink.dispatch(&cue);
            fired += 1;
        }
        fired
    }

    /// Drops every armed trigger. Returns how many were discarded.
    pub fn cancel_pending(&mut self) -> usize {
        let dropped = self.armed.len();
        self.armed.clear();
        dropped
    }

    fn arm(&mut self, fire_at: f64, cue: Cue, now: f64, sink: &mut dyn CueSink) {
        let delay = fire_at - now;
        tracing::debug!(?cue, delay, "arming cue");

        if delay <= 0.0 {
            sink.dispatch(&cue);
            return;
        }

        self.sequence += 1;
        self.armed.push(Reverse(ArmedTrigger {
            fire_at,
            sequence: self.sequence,
            cue,
        }));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Collects every callback in arrival order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub cues: Vec<Cue>,
        pub judgments: Vec<(Judgment, ScoreSnapshot)>,
    }

    impl RecordingSink {
        pub fn visual_beats(&self) -> Vec<usize> {
            self.cues
                .iter()
                .filter_map(|cue| match cue {
                    Cue::Visual(visual) => Some(visual.beat_index),
                    Cue::Beat(_) => None,
                })
                .collect()
        }

        pub fn due_beats(&self) -> Vec<usize> {
            self.cues
                .iter()
                .filter_map(|cue| match cue {
                    Cue::Beat(beat) => Some(beat.beat_index),
                    Cue::Visual(_) => None,
                })
                .collect()
        }
    }

    impl CueSink for RecordingSink {
        fn on_visual_cue_due(&mut self, cue: &VisualCue) {
            self.cues.push(Cue::Visual(*cue));
        }

        fn on_beat_due(&mut self, cue: &BeatCue) {
            self.cues.push(Cue::Beat(*cue));
        }

        fn on_judgment(&mut self, judgment: &Judgment, score: &ScoreSnapshot) {
            self.judgments.push((*judgment, score.clone()));
        }
    }
}
