use serde::{Deserialize, Serialize};

use crate::{
    Acceleration, AppConfig, BeatSequence, BeatTrack, Calibration, CueSink, Judgment,
    JudgmentEngine, LookaheadScheduler, ScoreSnapshot, ScoreState, SwingDetector,
};

/// Raw input captured by the platform, stamped in the playback-time frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub timestamp: f64,
    pub kind: InputKind,
}

impl InputEvent {
    pub fn tap(timestamp: f64) -> Self {
        Self {
            timestamp,
            kind: InputKind::Tap,
        }
    }

    pub fn motion(timestamp: f64, sample: Acceleration) -> Self {
        Self {
            timestamp,
            kind: InputKind::Motion(sample),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputKind {
    Tap,
    Motion(Acceleration),
}

/// Whether the scheduling task should re-arm itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

/// Final state of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub calibration: Calibration,
    pub beat_count: usize,
    pub beats_scheduled: usize,
    pub score: ScoreSnapshot,
}

/// Run-time state of one game attempt.
///
/// The scheduler owns the beat cursor and the judgment engine only reads the
/// beat sequence, so both can run from the same task without locking.
#[derive(Debug)]
pub struct PlaybackSession {
    beats: BeatSequence,
    calibration: Calibration,
    judge: JudgmentEngine,
    scheduler: LookaheadScheduler,
    score: ScoreState,
    swing: SwingDetector,
    start_delay: f64,
    track_duration: Option<f64>,
    audio_start_time: f64,
    phase: Phase,
}

impl PlaybackSession {
    pub fn new(beats: BeatSequence, config: &AppConfig, calibration: Calibration) -> Self {
        Self {
            beats,
            calibration,
            judge: JudgmentEngine::from_config(&config.judgment, calibration),
            scheduler: LookaheadScheduler::new(config.scheduler.clone()),
            score: ScoreState::new(config.scoring.clone()),
            swing: SwingDetector::new(config.swing.clone()),
            start_delay: config.scheduler.start_delay,
            track_duration: None,
            audio_start_time: 0.0,
            phase: Phase::Idle,
        }
    }

    /// Builds a session that ends on its own once the track is over.
    pub fn from_track(track: &BeatTrack, config: &AppConfig, calibration: Calibration) -> Self {
        let mut session = Self::new(track.beats.clone(), config, calibration);
        session.track_duration = Some(track.summary.duration_seconds);
        session
    }

    /// Replaces the default swing detector, e.g. one built behind a
    /// permission check.
    pub fn with_swing_detector(mut self, detector: SwingDetector) -> Self {
        self.swing = detector;
        self
    }

    pub fn beats(&self) -> &BeatSequence {
        &self.beats
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn global_offset(&self) -> f64 {
        self.judge.windows().offset
    }

    pub fn audio_start_time(&self) -> f64 {
        self.audio_start_time
    }

    pub fn next_beat_index(&self) -> usize {
        self.scheduler.next_beat_index()
    }

    pub fn is_started(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn lookahead_poll_interval(&self) -> f64 {
        self.scheduler.config().lookahead_poll_interval
    }

    /// Playback time corresponding to clock time `now`.
    pub fn playback_time(&self, now: f64) -> f64 {
        now - self.audio_start_time
    }

    /// Starts the session; playback begins `start_delay` after `now`.
    /// Returns `false` if the session was already started or stopped.
    pub fn start(&mut self, now: f64) -> bool {
        if self.phase != Phase::Idle {
            tracing::warn!(phase = ?self.phase, "session cannot be started again");
            return false;
        }

        self.audio_start_time = now + self.start_delay;
        self.phase = Phase::Running;
        tracing::info!(
            audio_start_time = self.audio_start_time,
            beats = self.beats.len(),
            calibration = ?self.calibration,
            "session started"
        );
        true
    }

    /// Clears the started flag and discards armed cues. Returns the number of
    /// cues dropped.
    pub fn stop(&mut self) -> usize {
        if self.phase != Phase::Running {
            return 0;
        }

        self.phase = Phase::Stopped;
        let dropped = self.scheduler.cancel_pending();
        tracing::info!(
            dropped,
            score = self.score.display_score(),
            hits = self.score.hit_count(),
            "session stopped"
        );
        dropped
    }

    /// One activation of the scheduling task: arm upcoming beats, release due
    /// cues and report whether to poll again.
    pub fn tick(&mut self, now: f64, sink: &mut dyn CueSink) -> Activation {
        if self.phase != Phase::Running {
            return Activation::Stop;
        }

        self.scheduler
            .poll(&self.beats, self.audio_start_time, now, sink);
        self.scheduler.fire_due(now, sink);

        if self.is_finished(now) {
            self.stop();
            return Activation::Stop;
        }
        Activation::Continue
    }

    /// Releases armed cues that are due by `now`.
    pub fn fire_due(&mut self, now: f64, sink: &mut dyn CueSink) -> usize {
        if self.phase != Phase::Running {
            return 0;
        }
        self.scheduler.fire_due(now, sink)
    }

    /// Clock time of the next armed cue.
    pub fn next_deadline(&self) -> Option<f64> {
        if self.phase == Phase::Running {
            self.scheduler.next_deadline()
        } else {
            None
        }
    }

    /// True once playback has run past the end of the track plus the latest
    /// point at which an input can still be judged against the last beat.
    pub fn is_finished(&self, now: f64) -> bool {
        let windows = self.judge.windows();
        let late_limit = windows.offset.max(0.0) + windows.good;
        self.phase == Phase::Running
            && self
                .track_duration
                .is_some_and(|duration| self.playback_time(now) > duration + late_limit)
    }

    /// Routes one input event. Returns the judgment when the input was graded.
    pub fn handle_input(&mut self, event: InputEvent) -> Option<Judgment> {
        if self.phase != Phase::Running {
            return None;
        }

        match event.kind {
            InputKind::Tap => self.register_hit(event.timestamp, None),
            InputKind::Motion(sample) => {
                let hit = self.swing.process(event.timestamp, sample)?;
                self.register_hit(hit.timestamp, Some(hit.magnitude))
            }
        }
    }

    /// Judges a tap at `input_time` (playback-time frame).
    pub fn judge(&mut self, input_time: f64) -> Option<Judgment> {
        self.handle_input(InputEvent::tap(input_time))
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            calibration: self.calibration,
            beat_count: self.beats.len(),
            beats_scheduled: self.scheduler.next_beat_index(),
            score: self.score.snapshot(),
        }
    }

    fn register_hit(&mut self, input_time: f64, swing_magnitude: Option<f64>) -> Option<Judgment> {
        self.score.register_input();

        if self.beats.is_empty() {
            if let Some(magnitude) = swing_magnitude {
                self.score.apply_swing(magnitude);
            }
            return None;
        }
        if let Some(magnitude) = swing_magnitude {
            self.score.track_swing(magnitude);
        }

        let judgment = self.judge.judge(&self.beats, input_time)?;
        self.score.apply(judgment.tier);
        Some(judgment)
    }
}
