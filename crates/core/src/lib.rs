//! Core library for the Cheer Rhythm game.
//!
//! The crate holds the rhythm timing engine: offline onset extraction from a
//! decoded track, a lookahead scheduler that spawns visual cues ahead of each
//! beat against an authoritative playback clock, and the judgment and scoring
//! state machines that grade player input. Platform concerns such as audio
//! output, rendering and sensor access stay outside and are reached through
//! the [`AudioDecoder`], [`ClockSource`], [`CueSink`] and [`MotionPermission`]
//! traits.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod judgment;
pub mod runtime;
pub mod score;
pub mod session;
pub mod swing;
pub mod timeline;

pub use analysis::{extract_onsets, AnalysisSummary, BeatSequence, BeatTrack};
pub use audio::{load_track, AudioDecoder, SampleBuffer, WavDecoder};
pub use config::{
    AppConfig, JudgmentConfig, OnsetConfig, SchedulerConfig, ScoringConfig, SwingConfig,
    WindowPreset,
};
pub use error::{Result, RhythmError};
pub use judgment::{closest_beat, Calibration, Judgment, JudgmentEngine, Tier, TimingWindows};
pub use runtime::{run_session, session_channels, SessionChannels, SessionControl, TokioClock};
pub use score::{ScoreSnapshot, ScoreState};
pub use session::{Activation, InputEvent, InputKind, PlaybackSession, SessionReport};
pub use swing::{Acceleration, MotionPermission, SwingDetector, SwingHit};
pub use timeline::{
    BeatCue, ClockSource, Cue, CueSink, LookaheadScheduler, ManualClock, SystemClock, VisualCue,
};
