//! Cooperative driver for a [`PlaybackSession`].
//!
//! One task owns the session and multiplexes the poll ticker, the earliest
//! armed cue, incoming input events and the stop signal. Nothing is shared
//! across threads, so the session needs no locking.

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant, MissedTickBehavior},
};

use crate::{Activation, ClockSource, CueSink, InputEvent, PlaybackSession, SessionReport};

/// Shortest poll period the ticker accepts, in seconds.
const MIN_POLL_INTERVAL: f64 = 0.001;

/// Clock that follows the tokio timer, including paused test time.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Caller side of a running session. Dropping it stops the session.
#[derive(Debug)]
pub struct SessionControl {
    inputs: mpsc::Sender<InputEvent>,
    stop: watch::Sender<bool>,
}

impl SessionControl {
    pub fn inputs(&self) -> mpsc::Sender<InputEvent> {
        self.inputs.clone()
    }

    /// Sends one input event; returns `false` once the session has ended.
    pub async fn send(&self, event: InputEvent) -> bool {
        self.inputs.send(event).await.is_ok()
    }

    pub fn stop(&self) {
        // No receiver means the session already ended.
        let _ = self.stop.send(true);
    }
}

/// Session side of the channels, consumed by [`run_session`].
#[derive(Debug)]
pub struct SessionChannels {
    inputs: mpsc::Receiver<InputEvent>,
    stop: watch::Receiver<bool>,
}

pub fn session_channels(capacity: usize) -> (SessionControl, SessionChannels) {
    let (input_tx, input_rx) = mpsc::channel(capacity.max(1));
    let (stop_tx, stop_rx) = watch::channel(false);
    (
        SessionControl {
            inputs: input_tx,
            stop: stop_tx,
        },
        SessionChannels {
            inputs: input_rx,
            stop: stop_rx,
        },
    )
}

/// Runs `session` until it is stopped, its track ends, or its
/// [`SessionControl`] is dropped. Starts the session first if needed.
pub async fn run_session<C, S>(
    session: &mut PlaybackSession,
    clock: &C,
    sink: &mut S,
    channels: SessionChannels,
) -> SessionReport
where
    C: ClockSource,
    S: CueSink,
{
    let SessionChannels {
        mut inputs,
        mut stop,
    } = channels;

    if !session.is_started() && !session.start(clock.now()) {
        return session.report();
    }

    // `f64::max` also maps a NaN interval to the floor.
    let poll_interval = session.lookahead_poll_interval().max(MIN_POLL_INTERVAL);
    if poll_interval != session.lookahead_poll_interval() {
        tracing::warn!(poll_interval, "lookahead poll interval raised to the minimum");
    }
    let mut ticker = time::interval(Duration::from_secs_f64(poll_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut inputs_open = true;

    loop {
        let deadline = session
            .next_deadline()
            .map(|at| Duration::from_secs_f64((at - clock.now()).max(0.0)));
        let trigger = time::sleep(deadline.unwrap_or(Duration::ZERO));

        tokio::select! {
            _ = ticker.tick() => {
                if session.tick(clock.now(), sink) == Activation::Stop {
                    break;
                }
            }
            _ = trigger, if deadline.is_some() => {
                session.fire_due(clock.now(), sink);
            }
            event = inputs.recv(), if inputs_open => match event {
                Some(event) => {
                    if let Some(judgment) = session.handle_input(event) {
                        sink.on_judgment(&judgment, &session.score().snapshot());
                    }
                }
                None => inputs_open = false,
            },
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    session.stop();
                    break;
                }
            }
        }
    }

    session.report()
}
