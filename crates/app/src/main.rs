use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use cheer_rhythm_core::{
    extract_onsets, load_track, run_session, session_channels, AppConfig, BeatCue, BeatTrack,
    Calibration, ClockSource, CueSink, InputEvent, Judgment, PlaybackSession, ScoreSnapshot,
    SystemClock, VisualCue, WavDecoder,
};
use clap::{Parser, Subcommand};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::EnvFilter;

fn main() -> cheer_rhythm_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Analyze { input } => run_analyze(&input, &config),
        Commands::Precompute { input, output } => run_precompute(&input, &output, &config),
        Commands::Play { input, compensated } => run_play(&input, &config, compensated),
    }
}

fn run_analyze(input: &Path, config: &AppConfig) -> cheer_rhythm_core::Result<()> {
    tracing::info!(?input, "analysing track");
    let track = analyse(input, config)?;
    println!("{}", serde_json::to_string_pretty(&track)?);
    Ok(())
}

fn run_precompute(input: &Path, output: &Path, config: &AppConfig) -> cheer_rhythm_core::Result<()> {
    tracing::info!(?input, ?output, "running precompute pipeline");
    let track = analyse(input, config)?;
    fs::write(output, serde_json::to_vec_pretty(&track)?)?;
    tracing::info!(beats = track.beats.len(), ?output, "wrote beat cache");
    Ok(())
}

fn run_play(input: &Path, config: &AppConfig, compensated: bool) -> cheer_rhythm_core::Result<()> {
    let track = load_beat_track(input, config)?;
    let calibration = if compensated {
        Calibration::Compensated
    } else {
        Calibration::Strict
    };
    tracing::info!(?input, ?calibration, beats = track.beats.len(), "starting play mode");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let report = runtime.block_on(async {
        let clock = SystemClock::new();
        let mut session = PlaybackSession::from_track(&track, config, calibration);
        session.start(clock.now());

        let (control, channels) = session_channels(64);
        tokio::spawn(read_taps(control.inputs(), clock, session.audio_start_time()));

        let mut sink = TerminalSink;
        let report = run_session(&mut session, &clock, &mut sink, channels).await;
        drop(control);
        report
    });
    // Stdin is read on a blocking thread that may still be parked on a line.
    runtime.shutdown_timeout(Duration::from_millis(100));

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Each line typed on stdin is one tap.
async fn read_taps(inputs: mpsc::Sender<InputEvent>, clock: SystemClock, audio_start_time: f64) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(_)) => {
                let event = InputEvent::tap(clock.now() - audio_start_time);
                if inputs.send(event).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "stopped reading taps");
                break;
            }
        }
    }
}

fn analyse(input: &Path, config: &AppConfig) -> cheer_rhythm_core::Result<BeatTrack> {
    let buffer = load_track(input, &WavDecoder)?;
    Ok(extract_onsets(&buffer, &config.onset))
}

/// Loads a precomputed `.json` beat cache, or analyses an audio file.
fn load_beat_track(input: &Path, config: &AppConfig) -> cheer_rhythm_core::Result<BeatTrack> {
    let is_cache = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_cache {
        let raw = fs::read(input)?;
        Ok(serde_json::from_slice(&raw)?)
    } else {
        analyse(input, config)
    }
}

struct TerminalSink;

impl CueSink for TerminalSink {
    fn on_visual_cue_due(&mut self, cue: &VisualCue) {
        println!("cue      #{:<4} lands at {:>7.3}s", cue.beat_index, cue.beat_time);
    }

    fn on_beat_due(&mut self, cue: &BeatCue) {
        println!("beat     #{:<4} {:>7.3}s", cue.beat_index, cue.beat_time);
    }

    fn on_judgment(&mut self, judgment: &Judgment, score: &ScoreSnapshot) {
        println!(
            "{:<8} #{:<4} off {:>6.3}s  combo {:<3} score {}",
            judgment.tier.to_string(),
            judgment.beat_index,
            judgment.diff,
            score.combo,
            score.display_score
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Tap along to the beats of a track", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect beats in an audio file and print them as JSON.
    Analyze {
        /// Path to the WAV file that should be analysed.
        input: PathBuf,
    },
    /// Analyse an audio file ahead of time and persist the results.
    Precompute {
        /// Path to the WAV file that should be analysed.
        input: PathBuf,
        /// Output path for the generated beat cache.
        output: PathBuf,
    },
    /// Play a headless session; every line on stdin is a tap.
    Play {
        /// WAV file or a beat cache produced by `precompute`.
        input: PathBuf,
        /// Use the relaxed windows and latency offset for wireless audio.
        #[arg(long)]
        compensated: bool,
    },
}
