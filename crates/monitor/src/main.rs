//! Drowsiness Monitor - Main Entry Point
//!
//! ```text
//! drowsiness-monitor run <user> <password>
//! drowsiness-monitor create-account <user> <password> <confirm>
//! drowsiness-monitor record-sleep <user> <password> --sleep "11 PM" --wake "07 AM"
//! drowsiness-monitor history <user> <password>
//! ```
//!
//! Settings are read from `--config` / `$DROWSY_CONFIG` (default `drowsy.toml`) and `DROWSY__*` variables.

use alerting::{LogSink, SoundAsset};
use anyhow::{Context, Result};
use camera_capture::{CameraError, Capture, ImageSequenceSource};
use clap::Parser;
use dms::RatioFunctions;
use monitor::{
    init_logging, AnnotationReplay, Cli, Collaborators, Command, FrameLoop, JsonLinesSink, MonitorError,
    MonitorSettings, OverlayWriter, SessionSupervisor, TelemetrySink,
};
use storage::{AccountBook, JsonFileStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = MonitorSettings::load(Some(cli.config.as_path()))
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    init_logging(&settings.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run { username, password } => run_session(settings, &username, &password).await,
        Command::CreateAccount {
            username,
            password,
            confirm,
        } => {
            account_book(&settings).create_account(&username, &password, &confirm)?;
            println!("Account created successfully!");
            Ok(())
        }
        Command::RecordSleep {
            username,
            password,
            sleep,
            wake,
        } => {
            let book = account_book(&settings);
            book.login(&username, &password)?;
            let record = book.record_sleep(&username, sleep, wake)?;
            println!("You slept from {} to {} ({:.2} hours).", sleep, wake, record.hours);
            Ok(())
        }
        Command::History { username, password } => {
            let book = account_book(&settings);
            book.login(&username, &password)?;
            for entry in book.sleep_history(&username)? {
                println!("- Hours: {}, Recorded at: {}", entry.hours, entry.recorded_at);
            }
            Ok(())
        }
    }
}

fn account_book(settings: &MonitorSettings) -> AccountBook<JsonFileStore> {
    AccountBook::new(
        JsonFileStore::new(&settings.storage.users),
        JsonFileStore::new(&settings.storage.sleep_data),
    )
}

fn telemetry_sinks(settings: &MonitorSettings) -> Result<Vec<Box<dyn TelemetrySink>>, MonitorError> {
    let mut sinks: Vec<Box<dyn TelemetrySink>> = Vec::new();
    match &settings.output.telemetry {
        Some(path) => sinks.push(Box::new(JsonLinesSink::create(path)?)),
        None => sinks.push(Box::new(JsonLinesSink::new(std::io::stdout()))),
    }
    if let Some(dir) = &settings.output.overlay_dir {
        sinks.push(Box::new(OverlayWriter::new(dir)?));
    }
    Ok(sinks)
}

async fn run_session(settings: MonitorSettings, username: &str, password: &str) -> Result<()> {
    let accounts = account_book(&settings);
    let sound = SoundAsset::load(&settings.output.alert_sound).context("loading alert sound")?;
    let replay = AnnotationReplay::load(&settings.replay.annotations).context("loading face annotations")?;

    let mut supervisor = SessionSupervisor::new();
    let signal = supervisor.login(&accounts, username, password, move |signal| {
        let capture = Capture::open(ImageSequenceSource::open(&settings.capture.device)?)?;
        let parts = Collaborators {
            detector: Box::new(replay.detector()),
            predictor: Box::new(replay.predictor()),
            ratios: RatioFunctions::default(),
            audio: Box::new(LogSink::default()),
            telemetry: Box::new(telemetry_sinks(&settings)?),
        };
        let mut frame_loop = FrameLoop::new(capture, parts, sound, &settings)?;
        frame_loop.run(&signal)
    })?;

    let logout = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, logging out");
            logout.logout();
        }
    });

    let outcome = tokio::task::spawn_blocking(move || supervisor.wait()).await?;
    match outcome {
        Some(Ok(summary)) => {
            info!("Session summary: {:?}", summary);
            Ok(())
        }
        Some(Err(MonitorError::VideoSource(CameraError::NoFrame))) => {
            warn!("Unable to capture frame from the video stream; session ended");
            Ok(())
        }
        Some(Err(e)) => Err(e).context("drowsiness session failed"),
        None => Ok(()),
    }
}
