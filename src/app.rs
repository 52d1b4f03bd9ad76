// Process entry: CLI parsing, logging setup and the polling loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::core::alerts::audio::LoggingSoundPlayer;
use crate::core::alerts::engine::AlertEvaluator;
use crate::core::alerts::player::SoundPlayer;
use crate::core::audit::{AuditSink, JsonlAuditLog, NullAuditSink};
use crate::core::config::{ConfigManager, Settings};
use crate::core::coordinator::Coordinator;
use crate::core::source::TailingReadingSource;

#[derive(Debug, Parser)]
#[command(name = "bear-alarm", version, about = "Glucose alarm with snooze, schedules and escalation")]
pub struct Cli {
    /// Directory holding settings.json
    #[arg(long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Override the readings file from settings
    #[arg(long)]
    pub readings: Option<PathBuf>,

    /// Evaluate a single poll and exit
    #[arg(long)]
    pub once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json: bool,
}

fn init_logging(json: bool) {
    if let Err(error) = tracing_log::LogTracer::init() {
        eprintln!(
            "logging bridge initialization failed (continuing with existing logger): {}",
            error
        );
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let result = if json {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    if let Err(error) = result {
        eprintln!("global logger initialization failed: {}", error);
    }
}

#[cfg(feature = "audio")]
fn sound_player() -> Arc<dyn SoundPlayer> {
    match crate::core::alerts::audio::RodioSoundPlayer::new() {
        Ok(player) => Arc::new(player),
        Err(e) => {
            log::error!("Audio output unavailable ({}), alarms will only be logged", e);
            Arc::new(LoggingSoundPlayer)
        }
    }
}

#[cfg(not(feature = "audio"))]
fn sound_player() -> Arc<dyn SoundPlayer> {
    log::warn!("Built without the `audio` feature, alarms will only be logged");
    Arc::new(LoggingSoundPlayer)
}

fn audit_sink(settings: &Settings) -> Box<dyn AuditSink> {
    match &settings.audit_path {
        Some(path) => {
            log::info!("Writing audit events to {}", path.display());
            Box::new(JsonlAuditLog::new(path.clone()))
        }
        None => Box::new(NullAuditSink),
    }
}

/// Build the coordinator from validated settings.
pub fn build_coordinator(settings: &Settings) -> Coordinator {
    let evaluator = AlertEvaluator::new(
        settings.alerts.clone(),
        sound_player(),
        settings.alerts.notifier.build(),
        audit_sink(settings),
    );
    let source = TailingReadingSource::new(settings.readings_path.clone());
    Coordinator::new(Box::new(source), evaluator).with_max_reading_age(settings.max_reading_age_minutes)
}

async fn run_loop(mut coordinator: Coordinator, settings: &Settings, once: bool) {
    if settings.startup_delay_minutes > 0 && !once {
        log::info!("Waiting {} minutes before the first poll", settings.startup_delay_minutes);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(settings.startup_delay_minutes * 60)) => {}
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted during startup delay");
                coordinator.shutdown();
                return;
            }
        }
    }

    let mut interval = tokio::time::interval(Duration::from_secs(settings.poll_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Local::now().naive_local();
                if let Some(outcome) = coordinator.tick(now) {
                    log::debug!("Evaluation outcome: {:?}", outcome);
                }
                if once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
        }
    }

    coordinator.shutdown();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.json);

    let config_manager = ConfigManager::new(cli.config_dir.clone());
    let mut settings = match config_manager.load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(readings) = cli.readings {
        settings.readings_path = readings;
    }

    log::info!(
        "Monitoring {} every {}s (low {:.1}, high {:.1}, urgent {:.1})",
        settings.readings_path.display(),
        settings.poll_interval_secs,
        settings.alerts.thresholds.low_threshold(),
        settings.alerts.thresholds.high_threshold(),
        settings.alerts.urgent_low
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let coordinator = build_coordinator(&settings);
    runtime.block_on(run_loop(coordinator, &settings, cli.once));
    ExitCode::SUCCESS
}
