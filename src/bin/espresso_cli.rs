use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::TryRecvError;

use espresso_sense::config::AppConfig;
use espresso_sense::debug::{init_logging, DebugLogger};
use espresso_sense::engine::{EngineHandle, ScriptedSensorFeed, SystemTimeSource};
use espresso_sense::fixtures::{
    ExpectationDiff, FixtureCatalog, ReplayReport, ScriptAction, ScriptRunner, TimedAction,
};
use espresso_sense::settings::{
    JsonFileStore, KeyValueStore, MemoryStore, Settings, SettingsLoader,
};

#[derive(Parser, Debug)]
#[command(
    name = "espresso_cli",
    about = "Deterministic vibration fixture harness for the espresso shot timer"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// Detector configuration JSON (defaults to the bundled asset)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit per-sample debug lines
    #[arg(long)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a fixture and compare detected shots against expectations
    Simulate {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Include the full event log in the report
        #[arg(long)]
        events: bool,
    },
    /// Stream session events for a fixture to stdout as JSON lines
    Stream {
        #[arg(long)]
        fixture: String,
        /// Play the script in real time through the engine instead of replaying it
        #[arg(long)]
        realtime: bool,
    },
    /// List available fixtures on disk
    DumpFixtures,
    /// Load (and migrate) a settings file and print the parsed values
    Settings {
        #[arg(long)]
        file: PathBuf,
        /// Raw `key=value` pairs written before loading
        #[arg(long = "set")]
        set: Vec<String>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging();

    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();
    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    let logger = DebugLogger::new(cli.debug);

    match cli.command {
        Commands::Simulate {
            fixture,
            expect,
            output,
            events,
        } => run_simulate(&catalog, config, logger, &fixture, expect, output, events),
        Commands::Stream { fixture, realtime } => {
            if realtime {
                run_stream_realtime(&catalog, config, &fixture)
            } else {
                run_stream(&catalog, config, logger, &fixture)
            }
        }
        Commands::DumpFixtures => run_dump(&catalog),
        Commands::Settings { file, set } => run_settings(file, &set, logger),
    }
}

fn run_simulate(
    catalog: &FixtureCatalog,
    config: AppConfig,
    logger: DebugLogger,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    include_events: bool,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, override_expect)?;
    let report = ScriptRunner::new(config, Settings::default())
        .with_logger(logger)
        .run(&data.script);

    emit_report(&report, include_events, output_path)?;

    if let Some(expectations) = data.expectations {
        match expectations.verify(&report) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&diff)?;
                Ok(ExitCode::from(2))
            }
        }
    } else {
        Ok(ExitCode::from(0))
    }
}

fn run_stream(
    catalog: &FixtureCatalog,
    config: AppConfig,
    logger: DebugLogger,
    fixture: &str,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, None)?;
    let report = ScriptRunner::new(config, Settings::default())
        .with_logger(logger)
        .run(&data.script);

    for event in &report.events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(ExitCode::from(0))
}

fn run_stream_realtime(
    catalog: &FixtureCatalog,
    config: AppConfig,
    fixture: &str,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, None)?;
    let total = Duration::from_millis(data.script.duration_ms());
    let actions = data.script.sorted_actions();

    let engine = EngineHandle::start(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(ScriptedSensorFeed::new(data.script)),
        Arc::new(SystemTimeSource::default()),
    )
    .map_err(|err| anyhow!("starting engine: {}", err))?;
    let mut events = engine.subscribe_events();

    let started = Instant::now();
    let mut pending = actions.iter().peekable();
    while started.elapsed() < total {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        while let Some(action) = pending.next_if(|a| a.at_ms <= elapsed_ms) {
            apply_action(&engine, action)?;
        }
        loop {
            match events.try_recv() {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(TryRecvError::Lagged(skipped)) => {
                    eprintln!("[espresso_cli] skipped {skipped} events")
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    engine.shutdown();
    println!("{}", serde_json::to_string(&engine.snapshot())?);
    Ok(ExitCode::from(0))
}

fn apply_action(engine: &EngineHandle, timed: &TimedAction) -> Result<()> {
    let result = match timed.action {
        ScriptAction::StartTimer => engine.start_timer(),
        ScriptAction::StopTimer => engine.stop_timer(),
        ScriptAction::ResetTimer => engine.reset_timer(),
        ScriptAction::Calibrate => engine.calibrate(),
        ScriptAction::CancelCalibration => engine.cancel_calibration(),
        ScriptAction::Background => engine.suspend(),
        ScriptAction::Foreground => engine.resume(),
        ScriptAction::SetSensitivity { level } => engine.set_sensitivity_level(level),
        ScriptAction::SetHysteresis { percent } => engine.set_hysteresis(percent),
        ScriptAction::SetPreInfusionDelay { delay_ms } => engine.set_pre_infusion_delay(delay_ms),
    };
    result.map_err(|err| anyhow!("applying action at {} ms: {}", timed.at_ms, err))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn run_settings(file: PathBuf, assignments: &[String], logger: DebugLogger) -> Result<ExitCode> {
    let store = JsonFileStore::open(&file).with_context(|| format!("opening {}", file.display()))?;

    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected key=value, got '{}'", assignment))?;
        store
            .set(key.trim(), value.trim())
            .with_context(|| format!("writing {}", key))?;
    }

    let loader = SettingsLoader::new(&store).with_logger(logger);
    let version_before = loader.version().unwrap_or(0);
    let settings = loader.load();
    let payload = SettingsReport {
        file: file.display().to_string(),
        version_before,
        version_after: loader.version().unwrap_or(0),
        threshold: settings.threshold(),
        settings,
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(ExitCode::from(0))
}

fn emit_report(
    report: &ReplayReport,
    include_events: bool,
    output_path: Option<PathBuf>,
) -> Result<()> {
    let payload = ReportPayload {
        fixture: &report.fixture,
        sample_count: report.sample_count,
        shot_count: report.shots.len(),
        shots: &report.shots,
        baseline: report.baseline,
        sensitivity: report.sensitivity,
        events: include_events.then_some(&report.events),
    };
    let json = serde_json::to_string_pretty(&payload)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct ReportPayload<'a> {
    fixture: &'a str,
    sample_count: usize,
    shot_count: usize,
    shots: &'a [espresso_sense::fixtures::ShotRecord],
    baseline: f64,
    sensitivity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<&'a Vec<espresso_sense::fixtures::TimedEvent>>,
}

#[derive(Serialize)]
struct SettingsReport {
    file: String,
    version_before: u32,
    version_after: u32,
    threshold: f64,
    settings: Settings,
}
