use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use maze_pursuit_server::autopilot::Autopilot;
use maze_pursuit_server::config::GameConfig;
use maze_pursuit_server::error::Result;
use maze_pursuit_server::logging::init_tracing;
use maze_pursuit_server::session::{SessionDriver, TracingAudioSink};
use maze_pursuit_server::text_gen::{text_generator_from_env, FallbackTextGenerator, TextGenerator};
use maze_pursuit_server::types::{RuntimeEvent, SessionPhase, Snapshot};
use maze_pursuit_server::world::{world_to_grid, Grid};
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless autopilot runs over generated mazes")]
struct Cli {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 3)]
    runs: u32,
    #[arg(long)]
    maze_size: Option<i32>,
    /// Session time after which a run is cut off.
    #[arg(long, default_value_t = 180)]
    max_seconds: u64,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
    /// Request taunts and game-over lines from the remote model.
    #[arg(long)]
    llm: bool,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    seed: u32,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    #[serde(rename = "mazeSize")]
    maze_size: i32,
    phase: SessionPhase,
    #[serde(rename = "timedOut")]
    timed_out: bool,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    #[serde(rename = "runNoises")]
    run_noises: u32,
    throws: u32,
    hides: u32,
    #[serde(rename = "chaseEntries")]
    chase_entries: u32,
    #[serde(rename = "investigateEntries")]
    investigate_entries: u32,
    #[serde(rename = "tauntsRequested")]
    taunts_requested: u32,
    #[serde(rename = "gameOverLine")]
    game_over_line: Option<String>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct ScenarioRunResult {
    result: ScenarioResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "runId")]
    run_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "phaseCounts")]
    phase_counts: BTreeMap<String, usize>,
    scenarios: Vec<ScenarioResultLine>,
}

#[tokio::main]
async fn main() {
    init_tracing("info");
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(2);
        }
    };
    let generator: Arc<dyn TextGenerator> = if cli.llm {
        text_generator_from_env()
    } else {
        Arc::new(FallbackTextGenerator)
    };

    let scenarios = resolve_scenarios(&cli);
    let started_at = timestamp();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let run_id = cli
        .run_id
        .clone()
        .unwrap_or_else(|| default_run_id(seed_hint, Utc::now().timestamp_millis()));
    let max_ticks = cli.max_seconds * 1_000 / config.tick_ms();

    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut phase_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        info!(run = %run_id, scenario = %scenario.name, seed = scenario.seed, "scenario started");
        let scenario_run = run_scenario(&scenario, &config, generator.clone(), max_ticks).await;

        for anomaly in &scenario_run.anomaly_records {
            warn!(
                run = %run_id,
                scenario = %scenario.name,
                seed = scenario.seed,
                tick = anomaly.tick,
                message = %anomaly.message,
                "anomaly detected"
            );
        }
        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();
        total_duration_ms += scenario_run.result.duration_ms;
        *phase_counts
            .entry(phase_key(scenario_run.result.phase, scenario_run.result.timed_out))
            .or_insert(0) += 1;

        info!(
            run = %run_id,
            scenario = %scenario.name,
            tick = scenario_run.finished_tick,
            phase = ?scenario_run.result.phase,
            duration_ms = scenario_run.result.duration_ms,
            anomalies = scenario_run.anomaly_records.len(),
            "scenario finished"
        );

        match serde_json::to_string(&scenario_run.result) {
            Ok(line) => println!("{line}"),
            Err(err) => error!(error = %err, "failed to serialize scenario result"),
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        run_id.clone(),
        started_at,
        timestamp(),
        scenario_results,
        phase_counts,
        total_anomalies,
        total_duration_ms,
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(err) = write_summary(path, &summary) {
            error!(path = %path.to_string_lossy(), error = %err, "summary write failed");
            std::process::exit(2);
        }
    }

    info!(
        run = %run_id,
        scenarios = summary.scenario_count,
        anomalies = summary.anomaly_count,
        average_duration_ms = summary.average_duration_ms,
        "run finished"
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<GameConfig> {
    let mut config = match cli.config.as_ref() {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::from_env()?,
    };
    if let Some(size) = cli.maze_size {
        config.maze_width = size;
        config.maze_height = size;
    }
    config.validate()?;
    Ok(config)
}

async fn run_scenario(
    scenario: &Scenario,
    config: &GameConfig,
    generator: Arc<dyn TextGenerator>,
    max_ticks: u64,
) -> ScenarioRunResult {
    let tick_ms = config.tick_ms();
    let mut driver = SessionDriver::new(config.clone(), scenario.seed, generator, Arc::new(TracingAudioSink));
    let mut autopilot = Autopilot::default();

    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut caught_events = 0;
    let mut last_tick = 0u64;

    while !driver.engine().is_ended() && last_tick < max_ticks {
        let intent = autopilot.decide(driver.engine());
        driver.receive_input(intent);
        let snapshot = driver.tick(tick_ms);
        // lets in-flight text requests make progress
        tokio::task::yield_now().await;
        last_tick = snapshot.tick;

        for message in collect_snapshot_anomalies(&snapshot, driver.engine().grid(), config) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        caught_events += snapshot
            .events
            .iter()
            .filter(|event| matches!(event, RuntimeEvent::Caught))
            .count();
    }

    if caught_events > 1 {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            last_tick,
            format!("catch fired {caught_events} times"),
        );
    }

    let summary = driver.summary();
    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            maze_size: driver.engine().grid().width(),
            phase: summary.phase,
            timed_out: !summary.phase.is_terminal(),
            duration_ms: summary.duration_ms,
            run_noises: summary.stats.run_noises,
            throws: summary.stats.throws,
            hides: summary.stats.hides,
            chase_entries: summary.stats.chase_entries,
            investigate_entries: summary.stats.investigate_entries,
            taunts_requested: summary.stats.taunts_requested,
            game_over_line: summary.game_over_line,
            anomalies,
        },
        anomaly_records,
        finished_tick: last_tick,
    }
}

fn collect_snapshot_anomalies(snapshot: &Snapshot, grid: &Grid, config: &GameConfig) -> Vec<String> {
    let mut anomalies = Vec::new();
    let player = &snapshot.player;
    if !player.stamina.is_finite() || player.stamina < 0.0 || player.stamina > player.stamina_max {
        anomalies.push(format!(
            "stamina out of range: {}/{}",
            player.stamina, player.stamina_max
        ));
    }

    let positions = [
        ("player", player.x, player.z),
        ("adversary", snapshot.adversary.x, snapshot.adversary.z),
    ];
    for (who, x, z) in positions {
        if !x.is_finite() || !z.is_finite() {
            anomalies.push(format!("{who} position is not finite"));
            continue;
        }
        let cell = world_to_grid(glam::Vec2::new(x, z), config.cell_size);
        if !grid.is_walkable(cell) {
            anomalies.push(format!("{who} inside wall cell {cell}"));
        }
    }

    if player.hidden && snapshot.events.iter().any(|event| matches!(event, RuntimeEvent::Caught)) {
        anomalies.push("caught while hidden".to_string());
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let base = cli
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);
    (0..cli.runs.max(1))
        .map(|index| {
            let seed = normalize_seed(base.wrapping_add(index as u64));
            Scenario {
                name: format!("autopilot-{}", index + 1),
                seed,
            }
        })
        .collect()
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_run_id(seed: u32, timestamp_ms: i64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    run_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    phase_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let average_duration_ms = if scenario_count == 0 {
        0
    } else {
        total_duration_ms / scenario_count as u64
    };
    RunSummary {
        run_id,
        started_at,
        finished_at,
        scenario_count,
        anomaly_count,
        average_duration_ms,
        phase_counts,
        scenarios,
    }
}

fn phase_key(phase: SessionPhase, timed_out: bool) -> String {
    if timed_out {
        return "timeout".to_string();
    }
    match phase {
        SessionPhase::Playing => "playing",
        SessionPhase::Caught => "caught",
        SessionPhase::GameOver => "game_over",
        SessionPhase::Victory => "victory",
    }
    .to_string()
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, summary_text)?;
    Ok(())
}
