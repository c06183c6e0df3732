use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use clap::Parser;
use pacman_retro::engine::{GameEngine, GameEngineOptions};
use pacman_retro::error::LevelError;
use pacman_retro::protocol::parse_command;
use pacman_retro::runtime::GameRuntime;
use pacman_retro::types::{
    Direction, GameOutcome, GameSummary, RuntimeEvent, Snapshot,
};
use pacman_retro::world::{load_level, reference_level, Level};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Level file; the built-in maze is used when omitted.
    #[arg(long)]
    level: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 2_000)]
    max_ticks: u64,
    /// Press a random direction every N ticks (0 disables the autopilot).
    #[arg(long, default_value_t = 4)]
    autopilot_every: u64,
    #[arg(long)]
    emit_snapshots: bool,
    /// Run on the wall clock, reading JSON commands from stdin.
    #[arg(long)]
    realtime: bool,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct RunResultLine {
    seed: u32,
    outcome: GameOutcome,
    score: u32,
    lives: u32,
    level: u32,
    ticks: u64,
    #[serde(rename = "remainingCollectibles")]
    remaining_collectibles: u32,
    #[serde(rename = "collectiblesEaten")]
    collectibles_eaten: u32,
    #[serde(rename = "livesLost")]
    lives_lost: u32,
    #[serde(rename = "finishedAt")]
    finished_at: String,
}

#[derive(Clone, Copy, Debug, Default)]
struct EventTally {
    collectibles_eaten: u32,
    lives_lost: u32,
}

impl EventTally {
    fn record(&mut self, events: &[RuntimeEvent]) {
        for event in events {
            match event {
                RuntimeEvent::CollectibleEaten { .. } => self.collectibles_eaten += 1,
                RuntimeEvent::LifeLost { .. } => self.lives_lost += 1,
                _ => {}
            }
        }
    }
}

struct Autopilot {
    rng: StdRng,
    every: u64,
}

impl Autopilot {
    fn new(seed: u32, every: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed as u64),
            every,
        }
    }

    fn next(&mut self, tick: u64) -> Option<Direction> {
        if self.every == 0 || tick % self.every != 0 {
            return None;
        }
        Some(Direction::CARDINALS[self.rng.random_range(0..Direction::CARDINALS.len())])
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let seed = normalize_seed(cli.seed.unwrap_or_else(rand::random));

    let level = match resolve_level(cli.level.as_deref()) {
        Ok(level) => level,
        Err(error) => {
            tracing::error!(%error, "failed to load level");
            std::process::exit(2);
        }
    };
    tracing::info!(
        seed,
        width = level.grid.width(),
        height = level.grid.height(),
        ghosts = level.ghost_starts.len(),
        realtime = cli.realtime,
        "run started"
    );

    let options = GameEngineOptions {
        seed,
        ..GameEngineOptions::default()
    };
    let result = if cli.realtime {
        match run_realtime(level, options, cli.emit_snapshots) {
            Ok(result) => result,
            Err(error) => {
                tracing::error!(%error, "failed to start async runtime");
                std::process::exit(2);
            }
        }
    } else {
        run_headless(
            level,
            options,
            cli.max_ticks,
            cli.autopilot_every,
            cli.emit_snapshots,
        )
    };

    println!(
        "{}",
        serde_json::to_string(&result).expect("run result should serialize")
    );

    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &result) {
            tracing::error!(path = %path.display(), %error, "summary write failed");
            std::process::exit(2);
        }
    }

    tracing::info!(
        outcome = ?result.outcome,
        score = result.score,
        ticks = result.ticks,
        "run finished"
    );
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();
}

fn resolve_level(path: Option<&Path>) -> Result<Level, LevelError> {
    match path {
        Some(path) => load_level(path),
        None => reference_level(),
    }
}

fn run_headless(
    level: Level,
    options: GameEngineOptions,
    max_ticks: u64,
    autopilot_every: u64,
    emit_snapshots: bool,
) -> RunResultLine {
    let seed = options.seed;
    let mut engine = GameEngine::new(level, options);
    let mut autopilot = Autopilot::new(seed, autopilot_every);
    let mut tally = EventTally::default();

    for tick in 0..max_ticks {
        if let Some(dir) = autopilot.next(tick) {
            engine.press(dir);
        }
        let status = engine.step();
        let snapshot = engine.build_snapshot(true);
        tally.record(&snapshot.events);
        if emit_snapshots {
            print_snapshot(&snapshot);
        }
        if status.is_terminal() {
            break;
        }
    }

    build_result_line(seed, engine.build_summary(), tally)
}

fn run_realtime(
    level: Level,
    options: GameEngineOptions,
    emit_snapshots: bool,
) -> io::Result<RunResultLine> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(drive_realtime(level, options, emit_snapshots)))
}

async fn drive_realtime(
    level: Level,
    options: GameEngineOptions,
    emit_snapshots: bool,
) -> RunResultLine {
    let seed = options.seed;
    let mut game = GameRuntime::spawn(GameEngine::new(level, options));
    let mut snapshots = game.snapshots();
    let mut events = game.take_events();
    let mut last = snapshots.borrow().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut tally = EventTally::default();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                last = snapshots.borrow_and_update().clone();
                if emit_snapshots {
                    print_snapshot(&last);
                }
            }
            Some(event) = next_event(&mut events) => {
                tally.record(std::slice::from_ref(&event));
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(command) => {
                        if !game.send(command).await {
                            break;
                        }
                    }
                    None => tracing::warn!(line = %line, "ignored unrecognized command"),
                },
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(%error, "stdin read failed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let summary = match game.shutdown().await {
        Some(summary) => summary,
        None => summary_from_snapshot(&last),
    };
    if let Some(events) = events.as_mut() {
        while let Ok(event) = events.try_recv() {
            tally.record(std::slice::from_ref(&event));
        }
    }
    build_result_line(seed, summary, tally)
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<RuntimeEvent>>,
) -> Option<RuntimeEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

fn summary_from_snapshot(snapshot: &Snapshot) -> GameSummary {
    let outcome = if snapshot.has_won {
        GameOutcome::Won
    } else if snapshot.is_game_over {
        GameOutcome::GameOver
    } else {
        GameOutcome::InProgress
    };
    GameSummary {
        outcome,
        score: snapshot.score,
        lives: snapshot.lives,
        level: snapshot.level,
        ticks: snapshot.tick,
        remaining_collectibles: snapshot.remaining_collectibles,
    }
}

fn build_result_line(seed: u32, summary: GameSummary, tally: EventTally) -> RunResultLine {
    RunResultLine {
        seed,
        outcome: summary.outcome,
        score: summary.score,
        lives: summary.lives,
        level: summary.level,
        ticks: summary.ticks,
        remaining_collectibles: summary.remaining_collectibles,
        collectibles_eaten: tally.collectibles_eaten,
        lives_lost: tally.lives_lost,
        finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "{}",
        serde_json::to_string(snapshot).expect("snapshot should serialize")
    );
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn write_summary(path: &Path, result: &RunResultLine) -> io::Result<()> {
    let summary_text =
        serde_json::to_string_pretty(result).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}
