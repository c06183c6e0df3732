use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::GameEngine;
use crate::rng::RandomSource;
use crate::types::{Direction, GameSummary, RuntimeEvent, Snapshot};

const COMMAND_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeCommand {
    Press(Direction),
    Release(Direction),
    Reset,
    NextLevel,
}

/// Drives a [`GameEngine`] on a fixed wall-clock period. Ticks and commands
/// are handled by a single task, so a tick always finishes before the next
/// command or tick is looked at; late ticks are skipped, never stacked.
///
/// Snapshots on the watch channel hold only the latest state and carry no
/// events. Events go through a separate queue that keeps every one of them.
pub struct GameRuntime {
    commands: mpsc::Sender<RuntimeCommand>,
    snapshots: watch::Receiver<Snapshot>,
    events: Option<mpsc::UnboundedReceiver<RuntimeEvent>>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<GameSummary>>,
}

impl GameRuntime {
    pub fn spawn<R>(mut engine: GameEngine<R>) -> Self
    where
        R: RandomSource + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.build_snapshot(false));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let publisher = Publisher {
            snapshots: snapshot_tx,
            events: event_tx,
        };
        let task = tokio::spawn(run_tick_loop(engine, command_rx, publisher, stop_rx));
        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: Some(event_rx),
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Queues a command for the tick task. Returns `false` once the loop
    /// has stopped.
    pub async fn send(&self, command: RuntimeCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Non-blocking variant for key handlers; drops the command when the
    /// queue is full.
    pub fn try_send(&self, command: RuntimeCommand) -> bool {
        self.commands.try_send(command).is_ok()
    }

    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Hands out the event queue. Only the first call returns it.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<RuntimeEvent>> {
        self.events.take()
    }

    /// Stops ticking and hands back the final summary.
    pub async fn shutdown(mut self) -> Option<GameSummary> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let task = self.task.take()?;
        task.await.ok()
    }
}

impl Drop for GameRuntime {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn apply_command<R: RandomSource>(engine: &mut GameEngine<R>, command: RuntimeCommand) -> bool {
    match command {
        RuntimeCommand::Press(dir) => {
            engine.press(dir);
            false
        }
        RuntimeCommand::Release(dir) => {
            engine.release(dir);
            false
        }
        RuntimeCommand::Reset => {
            engine.reset();
            true
        }
        RuntimeCommand::NextLevel => {
            engine.next_level();
            true
        }
    }
}

struct Publisher {
    snapshots: watch::Sender<Snapshot>,
    events: mpsc::UnboundedSender<RuntimeEvent>,
}

impl Publisher {
    /// Returns `false` once every snapshot reader is gone.
    fn publish<R: RandomSource>(&self, engine: &mut GameEngine<R>) -> bool {
        let mut snapshot = engine.build_snapshot(true);
        for event in snapshot.events.drain(..) {
            // Nobody listening for events is fine.
            let _ = self.events.send(event);
        }
        self.snapshots.send(snapshot).is_ok()
    }
}

async fn run_tick_loop<R: RandomSource>(
    mut engine: GameEngine<R>,
    mut commands: mpsc::Receiver<RuntimeCommand>,
    publisher: Publisher,
    mut stop: oneshot::Receiver<()>,
) -> GameSummary {
    let period = Duration::from_millis(engine.tick_ms());
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(tick_ms = engine.tick_ms(), "tick loop started");

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                engine.step();
                if !publisher.publish(&mut engine) {
                    break;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                if apply_command(&mut engine, command) && !publisher.publish(&mut engine) {
                    break;
                }
            }
        }
    }

    let summary = engine.build_summary();
    tracing::info!(
        ticks = summary.ticks,
        score = summary.score,
        outcome = ?summary.outcome,
        "tick loop stopped"
    );
    summary
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{GameRuntime, RuntimeCommand};
    use crate::engine::{GameEngine, GameEngineOptions};
    use crate::types::{Direction, GameOutcome, GameStatus, RuntimeEvent};

    fn corridor_engine() -> GameEngine {
        GameEngine::from_rows(&["######", "#P...#", "######"], GameEngineOptions::default())
            .expect("level parses")
    }

    #[tokio::test(start_paused = true)]
    async fn press_is_applied_on_next_tick() {
        let runtime = GameRuntime::spawn(corridor_engine());
        let mut rx = runtime.snapshots();
        assert_eq!(rx.borrow().player.x, 1);

        assert!(runtime.send(RuntimeCommand::Press(Direction::Right)).await);
        rx.changed().await.expect("tick published");
        {
            let snapshot = rx.borrow_and_update();
            assert_eq!(snapshot.tick, 1);
            assert_eq!(snapshot.player.x, 2);
            assert_eq!(snapshot.score, 10);
        }

        assert!(runtime.send(RuntimeCommand::Release(Direction::Right)).await);
        rx.changed().await.expect("tick published");
        assert_eq!(rx.borrow_and_update().player.x, 2);

        let summary = runtime.shutdown().await.expect("summary");
        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.outcome, GameOutcome::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_the_configured_period() {
        let runtime = GameRuntime::spawn(corridor_engine());
        let mut rx = runtime.snapshots();
        let started = tokio::time::Instant::now();
        rx.changed().await.expect("tick published");
        assert_eq!(started.elapsed(), Duration::from_millis(120));
        rx.changed().await.expect("tick published");
        assert_eq!(started.elapsed(), Duration::from_millis(240));
        assert_eq!(rx.borrow().tick, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn control_commands_publish_immediately() {
        let runtime = GameRuntime::spawn(corridor_engine());
        let mut rx = runtime.snapshots();
        assert!(runtime.send(RuntimeCommand::Press(Direction::Right)).await);
        for _ in 0..3 {
            rx.changed().await.expect("tick published");
        }
        assert_eq!(rx.borrow_and_update().status, GameStatus::Won);

        assert!(runtime.send(RuntimeCommand::NextLevel).await);
        rx.changed().await.expect("next level published");
        {
            let snapshot = rx.borrow_and_update();
            assert_eq!(snapshot.level, 2);
            assert_eq!(snapshot.score, 30);
            assert_eq!(snapshot.status, GameStatus::Running);
            assert_eq!(snapshot.player.x, 1);
        }

        assert!(runtime.send(RuntimeCommand::Reset).await);
        rx.changed().await.expect("reset published");
        let snapshot = rx.borrow_and_update();
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.score, 0);
        assert_eq!(snapshot.lives, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn events_survive_a_reader_that_skips_ticks() {
        let mut runtime = GameRuntime::spawn(
            GameEngine::from_rows(&["#######", "#P....#", "#######"], GameEngineOptions::default())
                .expect("level parses"),
        );
        let mut events = runtime.take_events().expect("event queue");
        assert!(runtime.take_events().is_none());
        let rx = runtime.snapshots();

        assert!(runtime.send(RuntimeCommand::Press(Direction::Right)).await);
        tokio::time::sleep(Duration::from_millis(370)).await;
        {
            let snapshot = rx.borrow();
            assert_eq!(snapshot.tick, 3);
            assert_eq!(snapshot.score, 30);
            assert!(snapshot.events.is_empty());
        }

        let mut eaten = 0;
        let mut level_started = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                RuntimeEvent::CollectibleEaten { .. } => eaten += 1,
                RuntimeEvent::LevelStarted { level: 1 } => level_started += 1,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(eaten * 10, 30);
        assert_eq!(level_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_publishing() {
        let runtime = GameRuntime::spawn(corridor_engine());
        let mut rx = runtime.snapshots();
        let summary = runtime.shutdown().await.expect("summary");
        assert_eq!(summary.ticks, 0);
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_runtime_cancels_pending_ticks() {
        let runtime = GameRuntime::spawn(corridor_engine());
        let mut rx = runtime.snapshots();
        drop(runtime);
        assert!(rx.changed().await.is_err());
    }
}
