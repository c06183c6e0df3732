use crate::constants::{
    ghost_color, GHOST_STEP_FACTOR, RESPAWN_COOLDOWN_MS, STARTING_LIVES, TICK_MS,
};
use crate::error::LevelError;
use crate::input::InputBuffer;
use crate::rng::{RandomSource, Rng};
use crate::types::{
    Direction, GameOutcome, GameStatus, GameSummary, PlayerView, RuntimeEvent, Snapshot, Vec2,
};
use crate::world::{parse_level, Grid, Level};

pub mod ghost_policy;
pub mod movement;
mod utils;

use self::ghost_policy::{step_ghost, Ghost};
use self::movement::try_move;

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub seed: u32,
    pub tick_ms: u64,
    pub ghost_step_factor: u32,
    pub respawn_cooldown_ms: u64,
    pub starting_lives: u32,
}

impl Default for GameEngineOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_ms: TICK_MS,
            ghost_step_factor: GHOST_STEP_FACTOR,
            respawn_cooldown_ms: RESPAWN_COOLDOWN_MS,
            starting_lives: STARTING_LIVES,
        }
    }
}

impl GameEngineOptions {
    fn normalized(mut self) -> Self {
        self.tick_ms = self.tick_ms.max(1);
        self.ghost_step_factor = self.ghost_step_factor.max(1);
        self.starting_lives = self.starting_lives.max(1);
        self
    }
}

/// One play session: owns the grid, the agents and the score, and advances
/// them only through [`GameEngine::step`]. Input and control commands are
/// the only other mutations.
#[derive(Clone, Debug)]
pub struct GameEngine<R = Rng> {
    level: Level,
    options: GameEngineOptions,
    random: R,

    grid: Grid,
    player: Vec2,
    input: InputBuffer,
    ghosts: Vec<Ghost>,

    score: u32,
    lives: u32,
    remaining_collectibles: u32,
    ghost_step_counter: u32,
    status: GameStatus,
    level_number: u32,
    tick_counter: u64,
    events: Vec<RuntimeEvent>,
}

impl GameEngine<Rng> {
    pub fn new(level: Level, options: GameEngineOptions) -> Self {
        let random = Rng::new(options.seed);
        Self::with_random(level, options, random)
    }

    pub fn from_rows<S: AsRef<str>>(
        rows: &[S],
        options: GameEngineOptions,
    ) -> Result<Self, LevelError> {
        Ok(Self::new(parse_level(rows)?, options))
    }
}

impl<R: RandomSource> GameEngine<R> {
    pub fn with_random(level: Level, options: GameEngineOptions, random: R) -> Self {
        let options = options.normalized();
        let mut engine = Self {
            grid: level.grid.clone(),
            player: level.player_start,
            input: InputBuffer::default(),
            ghosts: Vec::new(),
            score: 0,
            lives: options.starting_lives,
            remaining_collectibles: 0,
            ghost_step_counter: 0,
            status: GameStatus::Running,
            level_number: 1,
            tick_counter: 0,
            events: Vec::new(),
            level,
            options,
            random,
        };
        engine.start_level();
        engine
    }

    pub fn tick_ms(&self) -> u64 {
        self.options.tick_ms
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn has_won(&self) -> bool {
        self.status == GameStatus::Won
    }

    pub fn is_game_over(&self) -> bool {
        self.status == GameStatus::GameOver
    }

    pub fn cooldown_ms(&self) -> u64 {
        match self.status {
            GameStatus::Cooldown { remaining_ms } => remaining_ms,
            _ => 0,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn remaining_collectibles(&self) -> u32 {
        self.remaining_collectibles
    }

    pub fn player_position(&self) -> Vec2 {
        self.player
    }

    pub fn input(&self) -> InputBuffer {
        self.input
    }

    pub fn ghosts(&self) -> &[Ghost] {
        &self.ghosts
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn level_number(&self) -> u32 {
        self.level_number
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn press(&mut self, dir: Direction) {
        self.input.press(dir);
    }

    pub fn release(&mut self, dir: Direction) {
        self.input.release(dir);
    }

    /// Fresh session: score and lives back to their starting values.
    pub fn reset(&mut self) {
        self.score = 0;
        self.lives = self.options.starting_lives;
        self.level_number = 1;
        self.start_level();
        tracing::info!(level = self.level_number, "session reset");
    }

    /// Reloads the level while keeping score and lives.
    pub fn next_level(&mut self) {
        self.level_number = self.level_number.saturating_add(1);
        self.start_level();
        tracing::info!(
            level = self.level_number,
            score = self.score,
            lives = self.lives,
            "next level"
        );
    }

    /// Runs one simulation tick and returns the resulting status.
    pub fn step(&mut self) -> GameStatus {
        match self.status {
            GameStatus::Won | GameStatus::GameOver => return self.status,
            GameStatus::Cooldown { remaining_ms } => {
                self.tick_counter += 1;
                let remaining_ms = remaining_ms.saturating_sub(self.options.tick_ms);
                if remaining_ms == 0 {
                    self.status = GameStatus::Running;
                    self.events.push(RuntimeEvent::Respawned);
                } else {
                    self.status = GameStatus::Cooldown { remaining_ms };
                }
                return self.status;
            }
            GameStatus::Running => {}
        }
        self.tick_counter += 1;

        self.advance_player();
        if let Some(ghost_id) = self.colliding_ghost() {
            self.lose_life(ghost_id);
            return self.status;
        }

        self.advance_ghosts();
        if let Some(ghost_id) = self.colliding_ghost() {
            self.lose_life(ghost_id);
            return self.status;
        }

        if self.remaining_collectibles == 0 {
            self.status = GameStatus::Won;
            self.events.push(RuntimeEvent::Won { score: self.score });
            tracing::info!(
                score = self.score,
                lives = self.lives,
                tick = self.tick_counter,
                "level cleared"
            );
        }
        self.status
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            level: self.level_number,
            tiles: self.grid.to_strings(),
            player: PlayerView {
                x: self.player.x,
                y: self.player.y,
                dir: self.input.current(),
                desired_dir: self.input.desired(),
            },
            ghosts: self.ghosts.iter().map(Ghost::view).collect(),
            score: self.score,
            lives: self.lives,
            remaining_collectibles: self.remaining_collectibles,
            status: self.status,
            has_won: self.has_won(),
            is_game_over: self.is_game_over(),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        let outcome = match self.status {
            GameStatus::Won => GameOutcome::Won,
            GameStatus::GameOver => GameOutcome::GameOver,
            GameStatus::Running | GameStatus::Cooldown { .. } => GameOutcome::InProgress,
        };
        GameSummary {
            outcome,
            score: self.score,
            lives: self.lives,
            level: self.level_number,
            ticks: self.tick_counter,
            remaining_collectibles: self.remaining_collectibles,
        }
    }

    fn start_level(&mut self) {
        self.grid = self.level.grid.clone();
        self.remaining_collectibles = self.grid.count_collectibles();
        self.player = self.level.player_start;
        self.input.clear();
        self.ghosts = spawn_ghosts(&self.level);
        self.ghost_step_counter = 0;
        self.status = GameStatus::Running;
        self.events.push(RuntimeEvent::LevelStarted {
            level: self.level_number,
        });
    }

    /// A pending turn takes priority. When it is blocked the player waits
    /// rather than continuing straight.
    fn advance_player(&mut self) {
        let desired = self.input.desired();
        let current = self.input.current();

        let mut dir = desired;
        let mut result = try_move(
            self.player,
            desired,
            &self.grid,
            self.score,
            self.remaining_collectibles,
        );
        if !result.moved && desired.is_none() {
            dir = current;
            result = try_move(
                self.player,
                current,
                &self.grid,
                self.score,
                self.remaining_collectibles,
            );
        }
        if !result.moved {
            return;
        }

        if result.consumed {
            self.events.push(RuntimeEvent::CollectibleEaten {
                x: result.position.x,
                y: result.position.y,
            });
        }
        self.player = result.position;
        self.grid = result.grid;
        self.score = result.score;
        self.remaining_collectibles = result.remaining_collectibles;
        self.input.commit_turn(dir);
    }

    fn advance_ghosts(&mut self) {
        self.ghost_step_counter += 1;
        if self.ghost_step_counter < self.options.ghost_step_factor {
            return;
        }
        self.ghost_step_counter = 0;
        for ghost in self.ghosts.iter_mut() {
            *ghost = step_ghost(ghost, &self.grid, &mut self.random);
        }
        tracing::trace!(tick = self.tick_counter, ghosts = self.ghosts.len(), "ghosts stepped");
    }

    fn colliding_ghost(&self) -> Option<String> {
        self.ghosts
            .iter()
            .find(|ghost| ghost.position == self.player)
            .map(|ghost| ghost.id.clone())
    }

    fn lose_life(&mut self, ghost_id: String) {
        self.lives = self.lives.saturating_sub(1);
        tracing::debug!(
            ghost = %ghost_id,
            lives = self.lives,
            x = self.player.x,
            y = self.player.y,
            "player caught"
        );
        self.events.push(RuntimeEvent::LifeLost {
            ghost_id,
            lives_left: self.lives,
        });

        if self.lives == 0 {
            self.status = GameStatus::GameOver;
            self.events.push(RuntimeEvent::GameOver { score: self.score });
            tracing::info!(score = self.score, tick = self.tick_counter, "game over");
            return;
        }

        self.player = self.level.player_start;
        self.input.clear();
        self.ghosts = spawn_ghosts(&self.level);
        self.ghost_step_counter = 0;
        self.status = if self.options.respawn_cooldown_ms == 0 {
            GameStatus::Running
        } else {
            GameStatus::Cooldown {
                remaining_ms: self.options.respawn_cooldown_ms,
            }
        };
    }
}

fn spawn_ghosts(level: &Level) -> Vec<Ghost> {
    level
        .ghost_starts
        .iter()
        .enumerate()
        .map(|(idx, start)| Ghost {
            id: format!("ghost_{}", idx + 1),
            position: *start,
            dir: Direction::None,
            color: ghost_color(idx),
        })
        .collect()
}
