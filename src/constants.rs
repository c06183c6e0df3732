use crate::types::GhostColor;

pub const TICK_MS: u64 = 120;
pub const GHOST_STEP_FACTOR: u32 = 3;
pub const RESPAWN_COOLDOWN_MS: u64 = 1_500;

pub const STARTING_LIVES: u32 = 3;
pub const COLLECTIBLE_SCORE: u32 = 10;

/// Start cell used when a level carries no `P` marker.
pub const DEFAULT_PLAYER_START: (i32, i32) = (1, 1);

pub const GHOST_PALETTE: [GhostColor; 4] = [
    GhostColor::Red,
    GhostColor::Pink,
    GhostColor::Cyan,
    GhostColor::Orange,
];

pub fn ghost_color(index: usize) -> GhostColor {
    GHOST_PALETTE[index % GHOST_PALETTE.len()]
}
