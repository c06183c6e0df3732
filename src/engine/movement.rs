use crate::constants::COLLECTIBLE_SCORE;
use crate::types::{Direction, Vec2};
use crate::world::Grid;

use super::utils::neighbor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveResult {
    pub moved: bool,
    pub consumed: bool,
    pub position: Vec2,
    pub grid: Grid,
    pub score: u32,
    pub remaining_collectibles: u32,
}

/// Advances one cell in `dir` when the target is traversable, eating any
/// collectible found there. Blocked moves and `Direction::None` hand the
/// inputs back with `moved == false`.
pub fn try_move(
    position: Vec2,
    dir: Direction,
    grid: &Grid,
    score: u32,
    remaining_collectibles: u32,
) -> MoveResult {
    let unchanged = || MoveResult {
        moved: false,
        consumed: false,
        position,
        grid: grid.clone(),
        score,
        remaining_collectibles,
    };

    if dir.is_none() {
        return unchanged();
    }
    let target = neighbor(position, dir);
    if !grid.is_traversable(target.x, target.y) {
        return unchanged();
    }

    let (consumed, grid) = grid.consume_if_collectible(target.x, target.y);
    let (score, remaining_collectibles) = if consumed {
        (
            score.saturating_add(COLLECTIBLE_SCORE),
            remaining_collectibles.saturating_sub(1),
        )
    } else {
        (score, remaining_collectibles)
    };

    MoveResult {
        moved: true,
        consumed,
        position: target,
        grid,
        score,
        remaining_collectibles,
    }
}
