use crate::rng::RandomSource;
use crate::types::{Direction, GhostColor, GhostView, Vec2};
use crate::world::Grid;

use super::utils::neighbor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ghost {
    pub id: String,
    pub position: Vec2,
    pub dir: Direction,
    pub color: GhostColor,
}

impl Ghost {
    pub fn view(&self) -> GhostView {
        GhostView {
            id: self.id.clone(),
            x: self.position.x,
            y: self.position.y,
            dir: self.dir,
            color: self.color,
        }
    }
}

/// Cardinal directions leading to a traversable cell, in `Direction::CARDINALS`
/// order, with the reversal of `current` dropped whenever another option
/// remains.
pub fn candidate_directions(position: Vec2, current: Direction, grid: &Grid) -> Vec<Direction> {
    let mut candidates: Vec<Direction> = Direction::CARDINALS
        .into_iter()
        .filter(|dir| {
            let next = neighbor(position, *dir);
            grid.is_traversable(next.x, next.y)
        })
        .collect();

    if !current.is_none() && candidates.len() > 1 {
        let reverse = current.opposite();
        candidates.retain(|dir| *dir != reverse);
    }
    candidates
}

/// Random walk step. A ghost boxed in on all four sides stays put.
pub fn step_ghost<R: RandomSource>(ghost: &Ghost, grid: &Grid, random: &mut R) -> Ghost {
    let candidates = candidate_directions(ghost.position, ghost.dir, grid);
    if candidates.is_empty() {
        return ghost.clone();
    }
    let dir = candidates[random.pick_index(candidates.len())];
    Ghost {
        position: neighbor(ghost.position, dir),
        dir,
        ..ghost.clone()
    }
}
