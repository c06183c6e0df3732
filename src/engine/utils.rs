use crate::types::{Direction, Vec2};

pub(super) fn offset(x: i32, y: i32, dir: Direction) -> (i32, i32) {
    match dir {
        Direction::Up => (x, y - 1),
        Direction::Down => (x, y + 1),
        Direction::Left => (x - 1, y),
        Direction::Right => (x + 1, y),
        Direction::None => (x, y),
    }
}

pub(super) fn neighbor(pos: Vec2, dir: Direction) -> Vec2 {
    let (x, y) = offset(pos.x, pos.y, dir);
    Vec2 { x, y }
}
