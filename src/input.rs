use crate::types::Direction;

/// Directional intent built from key-down/key-up edges. Only the tick
/// reads it; input handlers never touch session state directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputBuffer {
    current: Direction,
    desired: Direction,
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self {
            current: Direction::None,
            desired: Direction::None,
        }
    }
}

impl InputBuffer {
    pub fn current(&self) -> Direction {
        self.current
    }

    pub fn desired(&self) -> Direction {
        self.desired
    }

    pub fn press(&mut self, dir: Direction) {
        if dir.is_none() {
            return;
        }
        if self.current.is_none() {
            self.current = dir;
        }
        self.desired = dir;
    }

    /// Stops only when the released key is the one driving both slots;
    /// releasing a stale key while a newer one is held does nothing.
    pub fn release(&mut self, dir: Direction) {
        if self.current == dir && self.desired == dir {
            self.clear();
        }
    }

    pub(crate) fn commit_turn(&mut self, dir: Direction) {
        self.current = dir;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
