use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors raised while loading a level, before any tick runs.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level has no rows or zero-width rows")]
    Empty,

    #[error("level row {row} has width {width}, expected {expected}")]
    Ragged {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("unknown tile {tile:?} at ({x},{y})")]
    UnknownTile { tile: char, x: usize, y: usize },

    #[error("level has no player start marker and the default cell ({x},{y}) is not free floor")]
    UnusableDefaultStart { x: i32, y: i32 },

    #[error("failed to read level {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
