use std::path::Path;
use std::sync::Arc;

use crate::constants::DEFAULT_PLAYER_START;
use crate::error::LevelError;
use crate::types::{Tile, Vec2};

pub const REFERENCE_LEVEL: [&str; 13] = [
    "###################",
    "#........#........#",
    "#.##.###.#.###.##.#",
    "#.................#",
    "#.##.#.#####.#.##.#",
    "#....#...#...#....#",
    "####.### # ###.####",
    "####.#  GGGG #.####",
    "####.#########.####",
    "#........P........#",
    "#.##.###.#.###.##.#",
    "#....#.......#....#",
    "###################",
];

/// Rectangular tile map. Rows are shared between grid generations, so a
/// mutation only copies the row it touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: i32,
    height: i32,
    rows: Vec<Arc<[Tile]>>,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, LevelError> {
        let expected = rows.first().map(|row| row.len()).unwrap_or(0);
        if expected == 0 {
            return Err(LevelError::Empty);
        }
        for (row, tiles) in rows.iter().enumerate() {
            if tiles.len() != expected {
                return Err(LevelError::Ragged {
                    row,
                    width: tiles.len(),
                    expected,
                });
            }
        }
        Ok(Self {
            width: expected as i32,
            height: rows.len() as i32,
            rows: rows.into_iter().map(Arc::from).collect(),
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        if !self.in_bounds(x, y) {
            return None;
        }
        self.rows
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    pub fn is_traversable(&self, x: i32, y: i32) -> bool {
        matches!(self.tile(x, y), Some(Tile::Collectible | Tile::Empty))
    }

    /// Returns the grid with `(x, y)` cleared when it held a collectible.
    /// `self` is left untouched either way.
    pub fn consume_if_collectible(&self, x: i32, y: i32) -> (bool, Grid) {
        if self.tile(x, y) != Some(Tile::Collectible) {
            return (false, self.clone());
        }
        let mut row: Vec<Tile> = self.rows[y as usize].to_vec();
        row[x as usize] = Tile::Empty;
        let mut rows = self.rows.clone();
        rows[y as usize] = Arc::from(row);
        (
            true,
            Grid {
                width: self.width,
                height: self.height,
                rows,
            },
        )
    }

    pub fn count_collectibles(&self) -> u32 {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|tile| **tile == Tile::Collectible)
            .count() as u32
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|tile| tile.as_char()).collect())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn shares_row_with(&self, other: &Grid, y: usize) -> bool {
        Arc::ptr_eq(&self.rows[y], &other.rows[y])
    }
}

/// A parsed level: the pristine grid plus the fixed start cells that every
/// reset and life loss return to.
#[derive(Clone, Debug)]
pub struct Level {
    pub grid: Grid,
    pub player_start: Vec2,
    pub ghost_starts: Vec<Vec2>,
}

pub fn parse_level<S: AsRef<str>>(rows: &[S]) -> Result<Level, LevelError> {
    let mut tiles = Vec::with_capacity(rows.len());
    let mut player_starts = Vec::new();
    let mut ghost_starts = Vec::new();

    for (y, raw) in rows.iter().enumerate() {
        let mut row = Vec::new();
        for (x, c) in raw.as_ref().chars().enumerate() {
            let tile = match c {
                '#' => Tile::Wall,
                '.' => Tile::Collectible,
                ' ' => Tile::Empty,
                'P' => {
                    player_starts.push(Vec2::new(x as i32, y as i32));
                    Tile::Empty
                }
                'G' => {
                    ghost_starts.push(Vec2::new(x as i32, y as i32));
                    Tile::Empty
                }
                tile => return Err(LevelError::UnknownTile { tile, x, y }),
            };
            row.push(tile);
        }
        tiles.push(row);
    }

    let grid = Grid::from_rows(tiles)?;
    let player_start = match player_starts.as_slice() {
        [] => {
            let (x, y) = DEFAULT_PLAYER_START;
            let start = Vec2::new(x, y);
            if !grid.is_traversable(x, y) || ghost_starts.contains(&start) {
                return Err(LevelError::UnusableDefaultStart { x, y });
            }
            tracing::warn!(x, y, "level has no player start marker, using default cell");
            start
        }
        [only] => *only,
        [first, ..] => {
            tracing::warn!(
                count = player_starts.len(),
                x = first.x,
                y = first.y,
                "level has several player start markers, using the first"
            );
            *first
        }
    };

    Ok(Level {
        grid,
        player_start,
        ghost_starts,
    })
}

pub fn parse_level_text(text: &str) -> Result<Level, LevelError> {
    let mut rows: Vec<&str> = text.lines().collect();
    while rows.last().map(|row| row.is_empty()).unwrap_or(false) {
        rows.pop();
    }
    parse_level(&rows)
}

pub fn load_level(path: &Path) -> Result<Level, LevelError> {
    let text = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_level_text(&text)
}

pub fn reference_level() -> Result<Level, LevelError> {
    parse_level(&REFERENCE_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::{load_level, parse_level, parse_level_text, reference_level, Grid};
    use crate::error::LevelError;
    use crate::types::{Tile, Vec2};

    #[test]
    fn reference_level_is_rectangular_with_four_ghosts() {
        let level = reference_level().expect("reference level parses");
        assert_eq!(level.grid.width(), 19);
        assert_eq!(level.grid.height(), 13);
        assert_eq!(level.player_start, Vec2::new(9, 9));
        assert_eq!(level.ghost_starts.len(), 4);
        assert!(level.grid.count_collectibles() > 0);
        for start in &level.ghost_starts {
            assert!(level.grid.is_traversable(start.x, start.y));
        }
    }

    #[test]
    fn traversable_excludes_walls_and_out_of_bounds() {
        let level = parse_level(&["#. ", "#P#"]).expect("level parses");
        let grid = &level.grid;
        assert!(!grid.is_traversable(0, 0));
        assert!(grid.is_traversable(1, 0));
        assert!(grid.is_traversable(2, 0));
        assert!(grid.is_traversable(1, 1));
        assert!(!grid.is_traversable(-1, 0));
        assert!(!grid.is_traversable(0, -1));
        assert!(!grid.is_traversable(3, 0));
        assert!(!grid.is_traversable(0, 2));
    }

    #[test]
    fn consume_clears_only_the_target_and_keeps_prior_grid() {
        let level = parse_level(&["#..#", "#P #"]).expect("level parses");
        let before = level.grid.clone();

        let (consumed, after) = before.consume_if_collectible(1, 0);
        assert!(consumed);
        assert_eq!(after.tile(1, 0), Some(Tile::Empty));
        assert_eq!(after.tile(2, 0), Some(Tile::Collectible));
        assert_eq!(before.tile(1, 0), Some(Tile::Collectible));
        assert!(after.shares_row_with(&before, 1));
        assert!(!after.shares_row_with(&before, 0));

        let (again, unchanged) = after.consume_if_collectible(1, 0);
        assert!(!again);
        assert_eq!(unchanged, after);

        let (wall, _) = after.consume_if_collectible(0, 0);
        assert!(!wall);
    }

    #[test]
    fn ragged_and_empty_levels_fail_fast() {
        assert!(matches!(
            parse_level(&["###", "#P"]),
            Err(LevelError::Ragged {
                row: 1,
                width: 2,
                expected: 3
            })
        ));
        assert!(matches!(
            parse_level::<&str>(&[]),
            Err(LevelError::Empty)
        ));
        assert!(matches!(parse_level(&["", ""]), Err(LevelError::Empty)));
        assert!(matches!(
            Grid::from_rows(Vec::new()),
            Err(LevelError::Empty)
        ));
    }

    #[test]
    fn unknown_tile_is_rejected_with_position() {
        let err = parse_level(&["#P#", "#x#"]).expect_err("x is not a tile");
        assert!(matches!(
            err,
            LevelError::UnknownTile {
                tile: 'x',
                x: 1,
                y: 1
            }
        ));
    }

    #[test]
    fn missing_start_marker_falls_back_to_default_cell() {
        let level = parse_level(&["####", "#..#", "####"]).expect("level parses");
        assert_eq!(level.player_start, Vec2::new(1, 1));
    }

    #[test]
    fn default_start_on_a_wall_is_rejected() {
        assert!(matches!(
            parse_level(&["#####", "##..#", "#####"]),
            Err(LevelError::UnusableDefaultStart { x: 1, y: 1 })
        ));
    }

    #[test]
    fn default_start_outside_a_single_row_level_is_rejected() {
        assert!(matches!(
            parse_level(&["..."]),
            Err(LevelError::UnusableDefaultStart { x: 1, y: 1 })
        ));
    }

    #[test]
    fn default_start_on_a_ghost_start_is_rejected() {
        assert!(matches!(
            parse_level(&["####", "#G.#", "####"]),
            Err(LevelError::UnusableDefaultStart { x: 1, y: 1 })
        ));
    }

    #[test]
    fn first_start_marker_wins_when_several_are_present() {
        let level = parse_level(&["#P P#"]).expect("level parses");
        assert_eq!(level.player_start, Vec2::new(1, 0));
    }

    #[test]
    fn text_parsing_ignores_trailing_blank_lines_and_crlf() {
        let level = parse_level_text("###\r\n#P#\r\n###\r\n\r\n").expect("level parses");
        assert_eq!(level.grid.height(), 3);
        assert_eq!(level.grid.width(), 3);
        assert_eq!(level.grid.to_strings(), vec!["###", "# #", "###"]);
    }

    #[test]
    fn load_level_reports_missing_file() {
        let target = std::env::temp_dir()
            .join("pacman-retro-missing-dir")
            .join("level.txt");
        let err = load_level(&target).expect_err("file does not exist");
        assert!(matches!(err, LevelError::Io { .. }));
    }
}
