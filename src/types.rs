use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub const CARDINALS: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::None => Self::None,
        }
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tile {
    Wall,
    Collectible,
    Empty,
}

impl Tile {
    pub fn as_char(self) -> char {
        match self {
            Self::Wall => '#',
            Self::Collectible => '.',
            Self::Empty => ' ',
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GhostColor {
    Red,
    Pink,
    Cyan,
    Orange,
}

/// Explicit form of the session's running/frozen/terminal phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GameStatus {
    Running,
    Cooldown {
        #[serde(rename = "remainingMs")]
        remaining_ms: u64,
    },
    Won,
    GameOver,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::GameOver)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    InProgress,
    Won,
    GameOver,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    #[serde(rename = "desiredDir")]
    pub desired_dir: Direction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GhostView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub dir: Direction,
    pub color: GhostColor,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    CollectibleEaten {
        x: i32,
        y: i32,
    },
    LifeLost {
        #[serde(rename = "ghostId")]
        ghost_id: String,
        #[serde(rename = "livesLeft")]
        lives_left: u32,
    },
    Respawned,
    Won {
        score: u32,
    },
    GameOver {
        score: u32,
    },
    LevelStarted {
        level: u32,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub level: u32,
    pub tiles: Vec<String>,
    pub player: PlayerView,
    pub ghosts: Vec<GhostView>,
    pub score: u32,
    pub lives: u32,
    #[serde(rename = "remainingCollectibles")]
    pub remaining_collectibles: u32,
    pub status: GameStatus,
    #[serde(rename = "hasWon")]
    pub has_won: bool,
    #[serde(rename = "isGameOver")]
    pub is_game_over: bool,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub outcome: GameOutcome,
    pub score: u32,
    pub lives: u32,
    pub level: u32,
    pub ticks: u64,
    #[serde(rename = "remainingCollectibles")]
    pub remaining_collectibles: u32,
}
