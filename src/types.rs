use std::fmt;

use glam::Vec2;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridCoord {
    pub x: i32,
    pub z: i32,
}

impl GridCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn manhattan(self, other: GridCoord) -> i32 {
        (self.x - other.x).abs() + (self.z - other.z).abs()
    }

    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.z)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Empty,
    Wall,
    Start,
    Exit,
}

impl Cell {
    pub fn is_walkable(self) -> bool {
        self != Cell::Wall
    }

    pub fn glyph(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Wall => '#',
            Cell::Start => 'S',
            Cell::Exit => 'E',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Cell::Empty),
            '#' => Some(Cell::Wall),
            'S' => Some(Cell::Start),
            'E' => Some(Cell::Exit),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Room {
    pub x: i32,
    pub z: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseCategory {
    Run,
    Throw,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NoiseEvent {
    pub position: Vec2,
    pub category: NoiseCategory,
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdversaryMode {
    Wander,
    Chase,
    Investigate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Playing,
    Caught,
    GameOver,
    Victory,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::GameOver | SessionPhase::Victory)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FurnitureKind {
    Bed,
    Table,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session_{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRequestKind {
    Taunt,
    GameOverLine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextRequest {
    pub session_id: SessionId,
    pub kind: TextRequestKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextResponse {
    pub session_id: SessionId,
    pub kind: TextRequestKind,
    pub text: String,
}

/// Held movement state plus one-shot `interact` / `throw` edges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerIntent {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub run: bool,
    pub interact: bool,
    pub throw: bool,
    pub yaw: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: f32,
    pub z: f32,
    pub yaw: f32,
    pub stamina: f32,
    #[serde(rename = "staminaMax")]
    pub stamina_max: f32,
    pub running: bool,
    pub hidden: bool,
    #[serde(rename = "canHide")]
    pub can_hide: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdversaryView {
    pub x: f32,
    pub z: f32,
    pub facing: f32,
    pub mode: AdversaryMode,
    #[serde(rename = "pathLen")]
    pub path_len: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ThrowableView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct FurnitureView {
    pub kind: FurnitureKind,
    pub x: f32,
    pub z: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct LevelInit {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    pub seed: u32,
    pub width: i32,
    pub height: i32,
    #[serde(rename = "cellSize")]
    pub cell_size: f32,
    pub tiles: Vec<String>,
    pub start: GridCoord,
    pub exit: GridCoord,
    pub rooms: Vec<Room>,
    pub furniture: Vec<FurnitureView>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    NoiseEmitted {
        category: NoiseCategory,
        x: f32,
        z: f32,
    },
    HideChanged {
        hidden: bool,
    },
    ThrowLaunched {
        id: u64,
    },
    ThrowLanded {
        id: u64,
        x: f32,
        z: f32,
    },
    ModeChanged {
        from: AdversaryMode,
        to: AdversaryMode,
    },
    Taunt {
        text: String,
    },
    Caught,
    GameOver,
    GameOverLine {
        text: String,
    },
    Victory,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    pub phase: SessionPhase,
    pub player: PlayerView,
    pub adversary: AdversaryView,
    pub noise: Option<NoiseEvent>,
    pub throwables: Vec<ThrowableView>,
    pub taunt: Option<String>,
    #[serde(rename = "gameOverLine")]
    pub game_over_line: Option<String>,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionStats {
    #[serde(rename = "runNoises")]
    pub run_noises: u32,
    pub throws: u32,
    pub hides: u32,
    #[serde(rename = "chaseEntries")]
    pub chase_entries: u32,
    #[serde(rename = "investigateEntries")]
    pub investigate_entries: u32,
    #[serde(rename = "tauntsRequested")]
    pub taunts_requested: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
    pub seed: u32,
    pub phase: SessionPhase,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub stats: SessionStats,
    #[serde(rename = "gameOverLine")]
    pub game_over_line: Option<String>,
}
