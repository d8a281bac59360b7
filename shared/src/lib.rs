use serde::{Deserialize, Serialize};

/// A single square of the arena grid.
///
/// `Unknown` never appears in ground truth; it only stands in for cells
/// outside a player's point of view in projected snapshots. The wire strings
/// are the single-character glyphs the client renders directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    #[serde(rename = "#")]
    Wall,
    #[serde(rename = "_")]
    Floor,
    #[serde(rename = "?")]
    Unknown,
}

/// Facing of a player, ordered clockwise so that turning is index
/// arithmetic mod 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

const CLOCKWISE: [Direction; 4] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
];

impl Direction {
    /// All four directions in clockwise order.
    pub fn all() -> [Direction; 4] {
        CLOCKWISE
    }

    fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn turned_right(self) -> Direction {
        CLOCKWISE[(self.index() + 1) % 4]
    }

    pub fn turned_left(self) -> Direction {
        CLOCKWISE[(self.index() + 3) % 4]
    }

    /// One-step (row, col) offset of a move in this direction.
    /// Row 0 is the northern edge, so north decreases the row.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, 1),
            Direction::South => (1, 0),
            Direction::West => (0, -1),
        }
    }
}

/// A player's intent for one game step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    Attack,
}

/// Inbound frame on a play connection: `{"command": "move-forward"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub command: Command,
}

/// Parameters for one game, supplied once at start and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    pub wall_roots: usize,
    pub wall_building_prob: f64,
    pub pov_radius: u32,
}

impl GameConfig {
    /// Basic sanity of the parameters: a degenerate grid or a wall
    /// probability at or above 1.0 (which would make wall walks endless)
    /// is rejected before it ever reaches the game.
    pub fn is_valid(&self) -> bool {
        self.rows > 0 && self.cols > 0 && (0.0..1.0).contains(&self.wall_building_prob)
    }
}

/// Inbound frame on the control connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlRequest {
    Start(GameConfig),
    Stop,
}

/// The grid as one player sees it: cells outside the point of view are
/// replaced by `Cell::Unknown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridView {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
}

/// Public record of one player as carried in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub position: usize,
    pub direction: Direction,
    pub score: u32,
    pub name: String,
    pub color: String,
}

/// One per-player state snapshot, sent after every state-changing event.
/// `enemies` holds only the other players currently inside the receiving
/// player's point of view, ordered by session id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub grid: GridView,
    pub player: PlayerView,
    pub enemies: Vec<PlayerView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_right_full_cycle() {
        for start in Direction::all() {
            let mut dir = start;
            for _ in 0..4 {
                dir = dir.turned_right();
            }
            assert_eq!(dir, start);
        }
    }

    #[test]
    fn test_turn_left_inverts_turn_right() {
        for start in Direction::all() {
            assert_eq!(start.turned_right().turned_left(), start);
            assert_eq!(start.turned_left().turned_right(), start);
        }
    }

    #[test]
    fn test_turn_right_is_clockwise() {
        assert_eq!(Direction::North.turned_right(), Direction::East);
        assert_eq!(Direction::East.turned_right(), Direction::South);
        assert_eq!(Direction::South.turned_right(), Direction::West);
        assert_eq!(Direction::West.turned_right(), Direction::North);
    }

    #[test]
    fn test_direction_deltas() {
        assert_eq!(Direction::North.delta(), (-1, 0));
        assert_eq!(Direction::South.delta(), (1, 0));
        assert_eq!(Direction::East.delta(), (0, 1));
        assert_eq!(Direction::West.delta(), (0, -1));
    }

    #[test]
    fn test_cell_wire_names() {
        assert_eq!(serde_json::to_string(&Cell::Wall).unwrap(), "\"#\"");
        assert_eq!(serde_json::to_string(&Cell::Floor).unwrap(), "\"_\"");
        assert_eq!(serde_json::to_string(&Cell::Unknown).unwrap(), "\"?\"");
    }

    #[test]
    fn test_direction_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::North).unwrap(), "\"north\"");
        assert_eq!(serde_json::to_string(&Direction::West).unwrap(), "\"west\"");
        let parsed: Direction = serde_json::from_str("\"south\"").unwrap();
        assert_eq!(parsed, Direction::South);
    }

    #[test]
    fn test_command_wire_names() {
        assert_eq!(
            serde_json::to_string(&Command::MoveForward).unwrap(),
            "\"move-forward\""
        );
        assert_eq!(
            serde_json::to_string(&Command::TurnLeft).unwrap(),
            "\"turn-left\""
        );
        let msg: ActionMessage = serde_json::from_str("{\"command\":\"attack\"}").unwrap();
        assert_eq!(msg.command, Command::Attack);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let parsed: Result<ActionMessage, _> =
            serde_json::from_str("{\"command\":\"self-destruct\"}");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_config_wire_names() {
        let json = "{\"rows\":10,\"cols\":12,\"wall-roots\":3,\
                    \"wall-building-prob\":0.8,\"pov-radius\":4}";
        let config: GameConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.rows, 10);
        assert_eq!(config.cols, 12);
        assert_eq!(config.wall_roots, 3);
        assert_eq!(config.wall_building_prob, 0.8);
        assert_eq!(config.pov_radius, 4);
        assert!(config.is_valid());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GameConfig {
            rows: 5,
            cols: 5,
            wall_roots: 0,
            wall_building_prob: 0.5,
            pov_radius: 2,
        };
        assert!(config.is_valid());

        config.rows = 0;
        assert!(!config.is_valid());

        config.rows = 5;
        config.wall_building_prob = 1.0;
        assert!(!config.is_valid());
    }

    #[test]
    fn test_control_request_wire_format() {
        let stop = serde_json::to_string(&ControlRequest::Stop).unwrap();
        assert_eq!(stop, "\"stop\"");

        let start = ControlRequest::Start(GameConfig {
            rows: 5,
            cols: 5,
            wall_roots: 0,
            wall_building_prob: 0.0,
            pov_radius: 10,
        });
        let json = serde_json::to_string(&start).unwrap();
        assert!(json.starts_with("{\"start\":"));
        let parsed: ControlRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, start);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = StateSnapshot {
            grid: GridView {
                rows: 2,
                cols: 2,
                cells: vec![Cell::Wall, Cell::Wall, Cell::Floor, Cell::Unknown],
            },
            player: PlayerView {
                position: 2,
                direction: Direction::East,
                score: 3,
                name: "ada".to_string(),
                color: "teal".to_string(),
            },
            enemies: vec![],
        };

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: StateSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }
}
