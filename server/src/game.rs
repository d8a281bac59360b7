//! Authoritative game rules: grid generation, action legality and
//! point-of-view projection.
//!
//! `GameState` is pure state plus algorithms. It performs no I/O and is only
//! ever touched from the hub's single event loop, so it needs no locking.
//! Illegal or stale actions are absorbed as silent no-ops; the only caller
//! feedback is the next broadcast snapshot.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Cell, Command, Direction, GameConfig, GridView, PlayerView, StateSnapshot};
use std::collections::HashMap;

/// Server-side record of one live player.
///
/// Position and direction are meaningless until the first game start places
/// the player on a floor cell.
#[derive(Debug, Clone)]
pub struct Player {
    pub position: usize,
    pub direction: Direction,
    pub score: u32,
    pub name: String,
    pub color: String,
}

impl Player {
    pub fn new(name: String, color: String) -> Self {
        Self {
            position: 0,
            direction: Direction::North,
            score: 0,
            name,
            color,
        }
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            position: self.position,
            direction: self.direction,
            score: self.score,
            name: self.name.clone(),
            color: self.color.clone(),
        }
    }
}

/// The game board and roster-backed rule engine.
///
/// The grid is immutable for the lifetime of one game: `configure` rebuilds
/// it from scratch and `clear` drops it when the game stops. Players are
/// keyed by the session id the hub assigned at registration.
pub struct GameState {
    cells: Vec<Cell>,
    rows: usize,
    cols: usize,
    wall_roots: usize,
    wall_building_prob: f64,
    pov_radius: u32,
    players: HashMap<u32, Player>,
    rng: StdRng,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible game state for tests: grid generation and player
    /// placement draw from the seeded generator in a fixed order.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            cells: Vec::new(),
            rows: 0,
            cols: 0,
            wall_roots: 0,
            wall_building_prob: 0.0,
            pov_radius: 0,
            players: HashMap::new(),
            rng,
        }
    }

    pub fn add_player(&mut self, id: u32, player: Player) {
        info!("game: added player {} ({})", id, player.name);
        self.players.insert(id, player);
    }

    pub fn remove_player(&mut self, id: u32) {
        if self.players.remove(&id).is_some() {
            info!("game: removed player {}", id);
        }
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Rebuilds the grid from `config` and (re)places every roster player.
    ///
    /// Precondition: the generated grid must leave at least as many floor
    /// cells as there are players, otherwise placement loops forever. The
    /// transport layer validates configs before they reach this point.
    pub fn configure(&mut self, config: &GameConfig) {
        info!(
            "game: configuring {}x{} grid, {} wall roots, wall prob {}, pov radius {}",
            config.rows, config.cols, config.wall_roots, config.wall_building_prob,
            config.pov_radius
        );
        self.rows = config.rows;
        self.cols = config.cols;
        self.wall_roots = config.wall_roots;
        self.wall_building_prob = config.wall_building_prob;
        self.pov_radius = config.pov_radius;

        self.initialize_cells();
        self.initialize_players();
    }

    /// Drops the grid when a game stops. Player removal is driven by the
    /// hub, which owns the roster.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.rows = 0;
        self.cols = 0;
    }

    fn initialize_cells(&mut self) {
        let size = self.rows * self.cols;
        let mut cells = vec![Cell::Floor; size];

        // Wall off the outer border.
        for (i, cell) in cells.iter_mut().enumerate() {
            let row = i / self.cols;
            let col = i % self.cols;
            if row == 0 || row == self.rows - 1 || col == 0 || col == self.cols - 1 {
                *cell = Cell::Wall;
            }
        }

        // Grow a wall tendril from each root: random walk, one wall per
        // step, stopping on the first out-of-bounds step or failed draw.
        for _ in 0..self.wall_roots {
            let mut row = self.rng.gen_range(0..self.rows) as i64;
            let mut col = self.rng.gen_range(0..self.cols) as i64;

            loop {
                let index = row as usize * self.cols + col as usize;
                cells[index] = Cell::Wall;
                row += self.rng.gen_range(-1..=1);
                col += self.rng.gen_range(-1..=1);

                if !self.in_bounds(row, col) {
                    break;
                }
                if self.rng.gen::<f64>() > self.wall_building_prob {
                    break;
                }
            }
        }

        self.cells = cells;
    }

    fn initialize_players(&mut self) {
        // Stable placement order keeps seeded games reproducible.
        let mut ids: Vec<u32> = self.players.keys().copied().collect();
        ids.sort_unstable();

        let mut occupied: Vec<usize> = Vec::new();
        for id in ids {
            let position = loop {
                let probe = self.random_floor_index();
                if !occupied.contains(&probe) {
                    break probe;
                }
                debug!("game: position {} already claimed, redrawing", probe);
            };
            occupied.push(position);

            let direction = Direction::all()[self.rng.gen_range(0..4)];
            if let Some(player) = self.players.get_mut(&id) {
                player.position = position;
                player.direction = direction;
                player.score = 0;
                info!(
                    "game: player {} starts at {} facing {:?}",
                    id, position, direction
                );
            }
        }
    }

    fn random_floor_index(&mut self) -> usize {
        loop {
            let probe = self.rng.gen_range(0..self.cells.len());
            if self.cells[probe] == Cell::Floor {
                return probe;
            }
        }
    }

    /// Applies one command for the given player. Unknown players and
    /// illegal targets are silent no-ops.
    pub fn evaluate(&mut self, id: u32, command: Command) {
        if !self.players.contains_key(&id) {
            return;
        }
        match command {
            Command::Attack => self.handle_attack(id),
            Command::MoveForward => self.handle_move(id, false),
            Command::MoveBackward => self.handle_move(id, true),
            Command::TurnLeft => self.handle_turn(id, Direction::turned_left),
            Command::TurnRight => self.handle_turn(id, Direction::turned_right),
        }
    }

    fn handle_turn(&mut self, id: u32, turn: fn(Direction) -> Direction) {
        if let Some(player) = self.players.get_mut(&id) {
            player.direction = turn(player.direction);
        }
    }

    fn handle_move(&mut self, id: u32, backward: bool) {
        let (position, direction) = match self.players.get(&id) {
            Some(player) => (player.position, player.direction),
            None => return,
        };

        let (mut row_step, mut col_step) = direction.delta();
        if backward {
            row_step = -row_step;
            col_step = -col_step;
        }

        let row = (position / self.cols) as i64 + row_step;
        let col = (position % self.cols) as i64 + col_step;
        if !self.in_bounds(row, col) {
            return;
        }

        let destination = row as usize * self.cols + col as usize;
        if self.cells[destination] != Cell::Floor {
            return;
        }
        if self.players.values().any(|p| p.position == destination) {
            return;
        }

        if let Some(player) = self.players.get_mut(&id) {
            player.position = destination;
        }
    }

    fn handle_attack(&mut self, id: u32) {
        let (position, direction) = match self.players.get(&id) {
            Some(player) => (player.position, player.direction),
            None => return,
        };

        let (row_step, col_step) = direction.delta();
        let row = (position / self.cols) as i64 + row_step;
        let col = (position % self.cols) as i64 + col_step;
        if !self.in_bounds(row, col) {
            return;
        }

        let target = row as usize * self.cols + col as usize;
        if self.cells[target] == Cell::Wall {
            return;
        }

        // One increment per occupant of the target cell. The scan ranges
        // over all live players without excluding the attacker: the target
        // is adjacent to the attacker's own cell, so a self-hit cannot
        // occur, and move legality forbids stacking more than one occupant.
        let hits = self
            .players
            .values()
            .filter(|p| p.position == target)
            .count() as u32;
        if hits > 0 {
            if let Some(player) = self.players.get_mut(&id) {
                player.score += hits;
            }
        }
    }

    /// The game as seen by `id`: cells and enemies outside the viewer's
    /// point of view are hidden. Returns `None` for unknown players.
    pub fn project(&self, id: u32) -> Option<StateSnapshot> {
        let viewer = self.players.get(&id)?;

        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if self.in_pov(viewer.position, i) {
                    *cell
                } else {
                    Cell::Unknown
                }
            })
            .collect();

        let mut enemy_ids: Vec<u32> = self
            .players
            .keys()
            .copied()
            .filter(|other| *other != id)
            .collect();
        enemy_ids.sort_unstable();

        let enemies = enemy_ids
            .into_iter()
            .filter_map(|enemy_id| self.players.get(&enemy_id))
            .filter(|enemy| self.in_pov(viewer.position, enemy.position))
            .map(Player::view)
            .collect();

        Some(StateSnapshot {
            grid: GridView {
                rows: self.rows,
                cols: self.cols,
                cells,
            },
            player: viewer.view(),
            enemies,
        })
    }

    fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && row < self.rows as i64 && col >= 0 && col < self.cols as i64
    }

    // Squared-distance comparison; no floating point involved.
    fn in_pov(&self, viewer_position: usize, position: usize) -> bool {
        let row_diff = (position / self.cols) as i64 - (viewer_position / self.cols) as i64;
        let col_diff = (position % self.cols) as i64 - (viewer_position % self.cols) as i64;
        let radius = self.pov_radius as i64;

        row_diff * row_diff + col_diff * col_diff <= radius * radius
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
