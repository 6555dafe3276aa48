use std::collections::{HashSet, VecDeque};

use glam::Vec2;
use rand::Rng;
use tracing::{debug, warn};

use crate::constants::{normalize_maze_dimension, ROOM_MAX_SIDE, ROOM_MIN_SIDE};
use crate::error::{PursuitError, Result};
use crate::types::{Cell, GridCoord, Room};

const NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Immutable cell grid. Anything outside the bounds reads as wall.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    width: i32,
    height: i32,
    cells: Vec<Cell>,
    start: GridCoord,
    exit: GridCoord,
}

#[derive(Clone, Debug)]
pub struct GeneratedLevel {
    pub grid: Grid,
    pub rooms: Vec<Room>,
}

impl Grid {
    /// Parses `#` / `.` / `S` / `E` rows. Without an `S` the first open cell is
    /// the start; without an `E` the last open cell is the exit.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(PursuitError::InvalidLayout("layout has no rows".to_string()));
        };
        let width = first.as_ref().chars().count();
        if width == 0 {
            return Err(PursuitError::InvalidLayout("layout has empty rows".to_string()));
        }

        let mut cells = Vec::with_capacity(width * rows.len());
        let mut start = None;
        let mut exit = None;
        for (z, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let row_width = row.chars().count();
            if row_width != width {
                return Err(PursuitError::InvalidLayout(format!(
                    "row {z} has {row_width} cells, expected {width}"
                )));
            }
            for (x, glyph) in row.chars().enumerate() {
                let cell = Cell::from_glyph(glyph).ok_or_else(|| {
                    PursuitError::InvalidLayout(format!("unknown glyph '{glyph}' at ({x},{z})"))
                })?;
                let coord = GridCoord::new(x as i32, z as i32);
                let duplicate = match cell {
                    Cell::Start => start.replace(coord).is_some(),
                    Cell::Exit => exit.replace(coord).is_some(),
                    _ => false,
                };
                if duplicate {
                    return Err(PursuitError::InvalidLayout(format!(
                        "duplicate {cell:?} cell at {coord}"
                    )));
                }
                cells.push(cell);
            }
        }

        let width = width as i32;
        let height = rows.len() as i32;
        let coord_of = |index: usize| GridCoord::new(index as i32 % width, index as i32 / width);
        let first_open = cells.iter().position(|cell| cell.is_walkable());
        let last_open = cells.iter().rposition(|cell| cell.is_walkable());
        let (Some(first_open), Some(last_open)) = (first_open, last_open) else {
            return Err(PursuitError::InvalidLayout("layout has no walkable cell".to_string()));
        };

        Ok(Self {
            width,
            height,
            start: start.unwrap_or_else(|| coord_of(first_open)),
            exit: exit.unwrap_or_else(|| coord_of(last_open)),
            cells,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn start(&self) -> GridCoord {
        self.start
    }

    pub fn exit(&self) -> GridCoord {
        self.exit
    }

    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.x >= 0 && coord.z >= 0 && coord.x < self.width && coord.z < self.height
    }

    pub fn cell(&self, coord: GridCoord) -> Option<Cell> {
        if !self.in_bounds(coord) {
            return None;
        }
        self.cells.get((coord.z * self.width + coord.x) as usize).copied()
    }

    pub fn is_walkable(&self, coord: GridCoord) -> bool {
        self.cell(coord).is_some_and(Cell::is_walkable)
    }

    pub fn walkable_neighbors(&self, coord: GridCoord) -> impl Iterator<Item = GridCoord> + '_ {
        NEIGHBORS
            .into_iter()
            .map(move |(dx, dz)| coord.offset(dx, dz))
            .filter(|next| self.is_walkable(*next))
    }

    pub fn walkable_cells(&self) -> impl Iterator<Item = GridCoord> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_walkable())
            .map(move |(index, _)| GridCoord::new(index as i32 % width, index as i32 / width))
    }

    pub fn tiles(&self) -> Vec<String> {
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|cell| cell.glyph()).collect())
            .collect()
    }

    pub fn reachable_from(&self, origin: GridCoord) -> HashSet<GridCoord> {
        let mut reachable = HashSet::new();
        if !self.is_walkable(origin) {
            return reachable;
        }
        let mut queue = VecDeque::new();
        reachable.insert(origin);
        queue.push_back(origin);
        while let Some(current) = queue.pop_front() {
            for next in self.walkable_neighbors(current) {
                if reachable.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        reachable
    }
}

pub fn grid_to_world(coord: GridCoord, cell_size: f32) -> Vec2 {
    Vec2::new(coord.x as f32 * cell_size, coord.z as f32 * cell_size)
}

pub fn world_to_grid(position: Vec2, cell_size: f32) -> GridCoord {
    GridCoord::new(
        (position.x / cell_size).round() as i32,
        (position.y / cell_size).round() as i32,
    )
}

/// Backtracker maze over the odd lattice from (1,1), overlaid with rooms.
/// Dimensions are normalized to odd values of at least 5.
pub fn generate_level<R: Rng + ?Sized>(width: i32, height: i32, rng: &mut R) -> GeneratedLevel {
    let width = normalize_maze_dimension(width);
    let height = normalize_maze_dimension(height);
    let mut cells = vec![Cell::Wall; (width * height) as usize];

    carve_passages(&mut cells, width, height, rng);
    let rooms = carve_rooms(&mut cells, width, height, rng);

    let start = GridCoord::new(1, 1);
    let sealed = seal_unreachable(&mut cells, width, height, start);
    if sealed > 0 {
        warn!(sealed, "sealed carved cells unreachable from start");
    }
    cells[index_of(width, start)] = Cell::Start;

    let exit = find_exit_cell(&cells, width, height).unwrap_or(GridCoord::new(width - 2, height - 2));
    cells[index_of(width, exit)] = Cell::Exit;

    debug!(width, height, rooms = rooms.len(), %exit, "generated maze");
    GeneratedLevel {
        grid: Grid {
            width,
            height,
            cells,
            start,
            exit,
        },
        rooms,
    }
}

fn index_of(width: i32, coord: GridCoord) -> usize {
    (coord.z * width + coord.x) as usize
}

fn is_interior(width: i32, height: i32, coord: GridCoord) -> bool {
    coord.x > 0 && coord.z > 0 && coord.x < width - 1 && coord.z < height - 1
}

fn carve_passages<R: Rng + ?Sized>(cells: &mut [Cell], width: i32, height: i32, rng: &mut R) {
    let origin = GridCoord::new(1, 1);
    cells[index_of(width, origin)] = Cell::Empty;
    let mut stack = vec![origin];
    let mut candidates: Vec<(GridCoord, GridCoord)> = Vec::with_capacity(4);

    while let Some(&current) = stack.last() {
        candidates.clear();
        for (dx, dz) in NEIGHBORS {
            let next = current.offset(dx * 2, dz * 2);
            if is_interior(width, height, next) && cells[index_of(width, next)] == Cell::Wall {
                candidates.push((next, current.offset(dx, dz)));
            }
        }
        if candidates.is_empty() {
            stack.pop();
            continue;
        }
        let (next, between) = candidates[rng.random_range(0..candidates.len())];
        cells[index_of(width, between)] = Cell::Empty;
        cells[index_of(width, next)] = Cell::Empty;
        stack.push(next);
    }
}

/// A room that exactly fits the interior sits against the top-left border.
fn room_offset<R: Rng + ?Sized>(span: i32, rng: &mut R) -> i32 {
    if span == 0 {
        1
    } else {
        rng.random_range(0..span) + 1
    }
}

fn carve_rooms<R: Rng + ?Sized>(cells: &mut [Cell], width: i32, height: i32, rng: &mut R) -> Vec<Room> {
    let count = width / 4;
    let mut rooms = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let w = rng.random_range(ROOM_MIN_SIDE..=ROOM_MAX_SIDE);
        let h = rng.random_range(ROOM_MIN_SIDE..=ROOM_MAX_SIDE);
        let span_x = width - w - 2;
        let span_z = height - h - 2;
        if span_x < 0 || span_z < 0 {
            continue;
        }
        let x = room_offset(span_x, rng);
        let z = room_offset(span_z, rng);
        for rz in z..z + h {
            for rx in x..x + w {
                let coord = GridCoord::new(rx, rz);
                if is_interior(width, height, coord) {
                    cells[index_of(width, coord)] = Cell::Empty;
                }
            }
        }
        rooms.push(Room { x, z, w, h });
    }
    rooms
}

/// Re-walls open cells that cannot be reached from `start`. Returns how many.
fn seal_unreachable(cells: &mut [Cell], width: i32, height: i32, start: GridCoord) -> usize {
    let mut reached = vec![false; cells.len()];
    let mut queue = VecDeque::new();
    reached[index_of(width, start)] = true;
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for (dx, dz) in NEIGHBORS {
            let next = current.offset(dx, dz);
            if !is_interior(width, height, next) {
                continue;
            }
            let index = index_of(width, next);
            if !reached[index] && cells[index] != Cell::Wall {
                reached[index] = true;
                queue.push_back(next);
            }
        }
    }

    let mut sealed = 0;
    for (index, cell) in cells.iter_mut().enumerate() {
        if *cell != Cell::Wall && !reached[index] {
            *cell = Cell::Wall;
            sealed += 1;
        }
    }
    sealed
}

fn find_exit_cell(cells: &[Cell], width: i32, height: i32) -> Option<GridCoord> {
    for z in (1..height - 1).rev() {
        for x in (1..width - 1).rev() {
            let coord = GridCoord::new(x, z);
            if cells[index_of(width, coord)] == Cell::Empty {
                return Some(coord);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::rng::SeededRng;

    fn generate(size: i32, seed: u32) -> GeneratedLevel {
        let mut rng = SeededRng::new(seed);
        generate_level(size, size, &mut rng)
    }

    fn assert_border_is_wall(grid: &Grid) {
        for x in 0..grid.width() {
            assert_eq!(grid.cell(GridCoord::new(x, 0)), Some(Cell::Wall));
            assert_eq!(grid.cell(GridCoord::new(x, grid.height() - 1)), Some(Cell::Wall));
        }
        for z in 0..grid.height() {
            assert_eq!(grid.cell(GridCoord::new(0, z)), Some(Cell::Wall));
            assert_eq!(grid.cell(GridCoord::new(grid.width() - 1, z)), Some(Cell::Wall));
        }
    }

    #[test]
    fn default_maze_has_wall_border_start_and_exit() {
        let level = generate(21, 12_345);
        let grid = &level.grid;
        assert_eq!(grid.width(), 21);
        assert_eq!(grid.height(), 21);
        assert_border_is_wall(grid);
        assert_eq!(grid.start(), GridCoord::new(1, 1));
        assert_eq!(grid.cell(grid.start()), Some(Cell::Start));
        assert_eq!(grid.cell(grid.exit()), Some(Cell::Exit));
        assert_ne!(grid.start(), grid.exit());
    }

    #[test]
    fn every_open_cell_is_reachable_from_start() {
        for seed in 0..200_u32 {
            let level = generate(21, seed);
            let grid = &level.grid;
            let reachable = grid.reachable_from(grid.start());
            for cell in grid.walkable_cells() {
                assert!(
                    reachable.contains(&cell),
                    "cell is unreachable: seed={seed}, pos={cell}"
                );
            }
            assert!(
                reachable.contains(&grid.exit()),
                "exit is unreachable: seed={seed}"
            );
        }
    }

    #[test]
    fn exit_sits_in_bottom_right_corner_when_carved() {
        for seed in 0..50_u32 {
            let level = generate(21, seed);
            assert_eq!(level.grid.exit(), GridCoord::new(19, 19), "seed={seed}");
        }
    }

    #[test]
    fn even_dimensions_are_normalized_to_odd() {
        let mut rng = SeededRng::new(5);
        let level = generate_level(20, 14, &mut rng);
        assert_eq!(level.grid.width(), 21);
        assert_eq!(level.grid.height(), 15);
    }

    #[test]
    fn rooms_stay_inside_the_border() {
        for seed in 0..100_u32 {
            let level = generate(21, seed);
            assert!(level.rooms.len() <= 5);
            for room in &level.rooms {
                assert!((ROOM_MIN_SIDE..=ROOM_MAX_SIDE).contains(&room.w));
                assert!((ROOM_MIN_SIDE..=ROOM_MAX_SIDE).contains(&room.h));
                assert!(room.x >= 1 && room.z >= 1);
                assert!(room.x + room.w < level.grid.width() - 1);
                assert!(room.z + room.h < level.grid.height() - 1);
            }
        }
    }

    #[test]
    fn smallest_maze_still_gets_a_fitting_room() {
        let mut placed = 0;
        for seed in 0..100_u32 {
            let level = generate(5, seed);
            for room in &level.rooms {
                assert_eq!((room.x, room.z), (1, 1), "seed={seed}");
                assert_eq!((room.w, room.h), (3, 3), "seed={seed}");
                for z in 1..4 {
                    for x in 1..4 {
                        assert!(level.grid.is_walkable(GridCoord::new(x, z)), "seed={seed}");
                    }
                }
                placed += 1;
            }
            assert_border_is_wall(&level.grid);
        }
        assert!(placed > 0);
    }

    #[test]
    fn same_seed_produces_same_tiles() {
        let a = generate(31, 77);
        let b = generate(31, 77);
        assert_eq!(a.grid.tiles(), b.grid.tiles());
        assert_eq!(a.rooms, b.rooms);
    }

    #[test]
    fn out_of_bounds_reads_as_wall() {
        let level = generate(21, 1);
        assert!(!level.grid.is_walkable(GridCoord::new(-1, 3)));
        assert!(!level.grid.is_walkable(GridCoord::new(3, 21)));
        assert_eq!(level.grid.cell(GridCoord::new(21, 0)), None);
    }

    #[test]
    fn from_rows_parses_markers() {
        let grid = Grid::from_rows(&["#####", "#S..#", "#.#.#", "#..E#", "#####"])
            .expect("layout should parse");
        assert_eq!(grid.start(), GridCoord::new(1, 1));
        assert_eq!(grid.exit(), GridCoord::new(3, 3));
        assert!(!grid.is_walkable(GridCoord::new(2, 2)));
        assert_eq!(grid.tiles()[1], "#S..#");
    }

    #[test]
    fn from_rows_defaults_start_and_exit_to_open_extremes() {
        let grid = Grid::from_rows(&["...", "...", "..."]).expect("layout should parse");
        assert_eq!(grid.start(), GridCoord::new(0, 0));
        assert_eq!(grid.exit(), GridCoord::new(2, 2));
    }

    #[test]
    fn from_rows_rejects_bad_layouts() {
        assert!(matches!(
            Grid::from_rows(&["###", "##"]),
            Err(PursuitError::InvalidLayout(_))
        ));
        assert!(Grid::from_rows(&["#?#"]).is_err());
        assert!(Grid::from_rows(&["###"]).is_err());
        assert!(Grid::from_rows(&["S.S"]).is_err());
        assert!(Grid::from_rows::<&str>(&[]).is_err());
    }

    #[test]
    fn world_and_grid_conversions_round_to_nearest_cell() {
        assert_eq!(grid_to_world(GridCoord::new(2, 3), 4.0), Vec2::new(8.0, 12.0));
        assert_eq!(world_to_grid(Vec2::new(9.9, 13.9), 4.0), GridCoord::new(2, 3));
        assert_eq!(world_to_grid(Vec2::new(10.1, 14.1), 4.0), GridCoord::new(3, 4));
    }

    proptest! {
        #[test]
        fn generated_levels_are_connected(seed in any::<u32>(), size in 5i32..41) {
            let mut rng = SeededRng::new(seed);
            let level = generate_level(size, size, &mut rng);
            let grid = &level.grid;
            prop_assert_eq!(grid.width() % 2, 1);
            assert_border_is_wall(grid);
            let reachable = grid.reachable_from(grid.start());
            prop_assert_eq!(reachable.len(), grid.walkable_cells().count());
            prop_assert!(reachable.contains(&grid.exit()));
        }
    }
}
