//! A* over the maze grid.
//!
//! 4-connected, unit step cost, Manhattan heuristic. Ties on `f` go to the
//! node that entered the open set first, and a node whose cost improves
//! keeps its original place in that order.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::types::GridCoord;
use crate::world::Grid;

const STEPS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Per-search bookkeeping for a discovered cell.
#[derive(Clone, Copy, Debug)]
struct PathNode {
    g: i32,
    h: i32,
    parent: Option<GridCoord>,
    /// Position in first-insertion order, used as the tie-break.
    seq: u64,
}

impl PathNode {
    fn f(&self) -> i32 {
        self.g + self.h
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct OpenEntry {
    f: i32,
    seq: u64,
    coord: GridCoord,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest route from `start` to `goal`, both ends included.
/// Empty when the goal is a wall, out of bounds, or unreachable.
pub fn find_path(grid: &Grid, start: GridCoord, goal: GridCoord) -> Vec<GridCoord> {
    find_path_filtered(grid, start, goal, |_| true)
}

/// Like [`find_path`], but neighbors rejected by `passable` are never entered.
pub fn find_path_filtered<F>(grid: &Grid, start: GridCoord, goal: GridCoord, passable: F) -> Vec<GridCoord>
where
    F: Fn(GridCoord) -> bool,
{
    if !grid.in_bounds(start) || !grid.is_walkable(goal) {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let mut nodes: HashMap<GridCoord, PathNode> = HashMap::new();
    let mut closed: HashSet<GridCoord> = HashSet::new();
    let mut open = BinaryHeap::new();
    let mut next_seq = 0_u64;

    let start_node = PathNode {
        g: 0,
        h: start.manhattan(goal),
        parent: None,
        seq: next_seq,
    };
    next_seq += 1;
    nodes.insert(start, start_node);
    open.push(OpenEntry {
        f: start_node.f(),
        seq: start_node.seq,
        coord: start,
    });

    while let Some(entry) = open.pop() {
        // stale duplicates of an already-expanded node
        if !closed.insert(entry.coord) {
            continue;
        }
        if entry.coord == goal {
            return reconstruct_path(&nodes, goal);
        }
        let Some(current_g) = nodes.get(&entry.coord).map(|node| node.g) else {
            continue;
        };

        for (dx, dz) in STEPS {
            let neighbor = entry.coord.offset(dx, dz);
            if !grid.is_walkable(neighbor) || !passable(neighbor) || closed.contains(&neighbor) {
                continue;
            }
            let g = current_g + 1;
            match nodes.get_mut(&neighbor) {
                Some(existing) => {
                    if g < existing.g {
                        existing.g = g;
                        existing.parent = Some(entry.coord);
                        open.push(OpenEntry {
                            f: existing.f(),
                            seq: existing.seq,
                            coord: neighbor,
                        });
                    }
                }
                None => {
                    let node = PathNode {
                        g,
                        h: neighbor.manhattan(goal),
                        parent: Some(entry.coord),
                        seq: next_seq,
                    };
                    next_seq += 1;
                    nodes.insert(neighbor, node);
                    open.push(OpenEntry {
                        f: node.f(),
                        seq: node.seq,
                        coord: neighbor,
                    });
                }
            }
        }
    }

    Vec::new()
}

fn reconstruct_path(nodes: &HashMap<GridCoord, PathNode>, goal: GridCoord) -> Vec<GridCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(parent) = nodes.get(&current).and_then(|node| node.parent) {
        path.push(parent);
        current = parent;
    }
    path.reverse();
    path
}
