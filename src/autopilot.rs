use std::collections::{HashSet, VecDeque};

use glam::Vec2;

use crate::engine::{yaw_toward, GameEngine};
use crate::pathfinding::{find_path, find_path_filtered};
use crate::types::{AdversaryMode, GridCoord, PlayerIntent};
use crate::world::{grid_to_world, world_to_grid};

const REPLAN_INTERVAL_MS: u64 = 1_000;
const MIN_HIDE_MS: u64 = 3_000;
const WAYPOINT_REACHED: f32 = 0.5;
const RUN_STAMINA_FLOOR: f32 = 40.0;

/// Scripted player for headless runs: heads for the exit, runs while it has
/// stamina to spare and ducks into a bed when chased.
#[derive(Clone, Debug, Default)]
pub struct Autopilot {
    route: VecDeque<GridCoord>,
    next_plan_ms: u64,
    hide_until_ms: u64,
}

impl Autopilot {
    pub fn decide(&mut self, engine: &GameEngine) -> PlayerIntent {
        let player = engine.player();
        let now_ms = engine.elapsed_ms();
        let threatened = engine.adversary().mode == AdversaryMode::Chase;
        let idle = PlayerIntent {
            yaw: player.yaw,
            ..PlayerIntent::default()
        };

        if player.hidden {
            if now_ms < self.hide_until_ms || threatened {
                return idle;
            }
            self.next_plan_ms = 0;
            return PlayerIntent { interact: true, ..idle };
        }
        if threatened && player.can_hide {
            self.hide_until_ms = now_ms + MIN_HIDE_MS;
            return PlayerIntent { interact: true, ..idle };
        }

        if now_ms >= self.next_plan_ms || self.route.is_empty() {
            self.plan(engine);
            self.next_plan_ms = now_ms + REPLAN_INTERVAL_MS;
        }

        let cell_size = engine.config.cell_size;
        while let Some(&next) = self.route.front() {
            if grid_to_world(next, cell_size).distance(player.position) >= WAYPOINT_REACHED {
                break;
            }
            self.route.pop_front();
        }
        let target = self
            .route
            .front()
            .map(|&next| grid_to_world(next, cell_size))
            .unwrap_or_else(|| engine.exit_position());
        let offset = target - player.position;
        if offset.length_squared() < 1e-6 {
            return idle;
        }

        PlayerIntent {
            forward: true,
            run: threatened || player.stamina > RUN_STAMINA_FLOOR,
            yaw: yaw_toward(offset),
            ..PlayerIntent::default()
        }
    }

    pub fn route_len(&self) -> usize {
        self.route.len()
    }

    fn plan(&mut self, engine: &GameEngine) {
        let cell_size = engine.config.cell_size;
        let grid = engine.grid();
        let from = world_to_grid(engine.player().position, cell_size);
        let goal = grid.exit();

        let blocked: HashSet<GridCoord> = engine
            .furniture()
            .iter()
            .flat_map(|item| {
                let half = item.half_extents();
                [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)].map(|(sx, sz)| {
                    let corner = item.position + Vec2::new(sx * half.x, sz * half.y);
                    world_to_grid(corner, cell_size)
                })
            })
            .collect();

        let mut path = find_path_filtered(grid, from, goal, |coord| {
            coord == from || coord == goal || !blocked.contains(&coord)
        });
        if path.is_empty() {
            path = find_path(grid, from, goal);
        }
        self.route = path.into();
    }
}
