use glam::Vec2;

use crate::config::PlayerTuning;
use crate::furnishing::Furniture;
use crate::types::{PlayerIntent, PlayerView};
use crate::world::{world_to_grid, Grid};

use super::utils::{forward_from_yaw, right_from_yaw};

#[derive(Clone, Debug)]
pub struct PlayerState {
    pub position: Vec2,
    pub yaw: f32,
    pub stamina: f32,
    pub running: bool,
    pub hidden: bool,
    pub can_hide: bool,
    /// Seconds of sustained running since the last run noise.
    pub running_time: f32,
}

/// Static geometry the player collides with.
pub struct MotionContext<'a> {
    pub grid: &'a Grid,
    pub furniture: &'a [Furniture],
    pub tuning: &'a PlayerTuning,
    pub cell_size: f32,
    pub exit: Vec2,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerStepOutcome {
    pub run_noise: Option<Vec2>,
    pub throw_from: Option<Vec2>,
    pub hide_changed: Option<bool>,
    pub reached_exit: bool,
}

impl PlayerState {
    pub fn spawn(position: Vec2, tuning: &PlayerTuning) -> Self {
        Self {
            position,
            yaw: 0.0,
            stamina: tuning.stamina_max,
            running: false,
            hidden: false,
            can_hide: false,
            running_time: 0.0,
        }
    }

    pub fn update(&mut self, intent: &PlayerIntent, ctx: &MotionContext<'_>, dt_sec: f32) -> PlayerStepOutcome {
        let tuning = ctx.tuning;
        let mut outcome = PlayerStepOutcome::default();
        self.yaw = intent.yaw;
        self.can_hide = ctx
            .furniture
            .iter()
            .any(|item| item.is_hiding_spot() && item.position.distance(self.position) < tuning.hide_distance);

        if intent.interact {
            if self.hidden {
                self.hidden = false;
                outcome.hide_changed = Some(false);
            } else if self.can_hide {
                self.hidden = true;
                outcome.hide_changed = Some(true);
            }
        }

        if self.hidden {
            self.running = false;
            self.recover(tuning, dt_sec);
            return outcome;
        }

        if intent.throw {
            outcome.throw_from = Some(self.position);
        }

        let direction = movement_vector(intent);
        let moving = direction != Vec2::ZERO;
        self.running = intent.run && self.stamina > 0.0 && moving;
        let speed = if self.running {
            self.stamina = (self.stamina - tuning.stamina_drain_rate * dt_sec).max(0.0);
            self.running_time += dt_sec;
            if self.running_time >= tuning.run_noise_threshold_secs {
                outcome.run_noise = Some(self.position);
                self.running_time = 0.0;
            }
            tuning.run_speed
        } else {
            self.recover(tuning, dt_sec);
            tuning.walk_speed
        };

        if moving {
            let step = direction * speed * dt_sec;
            let next_x = Vec2::new(self.position.x + step.x, self.position.y);
            if !is_blocked(next_x, ctx) {
                self.position.x = next_x.x;
            }
            let next_z = Vec2::new(self.position.x, self.position.y + step.y);
            if !is_blocked(next_z, ctx) {
                self.position.y = next_z.y;
            }
        }

        outcome.reached_exit = self.position.distance(ctx.exit) < tuning.exit_radius;
        outcome
    }

    fn recover(&mut self, tuning: &PlayerTuning, dt_sec: f32) {
        self.stamina = (self.stamina + tuning.stamina_regen_rate * dt_sec).min(tuning.stamina_max);
        self.running_time = (self.running_time - dt_sec).max(0.0);
    }

    pub fn view(&self, stamina_max: f32) -> PlayerView {
        PlayerView {
            x: self.position.x,
            z: self.position.y,
            yaw: self.yaw,
            stamina: self.stamina,
            stamina_max,
            running: self.running,
            hidden: self.hidden,
            can_hide: self.can_hide,
        }
    }
}

/// Normalized world-space direction for the held keys, or zero.
pub fn movement_vector(intent: &PlayerIntent) -> Vec2 {
    let axis = |positive: bool, negative: bool| positive as i32 as f32 - negative as i32 as f32;
    let along = axis(intent.forward, intent.back);
    let across = axis(intent.right, intent.left);
    (forward_from_yaw(intent.yaw) * along + right_from_yaw(intent.yaw) * across).normalize_or_zero()
}

/// A point is blocked when any corner of its clearance square rounds into a
/// wall cell, or when it lies inside a furniture footprint.
pub fn is_blocked(point: Vec2, ctx: &MotionContext<'_>) -> bool {
    let c = ctx.tuning.clearance;
    let probes = [
        Vec2::new(point.x + c, point.y + c),
        Vec2::new(point.x - c, point.y + c),
        Vec2::new(point.x + c, point.y - c),
        Vec2::new(point.x - c, point.y - c),
    ];
    if probes
        .iter()
        .any(|probe| !ctx.grid.is_walkable(world_to_grid(*probe, ctx.cell_size)))
    {
        return true;
    }
    ctx.furniture.iter().any(|item| item.blocks(point))
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::types::FurnitureKind;

    const DT: f32 = 0.02;

    fn open_grid(size: usize) -> Grid {
        let mut rows = Vec::with_capacity(size);
        for z in 0..size {
            let row: String = (0..size)
                .map(|x| {
                    if x == 0 || z == 0 || x == size - 1 || z == size - 1 {
                        '#'
                    } else {
                        '.'
                    }
                })
                .collect();
            rows.push(row);
        }
        Grid::from_rows(&rows).expect("open grid should parse")
    }

    fn context<'a>(grid: &'a Grid, furniture: &'a [Furniture], tuning: &'a PlayerTuning) -> MotionContext<'a> {
        MotionContext {
            grid,
            furniture,
            tuning,
            cell_size: 4.0,
            exit: Vec2::new(1_000.0, 1_000.0),
        }
    }

    fn running_forward() -> PlayerIntent {
        PlayerIntent {
            forward: true,
            run: true,
            // forward along +x
            yaw: -FRAC_PI_2,
            ..PlayerIntent::default()
        }
    }

    #[test]
    fn running_drains_stamina_to_exactly_zero() {
        let grid = open_grid(41);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 80.0), &tuning);

        let mut ticks = 0_i32;
        while player.stamina > 0.0 {
            player.update(&running_forward(), &ctx, DT);
            ticks += 1;
            assert!(ticks < 1_000, "stamina never ran out");
        }
        assert_eq!(player.stamina, 0.0);
        let expected = (tuning.stamina_max / tuning.stamina_drain_rate / DT).round() as i32;
        assert!((ticks - expected).abs() <= 1, "ran out after {ticks} ticks");

        for _ in 0..100 {
            player.update(&running_forward(), &ctx, DT);
            assert!(player.stamina >= 0.0 && player.stamina <= tuning.stamina_max);
        }
    }

    #[test]
    fn idle_regenerates_up_to_the_cap() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 8.0), &tuning);
        player.stamina = 10.0;

        player.update(&PlayerIntent::default(), &ctx, 1.0);
        assert!((player.stamina - 20.0).abs() < 1e-4);
        for _ in 0..20 {
            player.update(&PlayerIntent::default(), &ctx, 1.0);
        }
        assert_eq!(player.stamina, tuning.stamina_max);
    }

    #[test]
    fn run_input_without_movement_does_not_drain() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 8.0), &tuning);
        player.stamina = 50.0;
        let intent = PlayerIntent {
            run: true,
            forward: true,
            back: true,
            ..PlayerIntent::default()
        };
        player.update(&intent, &ctx, 1.0);
        assert!(!player.running);
        assert!(player.stamina > 50.0);
    }

    #[test]
    fn sustained_running_emits_periodic_noise() {
        let grid = open_grid(81);
        let tuning = PlayerTuning {
            stamina_drain_rate: 0.0,
            walk_speed: 0.1,
            run_speed: 0.1,
            ..PlayerTuning::default()
        };
        let ctx = context(&grid, &[], &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 160.0), &tuning);

        let mut noises = 0;
        for _ in 0..625 {
            if player.update(&running_forward(), &ctx, DT).run_noise.is_some() {
                noises += 1;
            }
        }
        assert_eq!(noises, 3);
    }

    #[test]
    fn running_accumulator_decays_when_walking() {
        let grid = open_grid(41);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 80.0), &tuning);
        for _ in 0..50 {
            player.update(&running_forward(), &ctx, DT);
        }
        assert!(player.running_time > 0.9);
        let walk = PlayerIntent {
            run: false,
            ..running_forward()
        };
        for _ in 0..100 {
            player.update(&walk, &ctx, DT);
        }
        assert_eq!(player.running_time, 0.0);
    }

    #[test]
    fn diagonal_push_into_wall_slides_along_it() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        // row 0 is wall, so z - clearance must stay at or above 2.0
        let mut player = PlayerState::spawn(Vec2::new(8.0, 2.5), &tuning);
        let intent = PlayerIntent {
            forward: true,
            right: true,
            yaw: 0.0,
            ..PlayerIntent::default()
        };
        let mut last = player.position;
        for _ in 0..30 {
            player.update(&intent, &ctx, DT);
            assert!(player.position.x > last.x, "x should keep advancing");
            last = player.position;
        }
        assert!(!is_blocked(player.position, &ctx));
        assert!(player.position.y >= 2.3 && player.position.y < 2.4);
    }

    #[test]
    fn furniture_blocks_and_empty_list_does_not() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let table = [Furniture {
            kind: FurnitureKind::Table,
            position: Vec2::new(12.0, 12.0),
        }];
        let blocked_ctx = context(&grid, &table, &tuning);
        let free_ctx = context(&grid, &[], &tuning);
        assert!(is_blocked(Vec2::new(12.5, 12.5), &blocked_ctx));
        assert!(!is_blocked(Vec2::new(12.5, 12.5), &free_ctx));
    }

    #[test]
    fn out_of_bounds_counts_as_wall() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        assert!(is_blocked(Vec2::new(-10.0, 8.0), &ctx));
    }

    #[test]
    fn hiding_requires_a_nearby_bed_and_freezes_movement() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let bed = [Furniture {
            kind: FurnitureKind::Bed,
            position: Vec2::new(16.0, 16.0),
        }];
        let ctx = context(&grid, &bed, &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 8.0), &tuning);

        let interact = PlayerIntent {
            interact: true,
            ..PlayerIntent::default()
        };
        let outcome = player.update(&interact, &ctx, DT);
        assert_eq!(outcome.hide_changed, None);
        assert!(!player.hidden);

        player.position = Vec2::new(14.0, 16.0);
        let outcome = player.update(&interact, &ctx, DT);
        assert_eq!(outcome.hide_changed, Some(true));
        assert!(player.hidden);

        player.stamina = 10.0;
        let before = player.position;
        player.update(&running_forward(), &ctx, 1.0);
        assert_eq!(player.position, before);
        assert!(player.stamina > 10.0);

        let outcome = player.update(&interact, &ctx, DT);
        assert_eq!(outcome.hide_changed, Some(false));
        assert!(!player.hidden);
    }

    #[test]
    fn reaching_exit_radius_is_reported() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let mut ctx = context(&grid, &[], &tuning);
        ctx.exit = Vec2::new(9.5, 8.0);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 8.0), &tuning);
        let outcome = player.update(&PlayerIntent::default(), &ctx, DT);
        assert!(outcome.reached_exit);
    }

    #[test]
    fn throw_edge_reports_origin_unless_hidden() {
        let grid = open_grid(9);
        let tuning = PlayerTuning::default();
        let ctx = context(&grid, &[], &tuning);
        let mut player = PlayerState::spawn(Vec2::new(8.0, 8.0), &tuning);
        let throw = PlayerIntent {
            throw: true,
            ..PlayerIntent::default()
        };
        assert_eq!(player.update(&throw, &ctx, DT).throw_from, Some(Vec2::new(8.0, 8.0)));
        player.hidden = true;
        assert_eq!(player.update(&throw, &ctx, DT).throw_from, None);
    }
}
