use std::collections::VecDeque;

use glam::Vec2;
use rand::Rng;

use crate::config::AdversaryTuning;
use crate::pathfinding::find_path;
use crate::sound::{NoiseListener, SoundEventBus};
use crate::types::{AdversaryMode, AdversaryView, GridCoord, NoiseEvent};
use crate::world::{grid_to_world, world_to_grid, Grid};

use super::utils::{facing_toward, wrap_angle};

#[derive(Clone, Debug)]
pub struct AdversaryState {
    pub position: Vec2,
    pub facing: f32,
    pub mode: AdversaryMode,
    pub path: VecDeque<GridCoord>,
    pub investigation_target: Option<Vec2>,
    pub investigate_remaining: f32,
    pub last_replan_ms: u64,
    pub last_taunt_ms: u64,
    listener: NoiseListener,
}

pub struct AdversaryContext<'a> {
    pub grid: &'a Grid,
    pub sound: &'a SoundEventBus,
    pub tuning: &'a AdversaryTuning,
    pub cell_size: f32,
}

/// What the adversary knows about the player this tick.
#[derive(Clone, Copy, Debug)]
pub struct Perception {
    pub player_position: Vec2,
    pub player_hidden: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AdversaryOutcome {
    pub mode_change: Option<(AdversaryMode, AdversaryMode)>,
    pub heard: Option<NoiseEvent>,
    pub taunt: bool,
}

impl AdversaryState {
    pub fn spawn(cell: GridCoord, cell_size: f32) -> Self {
        Self {
            position: grid_to_world(cell, cell_size),
            facing: 0.0,
            mode: AdversaryMode::Wander,
            path: VecDeque::new(),
            investigation_target: None,
            investigate_remaining: 0.0,
            last_replan_ms: 0,
            last_taunt_ms: 0,
            listener: NoiseListener::default(),
        }
    }

    pub fn check_catch(&self, perception: &Perception, kill_range: f32) -> bool {
        !perception.player_hidden && self.position.distance(perception.player_position) < kill_range
    }

    /// Hearing, sight, investigation countdown, replanning, movement and the
    /// taunt cooldown, in that order. The catch check runs separately first.
    pub fn think<R: Rng + ?Sized>(
        &mut self,
        ctx: &AdversaryContext<'_>,
        perception: &Perception,
        now_ms: u64,
        dt_sec: f32,
        rng: &mut R,
    ) -> AdversaryOutcome {
        let tuning = ctx.tuning;
        let before = self.mode;
        let mut outcome = AdversaryOutcome::default();

        if let Some(event) = self.listener.poll(ctx.sound, self.position, tuning.hearing_range) {
            self.mode = AdversaryMode::Investigate;
            self.path.clear();
            self.investigate_remaining = tuning.investigate_duration_secs;
            self.investigation_target = Some(event.position);
            outcome.heard = Some(event);
        }

        let distance = self.position.distance(perception.player_position);
        if !perception.player_hidden && distance < tuning.detect_range {
            self.mode = AdversaryMode::Chase;
        } else if self.mode == AdversaryMode::Chase
            && (perception.player_hidden || distance > tuning.detect_range * tuning.chase_give_up_factor)
        {
            self.mode = AdversaryMode::Wander;
        }

        if self.mode == AdversaryMode::Investigate {
            self.investigate_remaining -= dt_sec;
            if self.investigate_remaining <= 0.0 {
                self.mode = AdversaryMode::Wander;
                self.investigation_target = None;
            }
        }

        if self.mode != before {
            outcome.mode_change = Some((before, self.mode));
        }

        if now_ms.saturating_sub(self.last_replan_ms) > tuning.replan_interval_ms || self.path.is_empty() {
            self.replan(ctx, perception, rng);
            self.last_replan_ms = now_ms;
        }

        let chase_target =
            (self.mode == AdversaryMode::Chase).then_some(perception.player_position);
        self.advance(tuning, ctx.cell_size, chase_target, dt_sec);

        if self.mode == AdversaryMode::Chase
            && now_ms.saturating_sub(self.last_taunt_ms) > tuning.taunt_cooldown_ms
        {
            self.last_taunt_ms = now_ms;
            outcome.taunt = true;
        }
        outcome
    }

    fn replan<R: Rng + ?Sized>(&mut self, ctx: &AdversaryContext<'_>, perception: &Perception, rng: &mut R) {
        let current = world_to_grid(self.position, ctx.cell_size);
        let destination = match self.mode {
            AdversaryMode::Chase => world_to_grid(perception.player_position, ctx.cell_size),
            AdversaryMode::Investigate => match self.investigation_target {
                Some(target) => nearest_walkable(ctx.grid, world_to_grid(target, ctx.cell_size)),
                None => current,
            },
            AdversaryMode::Wander => {
                // a wander route is kept until it runs out
                if !self.path.is_empty() {
                    return;
                }
                sample_walkable(ctx.grid, ctx.tuning.wander_sample_attempts, rng).unwrap_or(current)
            }
        };

        let mut path: VecDeque<GridCoord> = find_path(ctx.grid, current, destination).into();
        if path.front() == Some(&current) {
            path.pop_front();
        }
        self.path = path;
    }

    /// Follows the path; once a chase path has run out inside the player's
    /// cell, closes the remaining distance directly.
    fn advance(
        &mut self,
        tuning: &AdversaryTuning,
        cell_size: f32,
        chase_target: Option<Vec2>,
        dt_sec: f32,
    ) {
        let target = match self.path.front().copied() {
            Some(waypoint) => {
                let target = grid_to_world(waypoint, cell_size);
                if target.distance(self.position) < tuning.waypoint_tolerance {
                    self.path.pop_front();
                    return;
                }
                target
            }
            None => match chase_target {
                Some(player)
                    if world_to_grid(player, cell_size) == world_to_grid(self.position, cell_size) =>
                {
                    player
                }
                _ => return,
            },
        };

        let offset = target - self.position;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }

        let direction = offset / distance;
        self.position += direction * (self.speed(tuning) * dt_sec).min(distance);

        let turn = wrap_angle(facing_toward(direction) - self.facing);
        self.facing = wrap_angle(self.facing + turn * (tuning.turn_rate * dt_sec).min(1.0));
    }

    pub fn speed(&self, tuning: &AdversaryTuning) -> f32 {
        match self.mode {
            AdversaryMode::Wander => tuning.wander_speed,
            AdversaryMode::Investigate => tuning.investigate_speed,
            AdversaryMode::Chase => tuning.chase_speed,
        }
    }

    pub fn watermark_ms(&self) -> u64 {
        self.listener.watermark_ms()
    }

    pub fn view(&self) -> AdversaryView {
        AdversaryView {
            x: self.position.x,
            z: self.position.y,
            facing: self.facing,
            mode: self.mode,
            path_len: self.path.len(),
        }
    }
}

fn sample_walkable<R: Rng + ?Sized>(grid: &Grid, attempts: usize, rng: &mut R) -> Option<GridCoord> {
    (0..attempts)
        .map(|_| {
            GridCoord::new(
                rng.random_range(0..grid.width()),
                rng.random_range(0..grid.height()),
            )
        })
        .find(|coord| grid.is_walkable(*coord))
}

/// Noise can land over a wall; aim for an open cell next to it instead.
fn nearest_walkable(grid: &Grid, target: GridCoord) -> GridCoord {
    if grid.is_walkable(target) {
        return target;
    }
    for dz in -1..=1 {
        for dx in -1..=1 {
            let candidate = target.offset(dx, dz);
            if grid.is_walkable(candidate) {
                return candidate;
            }
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRng;
    use crate::types::NoiseCategory;

    const DT: f32 = 0.02;

    fn open_grid(size: usize) -> Grid {
        let rows: Vec<String> = (0..size)
            .map(|z| {
                (0..size)
                    .map(|x| {
                        if x == 0 || z == 0 || x == size - 1 || z == size - 1 {
                            '#'
                        } else {
                            '.'
                        }
                    })
                    .collect()
            })
            .collect();
        Grid::from_rows(&rows).expect("open grid should parse")
    }

    fn visible_at(position: Vec2) -> Perception {
        Perception {
            player_position: position,
            player_hidden: false,
        }
    }

    fn hidden_at(position: Vec2) -> Perception {
        Perception {
            player_position: position,
            player_hidden: true,
        }
    }

    struct Fixture {
        grid: Grid,
        sound: SoundEventBus,
        tuning: AdversaryTuning,
        rng: SeededRng,
        now_ms: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                grid: open_grid(31),
                sound: SoundEventBus::default(),
                tuning: AdversaryTuning::default(),
                rng: SeededRng::new(42),
                now_ms: 0,
            }
        }

        fn tick(&mut self, adversary: &mut AdversaryState, perception: Perception) -> AdversaryOutcome {
            self.now_ms += 20;
            let ctx = AdversaryContext {
                grid: &self.grid,
                sound: &self.sound,
                tuning: &self.tuning,
                cell_size: 4.0,
            };
            adversary.think(&ctx, &perception, self.now_ms, DT, &mut self.rng)
        }
    }

    #[test]
    fn catch_needs_visibility_and_range() {
        let adversary = AdversaryState::spawn(GridCoord::new(5, 5), 4.0);
        let near = Vec2::new(20.5, 20.0);
        assert!(adversary.check_catch(&visible_at(near), 1.2));
        assert!(!adversary.check_catch(&hidden_at(near), 1.2));
        assert!(!adversary.check_catch(&visible_at(Vec2::new(22.0, 20.0)), 1.2));
    }

    #[test]
    fn visible_player_in_range_starts_chase_in_one_tick() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        let outcome = fx.tick(&mut adversary, visible_at(Vec2::new(50.0, 40.0)));
        assert_eq!(adversary.mode, AdversaryMode::Chase);
        assert_eq!(
            outcome.mode_change,
            Some((AdversaryMode::Wander, AdversaryMode::Chase))
        );
    }

    #[test]
    fn hiding_breaks_chase() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        fx.tick(&mut adversary, visible_at(Vec2::new(50.0, 40.0)));
        assert_eq!(adversary.mode, AdversaryMode::Chase);
        fx.tick(&mut adversary, hidden_at(Vec2::new(50.0, 40.0)));
        assert_eq!(adversary.mode, AdversaryMode::Wander);
    }

    #[test]
    fn chase_holds_until_separation_exceeds_give_up_range() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(5, 15), 4.0);
        let near = adversary.position + Vec2::new(10.0, 0.0);
        fx.tick(&mut adversary, visible_at(near));
        assert_eq!(adversary.mode, AdversaryMode::Chase);

        let detect = fx.tuning.detect_range;
        let past_detection = adversary.position + Vec2::new(detect * 1.2, 0.0);
        fx.tick(&mut adversary, visible_at(past_detection));
        assert_eq!(adversary.mode, AdversaryMode::Chase);

        let past_give_up = adversary.position + Vec2::new(detect * 1.6, 0.0);
        fx.tick(&mut adversary, visible_at(past_give_up));
        assert_eq!(adversary.mode, AdversaryMode::Wander);
    }

    #[test]
    fn heard_noise_starts_investigation_from_any_mode() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        let far_away = Vec2::new(112.0, 112.0);

        fx.sound.publish(Vec2::new(60.0, 40.0), NoiseCategory::Throw, 1);
        let outcome = fx.tick(&mut adversary, hidden_at(far_away));
        assert_eq!(adversary.mode, AdversaryMode::Investigate);
        assert_eq!(adversary.investigation_target, Some(Vec2::new(60.0, 40.0)));
        assert!(outcome.heard.is_some());
        assert!(!adversary.path.is_empty());
    }

    #[test]
    fn sight_takes_priority_over_hearing() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        fx.sound.publish(Vec2::new(60.0, 40.0), NoiseCategory::Run, 1);
        fx.tick(&mut adversary, visible_at(Vec2::new(45.0, 40.0)));
        assert_eq!(adversary.mode, AdversaryMode::Chase);
        assert_eq!(adversary.watermark_ms(), 1);
    }

    #[test]
    fn noise_beyond_hearing_range_is_ignored() {
        let mut fx = Fixture::new();
        fx.tuning.hearing_range = 10.0;
        let mut adversary = AdversaryState::spawn(GridCoord::new(2, 2), 4.0);
        fx.sound.publish(Vec2::new(100.0, 100.0), NoiseCategory::Run, 1);
        fx.tick(&mut adversary, hidden_at(Vec2::new(112.0, 8.0)));
        assert_eq!(adversary.mode, AdversaryMode::Wander);
        assert_eq!(adversary.watermark_ms(), 0);
    }

    #[test]
    fn investigation_times_out_to_wander() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        let far_away = Vec2::new(112.0, 112.0);
        fx.sound.publish(Vec2::new(70.0, 40.0), NoiseCategory::Run, 1);

        let ticks_in_window = (fx.tuning.investigate_duration_secs / DT) as usize;
        for _ in 0..ticks_in_window - 5 {
            fx.tick(&mut adversary, hidden_at(far_away));
        }
        assert_eq!(adversary.mode, AdversaryMode::Investigate);
        for _ in 0..10 {
            fx.tick(&mut adversary, hidden_at(far_away));
        }
        assert_eq!(adversary.mode, AdversaryMode::Wander);
        assert_eq!(adversary.investigation_target, None);
    }

    #[test]
    fn replanned_path_skips_current_cell() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        fx.tick(&mut adversary, visible_at(Vec2::new(40.0, 52.0)));
        assert_eq!(adversary.mode, AdversaryMode::Chase);
        assert_ne!(adversary.path.front(), Some(&GridCoord::new(10, 10)));
        assert_eq!(adversary.path.back(), Some(&GridCoord::new(10, 13)));
    }

    #[test]
    fn unreachable_target_holds_position() {
        let mut fx = Fixture::new();
        fx.grid = Grid::from_rows(&["#######", "#..#..#", "#..#..#", "#######"])
            .expect("layout should parse");
        let mut adversary = AdversaryState::spawn(GridCoord::new(1, 1), 4.0);
        let start = adversary.position;
        fx.tick(&mut adversary, visible_at(Vec2::new(16.0, 4.0)));
        assert_eq!(adversary.mode, AdversaryMode::Chase);
        assert!(adversary.path.is_empty());
        assert_eq!(adversary.position, start);
    }

    #[test]
    fn chase_closes_on_standing_player_in_same_cell() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(1, 1), 4.0);
        let player = adversary.position + Vec2::new(1.5, 0.0);
        let perception = visible_at(player);
        assert!(!adversary.check_catch(&perception, fx.tuning.kill_range));

        let mut caught_after = None;
        for tick in 1..=20 {
            if adversary.check_catch(&perception, fx.tuning.kill_range) {
                caught_after = Some(tick);
                break;
            }
            fx.tick(&mut adversary, perception);
        }
        assert_eq!(adversary.mode, AdversaryMode::Chase);
        assert!(caught_after.is_some(), "distance={}", adversary.position.distance(player));
    }

    #[test]
    fn mode_speeds_are_ordered() {
        let tuning = AdversaryTuning::default();
        let mut adversary = AdversaryState::spawn(GridCoord::new(1, 1), 4.0);
        let wander = adversary.speed(&tuning);
        adversary.mode = AdversaryMode::Investigate;
        let investigate = adversary.speed(&tuning);
        adversary.mode = AdversaryMode::Chase;
        let chase = adversary.speed(&tuning);
        assert!(wander < investigate && investigate < chase);
    }

    #[test]
    fn chase_moves_toward_player_and_turns_to_face() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        let player = Vec2::new(40.0, 52.0);
        let before = adversary.position.distance(player);
        for _ in 0..25 {
            fx.tick(&mut adversary, visible_at(player));
        }
        assert!(adversary.position.distance(player) < before - 2.0);
        // heading +z
        assert!(adversary.facing.abs() < 0.1);
    }

    #[test]
    fn taunts_respect_cooldown() {
        let mut fx = Fixture::new();
        fx.now_ms = fx.tuning.taunt_cooldown_ms;
        let mut adversary = AdversaryState::spawn(GridCoord::new(10, 10), 4.0);
        let player = Vec2::new(40.0, 52.0);
        assert!(fx.tick(&mut adversary, visible_at(player)).taunt);
        for _ in 0..50 {
            assert!(!fx.tick(&mut adversary, visible_at(player)).taunt);
        }
    }

    #[test]
    fn wander_keeps_its_route_between_replans() {
        let mut fx = Fixture::new();
        let mut adversary = AdversaryState::spawn(GridCoord::new(15, 15), 4.0);
        let far_away = Vec2::new(112.0, 112.0);
        fx.tick(&mut adversary, hidden_at(far_away));
        let Some(&goal) = adversary.path.back() else {
            return;
        };
        for _ in 0..40 {
            fx.tick(&mut adversary, hidden_at(far_away));
            if adversary.path.is_empty() {
                break;
            }
            assert_eq!(adversary.path.back(), Some(&goal));
        }
    }
}
