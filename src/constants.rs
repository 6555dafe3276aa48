pub const TICK_RATE: u32 = 50;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const MAZE_SIZE: i32 = 21;
pub const MIN_MAZE_SIZE: i32 = 5;
pub const MAX_MAZE_SIZE: i32 = 81;
pub const CELL_SIZE: f32 = 4.0;
pub const ROOM_MIN_SIDE: i32 = 3;
pub const ROOM_MAX_SIDE: i32 = 5;

pub const PLAYER_SPEED: f32 = 3.2;
pub const PLAYER_RUN_SPEED: f32 = 5.5;
pub const PLAYER_HEIGHT: f32 = 2.1;
pub const PLAYER_CLEARANCE: f32 = 0.3;
pub const STAMINA_MAX: f32 = 100.0;
pub const STAMINA_DRAIN_RATE: f32 = 25.0;
pub const STAMINA_REGEN_RATE: f32 = 10.0;
pub const RUN_NOISE_THRESHOLD_SECS: f32 = 4.0;
pub const HIDE_DISTANCE: f32 = 2.5;
pub const EXIT_RADIUS: f32 = 2.0;

pub const THROW_FORCE: f32 = 15.0;
pub const THROW_LIFT: f32 = 2.0;
pub const THROW_GRAVITY: f32 = 25.0;
pub const THROW_LANDING_HEIGHT: f32 = 0.2;

pub const ADVERSARY_SPEED_WANDER: f32 = 2.5;
pub const ADVERSARY_SPEED_INVESTIGATE: f32 = 3.5;
pub const ADVERSARY_SPEED_CHASE: f32 = 4.8;
pub const ADVERSARY_DETECT_RANGE: f32 = 15.0;
pub const ADVERSARY_KILL_RANGE: f32 = 1.2;
pub const ADVERSARY_HEARING_RANGE: f32 = 40.0;
pub const CHASE_GIVE_UP_FACTOR: f32 = 1.5;
pub const INVESTIGATE_DURATION_SECS: f32 = 5.0;
pub const REPLAN_INTERVAL_MS: u64 = 500;
pub const WANDER_SAMPLE_ATTEMPTS: usize = 10;
pub const WAYPOINT_TOLERANCE: f32 = 0.2;
pub const TURN_RATE: f32 = 10.0;
pub const TAUNT_COOLDOWN_MS: u64 = 12_000;

pub const BED_SPAWN_CHANCE: f64 = 0.2;
pub const TABLE_SPAWN_CHANCE: f64 = 0.5;
pub const BED_HALF_EXTENTS: (f32, f32) = (1.3, 1.8);
pub const TABLE_HALF_EXTENTS: (f32, f32) = (1.3, 1.3);

pub const CATCH_REACTION_MS: u64 = 1_500;
pub const TAUNT_DISPLAY_MS: u64 = 4_000;

pub const FALLBACK_TAUNT: &str = "I see you...";
pub const FALLBACK_TAUNT_ON_ERROR: &str = "Where are you going?";
pub const FALLBACK_GAME_OVER_LINE: &str = "She caught you. You will never leave.";
pub const DEFAULT_GAME_OVER_LINE: &str = "She found you.";

pub fn normalize_maze_dimension(value: i32) -> i32 {
    let clamped = value.clamp(MIN_MAZE_SIZE, MAX_MAZE_SIZE);
    if clamped % 2 == 0 {
        clamped + 1
    } else {
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maze_dimensions_are_odd_and_clamped() {
        assert_eq!(normalize_maze_dimension(21), 21);
        assert_eq!(normalize_maze_dimension(20), 21);
        assert_eq!(normalize_maze_dimension(1), MIN_MAZE_SIZE);
        assert_eq!(normalize_maze_dimension(4), 5);
        assert_eq!(normalize_maze_dimension(1_000), MAX_MAZE_SIZE);
    }
}
