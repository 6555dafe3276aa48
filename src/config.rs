//! Runtime tuning for a pursuit session.
//!
//! Defaults mirror `constants.rs`. A TOML file may override any subset of
//! fields; missing keys keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{PursuitError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate: u32,
    /// Requested maze width; normalized to odd at generation time.
    pub maze_width: i32,
    pub maze_height: i32,
    /// World units per grid cell.
    pub cell_size: f32,
    /// Jumpscare window between catch and game over.
    pub catch_reaction_ms: u64,
    pub taunt_display_ms: u64,
    pub player: PlayerTuning,
    pub adversary: AdversaryTuning,
    pub furnishing: FurnishingTuning,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub walk_speed: f32,
    pub run_speed: f32,
    pub height: f32,
    /// Half-width of the collision probe square around the player.
    pub clearance: f32,
    pub stamina_max: f32,
    /// Stamina per second spent while running.
    pub stamina_drain_rate: f32,
    /// Stamina per second recovered while not running.
    pub stamina_regen_rate: f32,
    /// Seconds of continuous running before a run noise is emitted.
    pub run_noise_threshold_secs: f32,
    pub hide_distance: f32,
    pub exit_radius: f32,
    pub throw_force: f32,
    pub throw_lift: f32,
    pub throw_gravity: f32,
    pub throw_landing_height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdversaryTuning {
    pub wander_speed: f32,
    pub investigate_speed: f32,
    pub chase_speed: f32,
    pub detect_range: f32,
    pub kill_range: f32,
    pub hearing_range: f32,
    /// Chase is abandoned beyond `detect_range * chase_give_up_factor`.
    pub chase_give_up_factor: f32,
    pub investigate_duration_secs: f32,
    pub replan_interval_ms: u64,
    pub wander_sample_attempts: usize,
    pub waypoint_tolerance: f32,
    pub turn_rate: f32,
    pub taunt_cooldown_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FurnishingTuning {
    pub bed_chance: f64,
    pub table_chance: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            maze_width: MAZE_SIZE,
            maze_height: MAZE_SIZE,
            cell_size: CELL_SIZE,
            catch_reaction_ms: CATCH_REACTION_MS,
            taunt_display_ms: TAUNT_DISPLAY_MS,
            player: PlayerTuning::default(),
            adversary: AdversaryTuning::default(),
            furnishing: FurnishingTuning::default(),
        }
    }
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            walk_speed: PLAYER_SPEED,
            run_speed: PLAYER_RUN_SPEED,
            height: PLAYER_HEIGHT,
            clearance: PLAYER_CLEARANCE,
            stamina_max: STAMINA_MAX,
            stamina_drain_rate: STAMINA_DRAIN_RATE,
            stamina_regen_rate: STAMINA_REGEN_RATE,
            run_noise_threshold_secs: RUN_NOISE_THRESHOLD_SECS,
            hide_distance: HIDE_DISTANCE,
            exit_radius: EXIT_RADIUS,
            throw_force: THROW_FORCE,
            throw_lift: THROW_LIFT,
            throw_gravity: THROW_GRAVITY,
            throw_landing_height: THROW_LANDING_HEIGHT,
        }
    }
}

impl Default for AdversaryTuning {
    fn default() -> Self {
        Self {
            wander_speed: ADVERSARY_SPEED_WANDER,
            investigate_speed: ADVERSARY_SPEED_INVESTIGATE,
            chase_speed: ADVERSARY_SPEED_CHASE,
            detect_range: ADVERSARY_DETECT_RANGE,
            kill_range: ADVERSARY_KILL_RANGE,
            hearing_range: ADVERSARY_HEARING_RANGE,
            chase_give_up_factor: CHASE_GIVE_UP_FACTOR,
            investigate_duration_secs: INVESTIGATE_DURATION_SECS,
            replan_interval_ms: REPLAN_INTERVAL_MS,
            wander_sample_attempts: WANDER_SAMPLE_ATTEMPTS,
            waypoint_tolerance: WAYPOINT_TOLERANCE,
            turn_rate: TURN_RATE,
            taunt_cooldown_ms: TAUNT_COOLDOWN_MS,
        }
    }
}

impl Default for FurnishingTuning {
    fn default() -> Self {
        Self {
            bed_chance: BED_SPAWN_CHANCE,
            table_chance: TABLE_SPAWN_CHANCE,
        }
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PursuitError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: GameConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// `MAZE_CONFIG` names a TOML file; `MAZE_SIZE` overrides both maze dimensions.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("MAZE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim())?,
            _ => Self::default(),
        };
        if let Some(size) = std::env::var("MAZE_SIZE")
            .ok()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
        {
            config.maze_width = size;
            config.maze_height = size;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn tick_ms(&self) -> u64 {
        (1000 / self.tick_rate.max(1)) as u64
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| -> Result<()> {
            Err(PursuitError::InvalidConfig(message.to_string()))
        };

        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return invalid("tick_rate must be in 1..=1000");
        }
        if self.maze_width < MIN_MAZE_SIZE || self.maze_height < MIN_MAZE_SIZE {
            return invalid("maze dimensions must be at least 5");
        }
        if self.maze_width > MAX_MAZE_SIZE || self.maze_height > MAX_MAZE_SIZE {
            return invalid("maze dimensions exceed the supported maximum");
        }
        if !(self.cell_size > 0.0) {
            return invalid("cell_size must be positive");
        }

        let p = &self.player;
        if !(p.walk_speed > 0.0 && p.run_speed >= p.walk_speed) {
            return invalid("player speeds must be positive and run_speed >= walk_speed");
        }
        if !(p.stamina_max > 0.0) {
            return invalid("stamina_max must be positive");
        }
        if p.stamina_drain_rate < 0.0 || p.stamina_regen_rate < 0.0 {
            return invalid("stamina rates must not be negative");
        }
        if !(p.run_noise_threshold_secs > 0.0) {
            return invalid("run_noise_threshold_secs must be positive");
        }
        if p.clearance < 0.0 || p.clearance * 2.0 >= self.cell_size {
            return invalid("clearance must fit inside a cell");
        }
        if !(p.hide_distance > 0.0 && p.exit_radius > 0.0) {
            return invalid("hide_distance and exit_radius must be positive");
        }
        if !(p.throw_gravity > 0.0) {
            return invalid("throw_gravity must be positive");
        }

        let a = &self.adversary;
        if !(a.wander_speed > 0.0
            && a.wander_speed < a.investigate_speed
            && a.investigate_speed < a.chase_speed)
        {
            return invalid("adversary speeds must satisfy 0 < wander < investigate < chase");
        }
        if !(a.kill_range > 0.0 && a.kill_range < a.detect_range) {
            return invalid("kill_range must be positive and below detect_range");
        }
        if !(a.hearing_range > 0.0) {
            return invalid("hearing_range must be positive");
        }
        if a.chase_give_up_factor < 1.0 {
            return invalid("chase_give_up_factor must be at least 1");
        }
        if !(a.investigate_duration_secs > 0.0) {
            return invalid("investigate_duration_secs must be positive");
        }
        if !(a.waypoint_tolerance > 0.0 && a.turn_rate > 0.0) {
            return invalid("waypoint_tolerance and turn_rate must be positive");
        }

        let f = &self.furnishing;
        if !(0.0..=1.0).contains(&f.bed_chance) || !(0.0..=1.0).contains(&f.table_chance) {
            return invalid("furniture chances must be within [0, 1]");
        }
        Ok(())
    }
}
