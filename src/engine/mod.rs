use glam::Vec2;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::constants::DEFAULT_GAME_OVER_LINE;
use crate::furnishing::{place_furniture, Furniture};
use crate::rng::SeededRng;
use crate::sound::SoundEventBus;
use crate::types::{
    AdversaryMode, LevelInit, NoiseCategory, PlayerIntent, RuntimeEvent, SessionId,
    SessionPhase, SessionStats, SessionSummary, Snapshot, TextRequest, TextRequestKind,
    TextResponse,
};
use crate::world::{generate_level, grid_to_world, GeneratedLevel, Grid};

mod adversary_system;
mod player_system;
mod throwable_system;
mod utils;

pub use self::adversary_system::{AdversaryContext, AdversaryOutcome, AdversaryState, Perception};
pub use self::player_system::{is_blocked, movement_vector, MotionContext, PlayerState, PlayerStepOutcome};
pub use self::throwable_system::Throwable;
pub(crate) use self::utils::yaw_toward;

#[derive(Clone, Debug)]
pub struct GameEngineOptions {
    pub seed: u32,
    pub session_id: SessionId,
}

/// One pursuit session: level, player, adversary and everything they emit.
#[derive(Clone, Debug)]
pub struct GameEngine {
    pub config: GameConfig,
    pub seed: u32,

    session_id: SessionId,
    level: GeneratedLevel,
    furniture: Vec<Furniture>,
    rng: SeededRng,
    player: PlayerState,
    adversary: AdversaryState,
    sound: SoundEventBus,
    throwables: Vec<Throwable>,
    intent: PlayerIntent,
    events: Vec<RuntimeEvent>,
    text_requests: Vec<TextRequest>,
    /// Displayed taunt and the session time it expires at.
    taunt: Option<(String, u64)>,
    game_over_line: Option<String>,
    stats: SessionStats,

    phase: SessionPhase,
    caught_at_ms: Option<u64>,
    elapsed_ms: u64,
    tick_counter: u64,
    next_throwable_id: u64,
}

impl GameEngine {
    pub fn new(config: GameConfig, options: GameEngineOptions) -> Self {
        let mut rng = SeededRng::new(options.seed);
        let level = generate_level(config.maze_width, config.maze_height, &mut rng);
        let furniture = place_furniture(&level.rooms, config.cell_size, &config.furnishing, &mut rng);
        Self::from_parts(config, level, furniture, rng, options)
    }

    /// Runs a session on a prepared level with no furniture.
    pub fn with_level(config: GameConfig, level: GeneratedLevel, options: GameEngineOptions) -> Self {
        let rng = SeededRng::new(options.seed);
        Self::from_parts(config, level, Vec::new(), rng, options)
    }

    fn from_parts(
        config: GameConfig,
        level: GeneratedLevel,
        furniture: Vec<Furniture>,
        rng: SeededRng,
        options: GameEngineOptions,
    ) -> Self {
        let cell_size = config.cell_size;
        let player = PlayerState::spawn(grid_to_world(level.grid.start(), cell_size), &config.player);
        let adversary = AdversaryState::spawn(level.grid.exit(), cell_size);
        debug!(
            session = %options.session_id,
            seed = options.seed,
            start = %level.grid.start(),
            exit = %level.grid.exit(),
            furniture = furniture.len(),
            "session level ready"
        );

        Self {
            config,
            seed: options.seed,
            session_id: options.session_id,
            level,
            furniture,
            rng,
            player,
            adversary,
            sound: SoundEventBus::default(),
            throwables: Vec::new(),
            intent: PlayerIntent::default(),
            events: Vec::new(),
            text_requests: Vec::new(),
            taunt: None,
            game_over_line: None,
            stats: SessionStats::default(),
            phase: SessionPhase::Playing,
            caught_at_ms: None,
            elapsed_ms: 0,
            tick_counter: 0,
            next_throwable_id: 0,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn grid(&self) -> &Grid {
        &self.level.grid
    }

    pub fn furniture(&self) -> &[Furniture] {
        &self.furniture
    }

    pub fn set_furniture(&mut self, furniture: Vec<Furniture>) {
        self.furniture = furniture;
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn adversary(&self) -> &AdversaryState {
        &self.adversary
    }

    pub fn exit_position(&self) -> Vec2 {
        grid_to_world(self.level.grid.exit(), self.config.cell_size)
    }

    /// Held keys replace the previous intent; `interact` and `throw` edges
    /// stay latched until the next tick consumes them.
    pub fn receive_input(&mut self, intent: PlayerIntent) {
        if self.phase != SessionPhase::Playing {
            return;
        }
        let interact = self.intent.interact || intent.interact;
        let throw = self.intent.throw || intent.throw;
        self.intent = PlayerIntent {
            interact,
            throw,
            ..intent
        };
    }

    pub fn step(&mut self, dt_ms: u64) {
        if self.phase.is_terminal() {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_ms = self.elapsed_ms.saturating_add(dt_ms);
        let now_ms = self.elapsed_ms;
        let dt_sec = dt_ms as f32 / 1000.0;
        self.expire_taunt(now_ms);

        if self.phase == SessionPhase::Caught {
            self.update_reaction_window(now_ms);
            return;
        }

        // positions from the end of the previous tick
        let perception = self.perception();
        if self.adversary.check_catch(&perception, self.config.adversary.kill_range) {
            self.enter_caught(now_ms);
            return;
        }

        let intent = self.take_intent();
        if self.update_player(&intent, dt_sec, now_ms) {
            return;
        }
        self.update_throwables(dt_sec, now_ms);
        self.update_adversary(dt_sec, now_ms);
    }

    /// Applies a generated line if it belongs to this session. Taunts that
    /// arrive after the catch are discarded.
    pub fn apply_text_response(&mut self, response: TextResponse) -> bool {
        if response.session_id != self.session_id {
            debug!(
                session = %self.session_id,
                response_session = %response.session_id,
                kind = ?response.kind,
                "dropping text response from another session"
            );
            return false;
        }
        match response.kind {
            TextRequestKind::Taunt => {
                if self.phase != SessionPhase::Playing {
                    return false;
                }
                let expires_at = self.elapsed_ms + self.config.taunt_display_ms;
                self.taunt = Some((response.text.clone(), expires_at));
                self.events.push(RuntimeEvent::Taunt { text: response.text });
            }
            TextRequestKind::GameOverLine => {
                self.game_over_line = Some(response.text.clone());
                self.events.push(RuntimeEvent::GameOverLine { text: response.text });
            }
        }
        true
    }

    pub fn drain_text_requests(&mut self) -> Vec<TextRequest> {
        std::mem::take(&mut self.text_requests)
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        Snapshot {
            tick: self.tick_counter,
            session_id: self.session_id,
            elapsed_ms: self.elapsed_ms,
            phase: self.phase,
            player: self.player.view(self.config.player.stamina_max),
            adversary: self.adversary.view(),
            noise: self.sound.latest().copied(),
            throwables: self.throwables.iter().map(Throwable::view).collect(),
            taunt: self.taunt.as_ref().map(|(text, _)| text.clone()),
            game_over_line: self.game_over_line.clone(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn level_init(&self) -> LevelInit {
        let grid = &self.level.grid;
        LevelInit {
            session_id: self.session_id,
            seed: self.seed,
            width: grid.width(),
            height: grid.height(),
            cell_size: self.config.cell_size,
            tiles: grid.tiles(),
            start: grid.start(),
            exit: grid.exit(),
            rooms: self.level.rooms.clone(),
            furniture: self.furniture.iter().map(Furniture::view).collect(),
        }
    }

    pub fn build_summary(&self) -> SessionSummary {
        let game_over_line = match (&self.game_over_line, self.phase) {
            (Some(line), _) => Some(line.clone()),
            (None, SessionPhase::GameOver) => Some(DEFAULT_GAME_OVER_LINE.to_string()),
            (None, _) => None,
        };
        SessionSummary {
            session_id: self.session_id,
            seed: self.seed,
            phase: self.phase,
            duration_ms: self.elapsed_ms,
            stats: self.stats.clone(),
            game_over_line,
        }
    }

    fn perception(&self) -> Perception {
        Perception {
            player_position: self.player.position,
            player_hidden: self.player.hidden,
        }
    }

    fn take_intent(&mut self) -> PlayerIntent {
        let intent = self.intent;
        self.intent.interact = false;
        self.intent.throw = false;
        intent
    }

    fn expire_taunt(&mut self, now_ms: u64) {
        if matches!(&self.taunt, Some((_, expires_at)) if *expires_at <= now_ms) {
            self.taunt = None;
        }
    }

    fn enter_caught(&mut self, now_ms: u64) {
        self.phase = SessionPhase::Caught;
        self.caught_at_ms = Some(now_ms);
        self.taunt = None;
        self.intent = PlayerIntent::default();
        self.events.push(RuntimeEvent::Caught);
        self.text_requests.push(TextRequest {
            session_id: self.session_id,
            kind: TextRequestKind::GameOverLine,
        });
        info!(
            session = %self.session_id,
            elapsed_ms = now_ms,
            x = self.player.position.x,
            z = self.player.position.y,
            "player caught"
        );
    }

    fn update_reaction_window(&mut self, now_ms: u64) {
        let Some(caught_at) = self.caught_at_ms else {
            return;
        };
        if now_ms.saturating_sub(caught_at) >= self.config.catch_reaction_ms {
            self.phase = SessionPhase::GameOver;
            self.events.push(RuntimeEvent::GameOver);
            info!(session = %self.session_id, elapsed_ms = now_ms, "game over");
        }
    }

    /// Returns true once the player has escaped.
    fn update_player(&mut self, intent: &PlayerIntent, dt_sec: f32, now_ms: u64) -> bool {
        let cell_size = self.config.cell_size;
        let ctx = MotionContext {
            grid: &self.level.grid,
            furniture: &self.furniture,
            tuning: &self.config.player,
            cell_size,
            exit: grid_to_world(self.level.grid.exit(), cell_size),
        };
        let outcome = self.player.update(intent, &ctx, dt_sec);

        if let Some(hidden) = outcome.hide_changed {
            if hidden {
                self.stats.hides += 1;
            }
            self.events.push(RuntimeEvent::HideChanged { hidden });
        }
        if let Some(origin) = outcome.run_noise {
            self.sound.publish(origin, NoiseCategory::Run, now_ms);
            self.stats.run_noises += 1;
            self.events.push(RuntimeEvent::NoiseEmitted {
                category: NoiseCategory::Run,
                x: origin.x,
                z: origin.y,
            });
        }
        if let Some(origin) = outcome.throw_from {
            self.next_throwable_id += 1;
            let id = self.next_throwable_id;
            self.throwables
                .push(Throwable::launch(id, origin, self.player.yaw, &self.config.player));
            self.stats.throws += 1;
            self.events.push(RuntimeEvent::ThrowLaunched { id });
        }
        if outcome.reached_exit {
            self.phase = SessionPhase::Victory;
            self.events.push(RuntimeEvent::Victory);
            info!(session = %self.session_id, elapsed_ms = now_ms, "player reached the exit");
            return true;
        }
        false
    }

    fn update_adversary(&mut self, dt_sec: f32, now_ms: u64) {
        let perception = self.perception();
        let ctx = AdversaryContext {
            grid: &self.level.grid,
            sound: &self.sound,
            tuning: &self.config.adversary,
            cell_size: self.config.cell_size,
        };
        let outcome = self
            .adversary
            .think(&ctx, &perception, now_ms, dt_sec, &mut self.rng);

        if let Some((from, to)) = outcome.mode_change {
            debug!(session = %self.session_id, ?from, ?to, elapsed_ms = now_ms, "adversary mode changed");
            match to {
                AdversaryMode::Chase => self.stats.chase_entries += 1,
                AdversaryMode::Investigate => self.stats.investigate_entries += 1,
                AdversaryMode::Wander => {}
            }
            self.events.push(RuntimeEvent::ModeChanged { from, to });
        }
        if outcome.taunt {
            self.stats.taunts_requested += 1;
            self.text_requests.push(TextRequest {
                session_id: self.session_id,
                kind: TextRequestKind::Taunt,
            });
        }
    }
}
