use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::engine::{GameEngine, GameEngineOptions};
use crate::text_gen::TextGenerator;
use crate::types::{
    LevelInit, PlayerIntent, SessionId, SessionPhase, SessionSummary, Snapshot, TextRequest,
    TextResponse,
};

/// Fire-and-forget sound cues. Synthesis lives with the presentation layer.
pub trait AudioSink: Send + Sync {
    fn play_catch(&self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAudioSink;

impl AudioSink for TracingAudioSink {
    fn play_catch(&self) {
        info!(cue = "catch", "audio cue");
    }
}

/// Runs text requests for one session at a time. Rebinding to a new session
/// aborts whatever is still in flight.
pub struct TextDispatcher {
    generator: Arc<dyn TextGenerator>,
    session_id: SessionId,
    in_flight: JoinSet<TextResponse>,
}

impl TextDispatcher {
    pub fn new(generator: Arc<dyn TextGenerator>, session_id: SessionId) -> Self {
        Self {
            generator,
            session_id,
            in_flight: JoinSet::new(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Must be called from inside a tokio runtime.
    pub fn dispatch(&mut self, request: TextRequest) {
        if request.session_id != self.session_id {
            debug!(
                session = %self.session_id,
                request_session = %request.session_id,
                "ignoring text request from another session"
            );
            return;
        }
        let pending = self.generator.generate(request.kind);
        self.in_flight.spawn(async move {
            TextResponse {
                session_id: request.session_id,
                kind: request.kind,
                text: pending.await,
            }
        });
    }

    pub fn collect_ready(&mut self) -> Vec<TextResponse> {
        let mut ready = Vec::new();
        while let Some(result) = self.in_flight.try_join_next() {
            match result {
                Ok(response) => ready.push(response),
                Err(err) => debug!(error = %err, "text request did not complete"),
            }
        }
        ready
    }

    pub fn rebind(&mut self, session_id: SessionId) {
        let aborted = self.in_flight.len();
        self.in_flight.abort_all();
        self.in_flight = JoinSet::new();
        self.session_id = session_id;
        if aborted > 0 {
            debug!(session = %session_id, aborted, "aborted text requests from previous session");
        }
    }
}

/// Owns the running engine and its collaborators.
pub struct SessionDriver {
    config: GameConfig,
    engine: GameEngine,
    dispatcher: TextDispatcher,
    audio: Arc<dyn AudioSink>,
    next_session: u64,
}

impl SessionDriver {
    pub fn new(
        config: GameConfig,
        seed: u32,
        generator: Arc<dyn TextGenerator>,
        audio: Arc<dyn AudioSink>,
    ) -> Self {
        let engine = GameEngine::new(
            config.clone(),
            GameEngineOptions {
                seed,
                session_id: SessionId(1),
            },
        );
        Self::from_engine(engine, generator, audio)
    }

    pub fn from_engine(engine: GameEngine, generator: Arc<dyn TextGenerator>, audio: Arc<dyn AudioSink>) -> Self {
        let session_id = engine.session_id();
        info!(session = %session_id, seed = engine.seed, "session started");
        Self {
            config: engine.config.clone(),
            dispatcher: TextDispatcher::new(generator, session_id),
            next_session: session_id.0 + 1,
            engine,
            audio,
        }
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &TextDispatcher {
        &self.dispatcher
    }

    pub fn receive_input(&mut self, intent: PlayerIntent) {
        self.engine.receive_input(intent);
    }

    pub fn tick(&mut self, dt_ms: u64) -> Snapshot {
        let phase_before = self.engine.phase();
        self.engine.step(dt_ms);

        for request in self.engine.drain_text_requests() {
            self.dispatcher.dispatch(request);
        }
        for response in self.dispatcher.collect_ready() {
            self.engine.apply_text_response(response);
        }
        if phase_before != SessionPhase::Caught && self.engine.phase() == SessionPhase::Caught {
            self.audio.play_catch();
        }
        self.engine.build_snapshot(true)
    }

    /// Starts a fresh level under a new session id. `config` replaces the
    /// current tuning when given.
    pub fn restart(&mut self, seed: u32, config: Option<GameConfig>) -> LevelInit {
        if let Some(config) = config {
            self.config = config;
        }
        let session_id = SessionId(self.next_session);
        self.next_session += 1;
        self.dispatcher.rebind(session_id);
        self.engine = GameEngine::new(self.config.clone(), GameEngineOptions { seed, session_id });
        info!(session = %session_id, seed, "session restarted");
        self.engine.level_init()
    }

    pub fn summary(&self) -> SessionSummary {
        self.engine.build_summary()
    }
}
