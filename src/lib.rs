pub mod autopilot;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod furnishing;
pub mod logging;
pub mod pathfinding;
pub mod rng;
pub mod server_protocol;
pub mod server_utils;
pub mod session;
pub mod sound;
pub mod text_gen;
pub mod types;
pub mod world;
