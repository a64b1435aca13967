//! Game simulation modules

pub mod arena;
pub mod ball;
pub mod combat;
pub mod engine;
pub mod entity;
pub mod geometry;
pub mod physics;
pub mod rules;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod vector;

pub use arena::{ArenaError, ArenaHandle, ArenaStats, GameArena};
pub use rules::GameMode;
