//! Arena dimensions and per-mode tuning

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::vector::Vec2;

pub const MIN_X: f32 = 0.0;
pub const MAX_X: f32 = 800.0;
pub const MIN_Y: f32 = 0.0;
pub const MAX_Y: f32 = 600.0;

/// Player hit circle radius
pub const PLAYER_RADIUS: f32 = 10.0;
/// Radius at which a player catches and carries the ball
pub const BALL_CATCH_RADIUS: f32 = 20.0;

pub const GOAL_RADIUS: f32 = 25.0;
pub const GOAL_ONE: Vec2 = Vec2::new(65.0, MAX_Y / 2.0);
pub const GOAL_TWO: Vec2 = Vec2::new(MAX_X - 65.0, MAX_Y / 2.0);

pub fn arena_center() -> Vec2 {
    Vec2::new((MIN_X + MAX_X) / 2.0, (MIN_Y + MAX_Y) / 2.0)
}

pub fn in_bounds(p: Vec2) -> bool {
    (MIN_X..=MAX_X).contains(&p.x) && (MIN_Y..=MAX_Y).contains(&p.y)
}

pub fn clamp_to_arena(p: Vec2) -> Vec2 {
    Vec2::new(p.x.clamp(MIN_X, MAX_X), p.y.clamp(MIN_Y, MAX_Y))
}

/// Game mode, fixed for the lifetime of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Free-for-all with bouncing shots and shields
    #[default]
    Deathmatch,
    /// Two teams, one ball, two goals
    Ball,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Deathmatch => f.write_str("deathmatch"),
            GameMode::Ball => f.write_str("ball"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown game mode '{0}', expected 'deathmatch' or 'ball'")]
pub struct UnknownGameMode(pub String);

impl FromStr for GameMode {
    type Err = UnknownGameMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deathmatch" | "dm" => Ok(GameMode::Deathmatch),
            "ball" | "team" => Ok(GameMode::Ball),
            other => Err(UnknownGameMode(other.to_string())),
        }
    }
}

/// Simulation constants for one game mode.
///
/// Speeds are in arena units per tick, durations in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct ArenaRules {
    pub mode: GameMode,
    pub player_speed: f32,
    pub projectile_speed: f32,
    /// Minimum time between two shots from the same player
    pub fire_interval_ms: u64,
    /// Wall reflections before a projectile is removed
    pub bounce_budget: u32,
    /// Time a dead player must wait before respawning
    pub death_cooloff_ms: u64,
    /// Time after spawning during which projectiles pass through a player
    pub spawn_protection_ms: u64,
    /// After a ball shot nobody can catch the ball for this long
    pub min_shot_duration_ms: u64,
    /// Longest charge that still adds shot power
    pub max_shot_channel_ms: u64,
    pub max_shot_speed: f32,
    /// Goals needed to win a round
    pub win_threshold: u32,
}

impl ArenaRules {
    pub fn for_mode(mode: GameMode) -> Self {
        match mode {
            GameMode::Deathmatch => Self {
                mode,
                player_speed: 5.0,
                projectile_speed: 7.0,
                fire_interval_ms: 333,
                bounce_budget: 3,
                death_cooloff_ms: 2000,
                spawn_protection_ms: 1000,
                min_shot_duration_ms: 250,
                max_shot_channel_ms: 750,
                max_shot_speed: 15.0,
                win_threshold: 5,
            },
            GameMode::Ball => Self {
                mode,
                player_speed: 5.0,
                projectile_speed: 0.0,
                fire_interval_ms: 0,
                bounce_budget: 0,
                death_cooloff_ms: 2000,
                spawn_protection_ms: 1000,
                min_shot_duration_ms: 250,
                max_shot_channel_ms: 750,
                max_shot_speed: 15.0,
                win_threshold: 5,
            },
        }
    }
}
