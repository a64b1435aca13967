//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::game::entity::{InputState, PlayerId, ProjectileId, Score, Team};
use crate::game::rules::GameMode;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the arena
    Join(JoinRequest),

    /// Latest input state, sent at a fixed client rate whether or not it changed
    Input(InputState),

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Join payload. Which fields are required depends on the game mode.
///
/// Fields of the wrong JSON type parse as absent so the registry rejects
/// them with a join reason instead of a generic parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default, deserialize_with = "lenient_name")]
    pub name: String,
    /// Display color, required in deathmatch
    #[serde(default, deserialize_with = "lenient_color")]
    pub color: Option<String>,
    /// Team number, required in ball mode. Out-of-range or non-integer
    /// values parse as `None`.
    #[serde(default, deserialize_with = "lenient_team")]
    pub team: Option<u8>,
}

fn lenient_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_owned).unwrap_or_default())
}

fn lenient_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_owned))
}

fn lenient_team<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().and_then(|t| u8::try_from(t).ok()))
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once after the socket is upgraded
    Welcome {
        player_id: PlayerId,
        mode: GameMode,
        server_time: u64,
    },

    /// Join accepted
    Joined { player_id: PlayerId },

    /// Join refused; only the submitting client receives this
    JoinRejected { code: String, message: String },

    /// Authoritative state, emitted every tick
    State(StateSnapshot),

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Full arena state for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Server tick number
    pub tick: u64,
    /// Simulation timestamp of the tick (ms)
    pub server_time: u64,
    pub mode: GameMode,
    pub players: BTreeMap<PlayerId, PlayerView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub projectiles: Option<BTreeMap<ProjectileId, ProjectileView>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ball: Option<BallView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<Score>,
    /// Events that happened during this tick
    #[serde(default)]
    pub events: Vec<GameEvent>,
}

/// Render-relevant player fields. Never carries raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub team: Option<Team>,
    pub dead: bool,
    pub can_respawn: bool,
    pub shield: bool,
    /// Charge of the ball shot being held, 0..=1
    pub shot_power: f32,
    pub kills: u32,
    pub deaths: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileView {
    pub x: f32,
    pub y: f32,
    /// True only in the snapshot of the tick the shot was fired
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub x: f32,
    pub y: f32,
    /// Controlling team, 0 when neutral
    pub team: u8,
    /// Player carrying the ball; at most one entry
    pub caught_by: Vec<PlayerId>,
}

/// Game events (shots, kills, goals, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Projectile fired
    Shot {
        shooter_id: PlayerId,
        projectile_id: ProjectileId,
        x: f32,
        y: f32,
    },

    /// Projectile bounced off a shield
    Reflect {
        defender_id: PlayerId,
        projectile_id: ProjectileId,
    },

    /// Player killed
    Kill {
        killer_id: Option<PlayerId>,
        victim_id: PlayerId,
        cause: KillCause,
    },

    /// Dead player came back
    Respawn { player_id: PlayerId },

    /// Ball picked up
    Catch { player_id: PlayerId, team: Team },

    /// Several players reached the ball in the same tick
    Contested { claimants: u32 },

    /// Ball released from a charged shot
    Throw { player_id: PlayerId, speed: f32 },

    /// Ball left the arena and was reset
    BallOut,

    Goal {
        team: Team,
        score: Score,
        /// Last player to throw the ball, if still connected
        scored_by: Option<PlayerId>,
    },

    /// A team reached the win threshold
    RoundWon { team: Team },
}

/// Why a player died
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KillCause {
    Shot,
    /// Opposing team reached the win threshold
    RoundLost,
}
