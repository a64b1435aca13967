//! Connection-to-player registry: join, input, disconnect

use tracing::{debug, info};

use crate::ws::protocol::JoinRequest;

use super::entity::{Gunner, InputState, Player, PlayerId, PlayerMode, Striker, Team};
use super::rules::GameMode;
use super::state::{ArenaState, Field};

/// Longest display name kept; longer names are truncated
pub const MAX_NAME_LEN: usize = 24;

/// Reasons a join request is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("a name is required")]
    MissingName,

    #[error("a color like #a0f or #aa00ff is required")]
    InvalidColor,

    #[error("team must be 1 or 2")]
    InvalidTeam,

    #[error("this connection has already joined")]
    AlreadyJoined,
}

impl JoinError {
    /// Stable machine-readable code for the client
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::MissingName => "missing_name",
            JoinError::InvalidColor => "invalid_color",
            JoinError::InvalidTeam => "invalid_team",
            JoinError::AlreadyJoined => "already_joined",
        }
    }
}

fn is_hex_color(color: &str) -> bool {
    let Some(digits) = color.strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

fn validate_name(name: &str) -> Result<String, JoinError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(JoinError::MissingName);
    }
    Ok(name.chars().take(MAX_NAME_LEN).collect())
}

fn validate_mode(mode: GameMode, request: &JoinRequest) -> Result<PlayerMode, JoinError> {
    match mode {
        GameMode::Deathmatch => {
            let color = request
                .color
                .as_deref()
                .map(str::trim)
                .filter(|c| is_hex_color(c))
                .ok_or(JoinError::InvalidColor)?;
            Ok(PlayerMode::Deathmatch(Gunner {
                color: color.to_string(),
                shield: false,
            }))
        }
        GameMode::Ball => {
            let team = request
                .team
                .and_then(|t| Team::try_from(t).ok())
                .ok_or(JoinError::InvalidTeam)?;
            Ok(PlayerMode::Ball(Striker::new(team)))
        }
    }
}

/// Register a new player for connection `id` and spawn it.
pub fn join(state: &mut ArenaState, id: PlayerId, request: &JoinRequest, now: u64) -> Result<(), JoinError> {
    if state.players.contains_key(&id) {
        return Err(JoinError::AlreadyJoined);
    }

    let name = validate_name(&request.name)?;
    let mode = validate_mode(state.mode(), request)?;

    let mut player = Player::new(id, name, mode);
    player.respawn(&mut state.rng, now);

    info!(
        player_id = %id,
        name = %player.name,
        x = player.position.x,
        y = player.position.y,
        player_count = state.players.len() + 1,
        "Player joined arena"
    );
    state.players.insert(id, player);
    Ok(())
}

/// Store the latest input verbatim. Unknown connections are ignored.
pub fn update_input(state: &mut ArenaState, id: PlayerId, input: InputState) {
    match state.players.get_mut(&id) {
        Some(player) => player.input = input,
        None => debug!(player_id = %id, "Input from connection that has not joined"),
    }
}

/// Remove the player and clear every reference other entities hold to it.
/// Returns false if the connection never joined.
pub fn disconnect(state: &mut ArenaState, id: PlayerId) -> bool {
    if state.players.remove(&id).is_none() {
        return false;
    }

    match &mut state.field {
        Field::Deathmatch(shots) => {
            for projectile in shots.projectiles.values_mut() {
                if projectile.owner == Some(id) {
                    projectile.owner = None;
                }
            }
        }
        Field::Ball(field) => {
            if field.ball.caught_by == Some(id) {
                field.ball.release_to_neutral();
            }
            if field.ball.last_shooter == Some(id) {
                field.ball.last_shooter = None;
            }
        }
    }

    info!(player_id = %id, player_count = state.players.len(), "Player left arena");
    true
}
