//! Snapshot building for network transmission

use crate::ws::protocol::{BallView, GameEvent, PlayerView, ProjectileView, StateSnapshot};

use super::entity::{Player, PlayerMode};
use super::state::{ArenaState, Field};

/// Builds the full per-tick state snapshot. No delta compression: every
/// snapshot carries every entity.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn build(state: &ArenaState, now: u64, events: Vec<GameEvent>) -> StateSnapshot {
        let players = state
            .players
            .iter()
            .map(|(id, p)| (*id, Self::player_view(p)))
            .collect();

        let (projectiles, ball, score) = match &state.field {
            Field::Deathmatch(shots) => {
                let projectiles = shots
                    .projectiles
                    .iter()
                    .map(|(id, shot)| {
                        (
                            *id,
                            ProjectileView {
                                x: shot.position.x,
                                y: shot.position.y,
                                is_new: shot.is_new,
                            },
                        )
                    })
                    .collect();
                (Some(projectiles), None, None)
            }
            Field::Ball(field) => {
                let ball = BallView {
                    x: field.ball.position.x,
                    y: field.ball.position.y,
                    team: field.ball.team,
                    // Only report a holder that is still registered
                    caught_by: field
                        .ball
                        .caught_by
                        .filter(|id| state.players.contains_key(id))
                        .into_iter()
                        .collect(),
                };
                (None, Some(ball), Some(field.score))
            }
        };

        StateSnapshot {
            tick: state.tick,
            server_time: now,
            mode: state.mode(),
            players,
            projectiles,
            ball,
            score,
            events,
        }
    }

    fn player_view(player: &Player) -> PlayerView {
        let (color, team, shield, shot_power) = match &player.mode {
            PlayerMode::Deathmatch(g) => (Some(g.color.clone()), None, g.shield, 0.0),
            PlayerMode::Ball(s) => (None, Some(s.team), false, s.shot_power),
        };

        PlayerView {
            x: player.position.x,
            y: player.position.y,
            name: player.name.clone(),
            color,
            team,
            dead: player.dead,
            can_respawn: player.can_respawn,
            shield,
            shot_power,
            kills: player.kills,
            deaths: player.deaths,
        }
    }
}
