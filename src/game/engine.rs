//! The authoritative tick pipeline
//!
//! `tick` advances the arena by one step at the caller-supplied timestamp.
//! It never reads the wall clock, so tests drive it with synthetic `now`
//! values and hand-built inputs.

use rand_chacha::ChaCha8Rng;

use crate::ws::protocol::{GameEvent, StateSnapshot};

use super::ball::BallSystem;
use super::combat::CombatSystem;
use super::entity::{Player, PlayerMode};
use super::physics::PhysicsSystem;
use super::rules::ArenaRules;
use super::snapshot::SnapshotBuilder;
use super::state::{ArenaState, Field};

/// Run one simulation step and return the snapshot to broadcast.
///
/// Stages run in a fixed order: start-of-tick cleanup, input application,
/// projectile or ball update, snapshot, end-of-tick cleanup.
pub fn tick(state: &mut ArenaState, now: u64) -> StateSnapshot {
    state.tick += 1;
    let mut events = Vec::new();

    begin_tick(state);
    apply_inputs(state, now, &mut events);
    update_field(state, now, &mut events);

    let snapshot = SnapshotBuilder::build(state, now, events);
    end_tick(state);
    snapshot
}

fn begin_tick(state: &mut ArenaState) {
    for player in state.players.values_mut() {
        player.can_respawn = false;
    }
}

fn apply_inputs(state: &mut ArenaState, now: u64, events: &mut Vec<GameEvent>) {
    let ArenaState {
        rules,
        players,
        field,
        rng,
        ..
    } = state;

    for player in players.values_mut() {
        if player.dead {
            check_respawn(player, rules, rng, now, events);
            continue;
        }

        PhysicsSystem::move_player(player, rules);

        match &mut *field {
            Field::Deathmatch(shots) => CombatSystem::apply_gunner_input(player, shots, rules, now, events),
            Field::Ball(_) => {
                if let PlayerMode::Ball(striker) = &mut player.mode {
                    BallSystem::apply_striker_input(striker, player.input.charge, rules, now);
                }
            }
        }
    }
}

/// Dead players only wait out the cooloff, then respawn on request
fn check_respawn(
    player: &mut Player,
    rules: &ArenaRules,
    rng: &mut ChaCha8Rng,
    now: u64,
    events: &mut Vec<GameEvent>,
) {
    if now.saturating_sub(player.last_death_time) <= rules.death_cooloff_ms {
        return;
    }

    if player.input.respawn {
        player.respawn(rng, now);
        events.push(GameEvent::Respawn { player_id: player.id });
    } else {
        player.can_respawn = true;
    }
}

fn update_field(state: &mut ArenaState, now: u64, events: &mut Vec<GameEvent>) {
    let ArenaState {
        rules,
        players,
        field,
        ..
    } = state;

    match field {
        Field::Deathmatch(shots) => CombatSystem::update_projectiles(players, shots, rules, now, events),
        Field::Ball(ball_field) => BallSystem::update(players, ball_field, rules, now, events),
    }
}

fn end_tick(state: &mut ArenaState) {
    if let Field::Deathmatch(shots) = &mut state.field {
        for projectile in shots.projectiles.values_mut() {
            projectile.is_new = false;
        }
    }

    for player in state.players.values_mut() {
        if let PlayerMode::Ball(striker) = &mut player.mode {
            if striker.completed_gesture().is_some() {
                striker.click_start = None;
                striker.click_end = None;
            }
        }
    }
}
