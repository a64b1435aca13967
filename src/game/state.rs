//! Authoritative arena state, owned by the arena task

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::entity::{Ball, Player, PlayerId, Projectile, ProjectileId, Score};
use super::rules::{ArenaRules, GameMode};

/// Deathmatch shots in flight
#[derive(Debug, Clone, Default)]
pub struct ShotField {
    pub projectiles: BTreeMap<ProjectileId, Projectile>,
    next_id: ProjectileId,
}

impl ShotField {
    /// Allocate the next projectile id. Ids are never reused.
    pub fn allocate_id(&mut self) -> ProjectileId {
        self.next_id += 1;
        self.next_id
    }
}

/// Ball-mode objective
#[derive(Debug, Clone, Default)]
pub struct BallField {
    pub ball: Ball,
    pub score: Score,
}

/// Mode-specific entities sharing the arena with the players
#[derive(Debug, Clone)]
pub enum Field {
    Deathmatch(ShotField),
    Ball(BallField),
}

impl Field {
    pub fn for_mode(mode: GameMode) -> Self {
        match mode {
            GameMode::Deathmatch => Field::Deathmatch(ShotField::default()),
            GameMode::Ball => Field::Ball(BallField::default()),
        }
    }
}

/// Everything the tick engine reads and writes.
///
/// Players live in a `BTreeMap` so every per-player pass runs in the same
/// order each tick, which keeps the simulation reproducible for a given seed
/// and input sequence.
pub struct ArenaState {
    pub rules: ArenaRules,
    pub seed: u64,
    pub tick: u64,
    pub players: BTreeMap<PlayerId, Player>,
    pub field: Field,
    pub rng: ChaCha8Rng,
}

impl ArenaState {
    pub fn new(mode: GameMode, seed: u64) -> Self {
        Self {
            rules: ArenaRules::for_mode(mode),
            seed,
            tick: 0,
            players: BTreeMap::new(),
            field: Field::for_mode(mode),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn mode(&self) -> GameMode {
        self.rules.mode
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| !p.dead).count()
    }

    pub fn projectile_count(&self) -> usize {
        match &self.field {
            Field::Deathmatch(shots) => shots.projectiles.len(),
            Field::Ball(_) => 0,
        }
    }
}

#[cfg(test)]
impl ArenaState {
    pub fn ball(&self) -> Option<&Ball> {
        match &self.field {
            Field::Ball(field) => Some(&field.ball),
            Field::Deathmatch(_) => None,
        }
    }

    pub fn score(&self) -> Option<Score> {
        match &self.field {
            Field::Ball(field) => Some(field.score),
            Field::Deathmatch(_) => None,
        }
    }
}
