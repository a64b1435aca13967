//! Players, projectiles and the ball

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rules::{arena_center, MAX_X, MAX_Y};
use super::vector::Vec2;

/// Ephemeral per-connection identity
pub type PlayerId = Uuid;

/// Monotonic projectile identity, unique for the lifetime of the arena
pub type ProjectileId = u64;

/// Ball-mode team. Serialized as `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Team {
    One,
    Two,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::One => Team::Two,
            Team::Two => Team::One,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Team::One),
            2 => Ok(Team::Two),
            other => Err(format!("team must be 1 or 2, got {other}")),
        }
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> u8 {
        team.as_u8()
    }
}

/// Latest input snapshot from a client. Untrusted intent only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Request a respawn once the death cooloff has elapsed
    pub respawn: bool,
    /// Hold the shield up (deathmatch)
    pub shield: bool,
    /// Hold to charge a ball shot, release to throw
    pub charge: bool,
    /// Click target; a shot is fired towards it (deathmatch)
    pub aim_point: Option<Vec2>,
    /// Continuous pointer position, used to aim a carried ball
    pub pointer_pos: Option<Vec2>,
}

impl InputState {
    /// Unnormalized movement direction from the directional flags
    pub fn movement(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.left {
            dir.x -= 1.0;
        }
        if self.right {
            dir.x += 1.0;
        }
        if self.up {
            dir.y -= 1.0;
        }
        if self.down {
            dir.y += 1.0;
        }
        dir
    }
}

/// Deathmatch-only player state
#[derive(Debug, Clone, PartialEq)]
pub struct Gunner {
    pub color: String,
    pub shield: bool,
}

/// Ball-mode-only player state
#[derive(Debug, Clone, PartialEq)]
pub struct Striker {
    pub team: Team,
    /// Charge of the shot being held, 0..=1
    pub shot_power: f32,
    pub charging: bool,
    pub click_start: Option<u64>,
    pub click_end: Option<u64>,
}

impl Striker {
    pub fn new(team: Team) -> Self {
        Self {
            team,
            shot_power: 0.0,
            charging: false,
            click_start: None,
            click_end: None,
        }
    }

    /// A completed press/release pair, if any
    pub fn completed_gesture(&self) -> Option<(u64, u64)> {
        match (self.click_start, self.click_end) {
            (Some(start), Some(end)) if end >= start => Some((start, end)),
            _ => None,
        }
    }
}

/// Mode-specific extension of a player record
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMode {
    Deathmatch(Gunner),
    Ball(Striker),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Vec2,
    pub input: InputState,
    pub last_shot_time: u64,
    pub last_death_time: u64,
    pub last_spawn_time: u64,
    pub dead: bool,
    pub can_respawn: bool,
    pub kills: u32,
    pub deaths: u32,
    pub mode: PlayerMode,
}

impl Player {
    pub fn new(id: PlayerId, name: String, mode: PlayerMode) -> Self {
        Self {
            id,
            name,
            position: arena_center(),
            input: InputState::default(),
            last_shot_time: 0,
            last_death_time: 0,
            last_spawn_time: 0,
            dead: false,
            can_respawn: false,
            kills: 0,
            deaths: 0,
            mode,
        }
    }

    pub fn team(&self) -> Option<Team> {
        match &self.mode {
            PlayerMode::Ball(striker) => Some(striker.team),
            PlayerMode::Deathmatch(_) => None,
        }
    }

    pub fn shielded(&self) -> bool {
        matches!(&self.mode, PlayerMode::Deathmatch(g) if g.shield)
    }

    pub fn spawn_region(&self) -> SpawnRegion {
        match self.team() {
            None => SpawnRegion::full_arena(),
            Some(team) => SpawnRegion::for_team(team),
        }
    }

    /// Place the player at a fresh spawn point and reset per-life state.
    pub fn respawn<R: Rng + ?Sized>(&mut self, rng: &mut R, now: u64) {
        self.position = self.spawn_region().random_point(rng);
        self.dead = false;
        self.can_respawn = false;
        self.input.respawn = false;
        self.input.aim_point = None;
        self.last_spawn_time = now;

        match &mut self.mode {
            PlayerMode::Deathmatch(gunner) => gunner.shield = false,
            PlayerMode::Ball(striker) => {
                striker.shot_power = 0.0;
                striker.charging = false;
                striker.click_start = None;
                striker.click_end = None;
            }
        }
    }

    pub fn kill(&mut self, now: u64) {
        self.dead = true;
        self.can_respawn = false;
        self.last_death_time = now;
        self.deaths += 1;
        if let PlayerMode::Deathmatch(gunner) = &mut self.mode {
            gunner.shield = false;
        }
    }
}

/// Inclusive rectangle spawn points are drawn from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRegion {
    pub min: Vec2,
    pub max: Vec2,
}

impl SpawnRegion {
    pub fn full_arena() -> Self {
        Self {
            min: Vec2::new(1.0, 1.0),
            max: Vec2::new(MAX_X - 1.0, MAX_Y - 1.0),
        }
    }

    pub fn for_team(team: Team) -> Self {
        match team {
            Team::One => Self {
                min: Vec2::new(1.0, 1.0),
                max: Vec2::new(MAX_X / 2.0, MAX_Y / 2.0),
            },
            Team::Two => Self {
                min: Vec2::new(MAX_X / 2.0, MAX_Y / 2.0),
                max: Vec2::new(MAX_X - 1.0, MAX_Y - 1.0),
            },
        }
    }

    #[cfg(test)]
    pub fn contains(&self, p: Vec2) -> bool {
        (self.min.x..=self.max.x).contains(&p.x) && (self.min.y..=self.max.y).contains(&p.y)
    }

    /// Whole-unit point inside the region
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let x = rng.gen_range(self.min.x as i32..=self.max.x as i32);
        let y = rng.gen_range(self.min.y as i32..=self.max.y as i32);
        Vec2::new(x as f32, y as f32)
    }
}

/// A bouncing shot (deathmatch)
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: ProjectileId,
    pub position: Vec2,
    /// Per-tick displacement, already scaled by projectile speed
    pub direction: Vec2,
    pub bounces_left: u32,
    /// Set only during the tick the projectile was fired
    pub is_new: bool,
    pub owner: Option<PlayerId>,
}

/// The single ball (ball mode)
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub position: Vec2,
    /// Per-tick displacement while in free flight
    pub direction: Vec2,
    /// Team in control, 0 when neutral
    pub team: u8,
    /// Player carrying the ball. May name a player that has since left;
    /// always resolve through the registry.
    pub caught_by: Option<PlayerId>,
    pub last_shot_time: u64,
    pub last_shooter: Option<PlayerId>,
}

impl Ball {
    pub fn new() -> Self {
        Self {
            position: arena_center(),
            direction: Vec2::ZERO,
            team: 0,
            caught_by: None,
            last_shot_time: 0,
            last_shooter: None,
        }
    }

    /// Back to the arena center, at rest and neutral
    pub fn reset(&mut self) {
        self.position = arena_center();
        self.direction = Vec2::ZERO;
        self.release_to_neutral();
    }

    pub fn release_to_neutral(&mut self) {
        self.team = 0;
        self.caught_by = None;
    }

    pub fn is_free(&self) -> bool {
        self.caught_by.is_none()
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}

/// Goal count per team (ball mode)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    #[serde(rename = "1")]
    pub team_one: u32,
    #[serde(rename = "2")]
    pub team_two: u32,
}

impl Score {
    /// Add a goal and return the team's new total
    pub fn add_goal(&mut self, team: Team) -> u32 {
        let slot = match team {
            Team::One => &mut self.team_one,
            Team::Two => &mut self.team_two,
        };
        *slot += 1;
        *slot
    }

    pub fn reset(&mut self) {
        *self = Score::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn striker(team: Team) -> Player {
        Player::new(Uuid::new_v4(), "s".into(), PlayerMode::Ball(Striker::new(team)))
    }

    #[test]
    fn test_team_one_spawns_in_its_quadrant() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut player = striker(Team::One);
        for now in 0..200 {
            player.respawn(&mut rng, now);
            let p = player.position;
            assert!((1.0..=MAX_X / 2.0).contains(&p.x), "x out of range: {}", p.x);
            assert!((1.0..=MAX_Y / 2.0).contains(&p.y), "y out of range: {}", p.y);
        }
    }

    #[test]
    fn test_team_two_spawns_in_its_quadrant() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut player = striker(Team::Two);
        for now in 0..200 {
            player.respawn(&mut rng, now);
            assert!(SpawnRegion::for_team(Team::Two).contains(player.position));
        }
    }

    #[test]
    fn test_respawn_resets_per_life_state() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut player = striker(Team::One);
        if let PlayerMode::Ball(s) = &mut player.mode {
            s.shot_power = 0.7;
            s.charging = true;
            s.click_start = Some(10);
            s.click_end = Some(20);
        }
        player.kill(100);
        player.input.respawn = true;
        player.respawn(&mut rng, 2500);

        assert!(!player.dead);
        assert!(!player.input.respawn);
        assert_eq!(player.last_spawn_time, 2500);
        assert_eq!(player.mode, PlayerMode::Ball(Striker::new(Team::One)));
    }

    #[test]
    fn test_kill_drops_shield() {
        let mut player = Player::new(
            Uuid::new_v4(),
            "g".into(),
            PlayerMode::Deathmatch(Gunner { color: "#fff".into(), shield: true }),
        );
        player.kill(42);
        assert!(player.dead);
        assert!(!player.shielded());
        assert_eq!(player.last_death_time, 42);
        assert_eq!(player.deaths, 1);
    }

    #[test]
    fn test_ball_reset() {
        let mut ball = Ball::new();
        ball.position = Vec2::new(3.0, 4.0);
        ball.direction = Vec2::new(9.0, 0.0);
        ball.team = 2;
        ball.caught_by = Some(Uuid::new_v4());
        ball.reset();
        assert_eq!(ball.position, arena_center());
        assert_eq!(ball.direction, Vec2::ZERO);
        assert_eq!(ball.team, 0);
        assert!(ball.is_free());
    }

    #[test]
    fn test_team_wire_format() {
        assert_eq!(serde_json::to_string(&Team::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Team>("1").unwrap(), Team::One);
        assert!(serde_json::from_str::<Team>("3").is_err());
    }

    #[test]
    fn test_movement_cancels_opposites() {
        let input = InputState { left: true, right: true, up: true, ..Default::default() };
        assert_eq!(input.movement(), Vec2::new(0.0, -1.0));
    }
}
