//! Player movement and wall handling

use super::entity::{Ball, Player, Projectile};
use super::rules::{clamp_to_arena, in_bounds, ArenaRules, MAX_X, MAX_Y, MIN_X, MIN_Y};
use super::vector::Vec2;

/// Outcome of moving the free ball one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallStep {
    Moved,
    OutOfBounds,
}

/// Physics system for integrating positions each tick
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Move a live player from its directional flags.
    ///
    /// Diagonals are normalized so every direction moves at `player_speed`.
    /// The arena edge is a hard clamp; players never bounce.
    pub fn move_player(player: &mut Player, rules: &ArenaRules) {
        let step = player.input.movement().normalize() * rules.player_speed;
        player.position = clamp_to_arena(player.position + step);
    }

    /// Advance a projectile one tick, bouncing off walls.
    /// Returns false when the projectile should be removed.
    pub fn advance_projectile(projectile: &mut Projectile) -> bool {
        let start = projectile.position;
        let next = start + projectile.direction;
        if in_bounds(next) {
            projectile.position = next;
            return true;
        }

        if projectile.bounces_left == 0 {
            return false;
        }

        projectile.direction = Self::bounce_direction(next, projectile.direction);
        projectile.position = clamp_to_arena(start + projectile.direction);
        projectile.bounces_left -= 1;
        true
    }

    /// Invert each axis of `direction` that carried `next` past a wall
    fn bounce_direction(next: Vec2, direction: Vec2) -> Vec2 {
        let mut bounced = direction;
        if next.x < MIN_X || next.x > MAX_X {
            bounced.x = -bounced.x;
        }
        if next.y < MIN_Y || next.y > MAX_Y {
            bounced.y = -bounced.y;
        }
        bounced
    }

    /// Move a free ball along its direction. The ball does not bounce.
    pub fn advance_ball(ball: &mut Ball) -> BallStep {
        let next = ball.position + ball.direction;
        if !in_bounds(next) {
            return BallStep::OutOfBounds;
        }
        ball.position = next;
        BallStep::Moved
    }
}
