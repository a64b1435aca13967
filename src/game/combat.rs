//! Combat system - firing, swept hit detection, shield reflection

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::ws::protocol::{GameEvent, KillCause};

use super::entity::{Player, PlayerId, PlayerMode, Projectile, ProjectileId};
use super::geometry::{point_on_circle_towards, reflect, segment_intersects_circle};
use super::physics::PhysicsSystem;
use super::rules::{clamp_to_arena, ArenaRules, PLAYER_RADIUS};
use super::state::ShotField;
use super::vector::Vec2;

/// What a projectile ran into during its sweep
#[derive(Debug, Clone, Copy, PartialEq)]
struct HitTarget {
    defender_id: PlayerId,
    center: Vec2,
    shielded: bool,
}

/// Combat system for managing shots and hits
pub struct CombatSystem;

impl CombatSystem {
    /// Check the fire interval
    pub fn can_fire(player: &Player, rules: &ArenaRules, now: u64) -> bool {
        now.saturating_sub(player.last_shot_time) > rules.fire_interval_ms
    }

    /// Within the spawn protection window shots pass through the player
    pub fn spawn_protected(player: &Player, rules: &ArenaRules, now: u64) -> bool {
        now.saturating_sub(player.last_spawn_time) < rules.spawn_protection_ms
    }

    /// Raise or lower the shield and fire at the aim point if allowed.
    ///
    /// A shielded player cannot fire. The aim point is consumed by a shot so a
    /// single click never fires twice.
    pub fn apply_gunner_input(
        player: &mut Player,
        shots: &mut ShotField,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let PlayerMode::Deathmatch(gunner) = &mut player.mode else {
            return;
        };
        gunner.shield = player.input.shield;
        if gunner.shield {
            return;
        }

        let Some(aim) = player.input.aim_point else {
            return;
        };
        if !Self::can_fire(player, rules, now) {
            return;
        }
        let Some(dir) = (aim - player.position).try_normalize() else {
            // Clicked on itself
            return;
        };

        let id = shots.allocate_id();
        let start = clamp_to_arena(player.position + dir * (PLAYER_RADIUS + 1.0));
        shots.projectiles.insert(
            id,
            Projectile {
                id,
                position: start,
                direction: dir * rules.projectile_speed,
                bounces_left: rules.bounce_budget,
                is_new: true,
                owner: Some(player.id),
            },
        );
        player.last_shot_time = now;
        player.input.aim_point = None;

        events.push(GameEvent::Shot {
            shooter_id: player.id,
            projectile_id: id,
            x: start.x,
            y: start.y,
        });
    }

    /// Nearest live, unprotected player whose hit circle the sweep crosses
    fn first_hit(
        players: &BTreeMap<PlayerId, Player>,
        start: Vec2,
        end: Vec2,
        rules: &ArenaRules,
        now: u64,
    ) -> Option<HitTarget> {
        players
            .values()
            .filter(|p| !p.dead && !Self::spawn_protected(p, rules, now))
            .filter(|p| segment_intersects_circle(start, end, p.position, PLAYER_RADIUS))
            .min_by(|a, b| {
                let da = a.position.distance(start);
                let db = b.position.distance(start);
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .map(|p| HitTarget {
                defender_id: p.id,
                center: p.position,
                shielded: p.shielded(),
            })
    }

    /// Sweep, resolve hits and advance every projectile for one tick
    pub fn update_projectiles(
        players: &mut BTreeMap<PlayerId, Player>,
        shots: &mut ShotField,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let mut expired: Vec<ProjectileId> = Vec::new();

        for (&id, projectile) in shots.projectiles.iter_mut() {
            let start = projectile.position;
            let end = start + projectile.direction;

            if let Some(hit) = Self::first_hit(players, start, end, rules, now) {
                if hit.shielded {
                    Self::reflect_off_shield(projectile, hit, events);
                } else {
                    Self::kill_defender(players, projectile, hit, now, events);
                    expired.push(id);
                    continue;
                }
            }

            if !PhysicsSystem::advance_projectile(projectile) {
                expired.push(id);
            }
        }

        for id in expired {
            shots.projectiles.remove(&id);
        }
    }

    /// Bounce a projectile off a shield. The shield stays up and the
    /// projectile stays in play.
    fn reflect_off_shield(projectile: &mut Projectile, hit: HitTarget, events: &mut Vec<GameEvent>) {
        let point = match point_on_circle_towards(hit.center, PLAYER_RADIUS, projectile.position) {
            Ok(point) => point,
            Err(e) => {
                debug!(projectile_id = projectile.id, error = %e, "Skipping shield reflection");
                return;
            }
        };

        let normal = (point - hit.center).normalize();
        // A shot already leaving the shield keeps going
        if projectile.direction.dot(normal) >= 0.0 {
            return;
        }

        projectile.direction = reflect(projectile.direction, normal);
        projectile.position = clamp_to_arena(point);
        events.push(GameEvent::Reflect {
            defender_id: hit.defender_id,
            projectile_id: projectile.id,
        });
    }

    fn kill_defender(
        players: &mut BTreeMap<PlayerId, Player>,
        projectile: &Projectile,
        hit: HitTarget,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(defender) = players.get_mut(&hit.defender_id) else {
            return;
        };
        defender.kill(now);

        // The owner may have disconnected since firing
        let killer_id = projectile
            .owner
            .filter(|owner| *owner != hit.defender_id)
            .and_then(|owner| players.get_mut(&owner))
            .map(|shooter| {
                shooter.kills += 1;
                shooter.id
            });

        events.push(GameEvent::Kill {
            killer_id,
            victim_id: hit.defender_id,
            cause: KillCause::Shot,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::{Gunner, InputState};
    use crate::game::rules::GameMode;
    use uuid::Uuid;

    const NOW: u64 = 10_000;

    fn rules() -> ArenaRules {
        ArenaRules::for_mode(GameMode::Deathmatch)
    }

    fn gunner(x: f32, y: f32) -> Player {
        let mut p = Player::new(
            Uuid::new_v4(),
            "g".into(),
            PlayerMode::Deathmatch(Gunner { color: "#123456".into(), shield: false }),
        );
        p.position = Vec2::new(x, y);
        p
    }

    fn shot_towards(shots: &mut ShotField, from: Vec2, dir: Vec2, owner: Option<PlayerId>) -> ProjectileId {
        let id = shots.allocate_id();
        shots.projectiles.insert(
            id,
            Projectile { id, position: from, direction: dir, bounces_left: 3, is_new: false, owner },
        );
        id
    }

    #[test]
    fn test_fire_spawns_outside_own_circle() {
        let rules = rules();
        let mut shots = ShotField::default();
        let mut events = Vec::new();
        let mut p = gunner(100.0, 100.0);
        p.input = InputState { aim_point: Some(Vec2::new(200.0, 100.0)), ..Default::default() };

        CombatSystem::apply_gunner_input(&mut p, &mut shots, &rules, NOW, &mut events);

        let shot = shots.projectiles.values().next().unwrap();
        assert_eq!(shot.position, Vec2::new(111.0, 100.0));
        assert_eq!(shot.direction, Vec2::new(rules.projectile_speed, 0.0));
        assert!(shot.is_new);
        assert_eq!(shot.owner, Some(p.id));
        assert_eq!(p.last_shot_time, NOW);
        assert!(p.input.aim_point.is_none());
        assert!(matches!(events[0], GameEvent::Shot { .. }));
    }

    #[test]
    fn test_fire_interval_enforced() {
        let rules = rules();
        let mut shots = ShotField::default();
        let mut events = Vec::new();
        let mut p = gunner(100.0, 100.0);
        p.last_shot_time = NOW - rules.fire_interval_ms;
        p.input.aim_point = Some(Vec2::new(0.0, 0.0));

        CombatSystem::apply_gunner_input(&mut p, &mut shots, &rules, NOW, &mut events);
        assert!(shots.projectiles.is_empty());

        CombatSystem::apply_gunner_input(&mut p, &mut shots, &rules, NOW + 1, &mut events);
        assert_eq!(shots.projectiles.len(), 1);
    }

    #[test]
    fn test_shielded_player_cannot_fire() {
        let rules = rules();
        let mut shots = ShotField::default();
        let mut p = gunner(100.0, 100.0);
        p.input = InputState { shield: true, aim_point: Some(Vec2::new(0.0, 0.0)), ..Default::default() };

        CombatSystem::apply_gunner_input(&mut p, &mut shots, &rules, NOW, &mut Vec::new());
        assert!(p.shielded());
        assert!(shots.projectiles.is_empty());
    }

    #[test]
    fn test_aim_at_self_does_not_fire() {
        let rules = rules();
        let mut shots = ShotField::default();
        let mut p = gunner(100.0, 100.0);
        p.input.aim_point = Some(Vec2::new(100.0, 100.0));

        CombatSystem::apply_gunner_input(&mut p, &mut shots, &rules, NOW, &mut Vec::new());
        assert!(shots.projectiles.is_empty());
    }

    #[test]
    fn test_hit_kills_and_credits_owner() {
        let rules = rules();
        let shooter = gunner(50.0, 300.0);
        let victim = gunner(120.0, 300.0);
        let (shooter_id, victim_id) = (shooter.id, victim.id);
        let mut players: BTreeMap<_, _> = [(shooter.id, shooter), (victim.id, victim)].into();
        let mut shots = ShotField::default();
        shot_towards(&mut shots, Vec2::new(105.0, 300.0), Vec2::new(7.0, 0.0), Some(shooter_id));
        let mut events = Vec::new();

        CombatSystem::update_projectiles(&mut players, &mut shots, &rules, NOW, &mut events);

        assert!(shots.projectiles.is_empty());
        assert!(players[&victim_id].dead);
        assert_eq!(players[&victim_id].last_death_time, NOW);
        assert_eq!(players[&shooter_id].kills, 1);
        assert!(events.iter().any(|e| matches!(e, GameEvent::Kill { killer_id: Some(k), .. } if *k == shooter_id)));
    }

    #[test]
    fn test_hit_with_departed_owner_has_no_killer() {
        let rules = rules();
        let victim = gunner(120.0, 300.0);
        let victim_id = victim.id;
        let mut players: BTreeMap<_, _> = [(victim.id, victim)].into();
        let mut shots = ShotField::default();
        shot_towards(&mut shots, Vec2::new(105.0, 300.0), Vec2::new(7.0, 0.0), Some(Uuid::new_v4()));
        let mut events = Vec::new();

        CombatSystem::update_projectiles(&mut players, &mut shots, &rules, NOW, &mut events);

        assert!(players[&victim_id].dead);
        assert!(matches!(events[0], GameEvent::Kill { killer_id: None, .. }));
    }

    #[test]
    fn test_shield_reflects_and_projectile_survives() {
        let rules = rules();
        let mut defender = gunner(120.0, 300.0);
        if let PlayerMode::Deathmatch(g) = &mut defender.mode {
            g.shield = true;
        }
        let defender_id = defender.id;
        let mut players: BTreeMap<_, _> = [(defender.id, defender)].into();
        let mut shots = ShotField::default();
        let id = shot_towards(&mut shots, Vec2::new(105.0, 300.0), Vec2::new(7.0, 0.0), None);
        let mut events = Vec::new();

        CombatSystem::update_projectiles(&mut players, &mut shots, &rules, NOW, &mut events);

        let shot = &shots.projectiles[&id];
        assert!(shot.direction.x < 0.0);
        assert!((shot.direction.length() - 7.0).abs() < 1e-4);
        assert!(shot.position.x < 110.0);
        assert!(!players[&defender_id].dead);
        assert!(players[&defender_id].shielded());
        assert!(matches!(events[0], GameEvent::Reflect { .. }));
    }

    #[test]
    fn test_spawn_protection_lets_shot_pass() {
        let rules = rules();
        let mut victim = gunner(120.0, 300.0);
        victim.last_spawn_time = NOW - 500;
        let victim_id = victim.id;
        let mut players: BTreeMap<_, _> = [(victim.id, victim)].into();
        let mut shots = ShotField::default();
        shot_towards(&mut shots, Vec2::new(105.0, 300.0), Vec2::new(7.0, 0.0), None);

        CombatSystem::update_projectiles(&mut players, &mut shots, &rules, NOW, &mut Vec::new());

        assert!(!players[&victim_id].dead);
        assert_eq!(shots.projectiles.len(), 1);
    }

    #[test]
    fn test_nearest_target_is_hit_first() {
        let rules = rules();
        let near = gunner(112.0, 300.0);
        let far = gunner(113.0, 300.0);
        let (near_id, far_id) = (near.id, far.id);
        let mut players: BTreeMap<_, _> = [(near.id, near), (far.id, far)].into();
        let mut shots = ShotField::default();
        shot_towards(&mut shots, Vec2::new(99.0, 300.0), Vec2::new(7.0, 0.0), None);

        CombatSystem::update_projectiles(&mut players, &mut shots, &rules, NOW, &mut Vec::new());

        assert!(players[&near_id].dead);
        assert!(!players[&far_id].dead);
    }
}
