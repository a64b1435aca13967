//! Ball mode: charge gestures, possession, goals and rounds

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::ws::protocol::{GameEvent, KillCause};

use super::entity::{Ball, Player, PlayerId, PlayerMode, Striker, Team};
use super::geometry::{point_on_circle_towards, segment_intersects_circle};
use super::physics::{BallStep, PhysicsSystem};
use super::rules::{clamp_to_arena, ArenaRules, BALL_CATCH_RADIUS, GOAL_ONE, GOAL_RADIUS, GOAL_TWO};
use super::state::BallField;
use super::vector::Vec2;

pub struct BallSystem;

impl BallSystem {
    /// Track press/release edges of the charge button.
    pub fn apply_striker_input(striker: &mut Striker, charge: bool, rules: &ArenaRules, now: u64) {
        if charge && !striker.charging {
            striker.charging = true;
            striker.click_start = Some(now);
            striker.click_end = None;
        } else if !charge && striker.charging {
            striker.charging = false;
            striker.click_end = Some(now);
        }

        striker.shot_power = match (striker.charging, striker.click_start) {
            (true, Some(start)) => Self::charge_fraction(now.saturating_sub(start), rules),
            _ => 0.0,
        };
    }

    /// Hold duration as a fraction of the maximum channel, 0..=1
    pub fn charge_fraction(held_ms: u64, rules: &ArenaRules) -> f32 {
        if rules.max_shot_channel_ms == 0 {
            return 0.0;
        }
        held_ms.min(rules.max_shot_channel_ms) as f32 / rules.max_shot_channel_ms as f32
    }

    /// Launch speed for a press held `held_ms`
    pub fn shot_speed(held_ms: u64, rules: &ArenaRules) -> f32 {
        rules.max_shot_speed * Self::charge_fraction(held_ms, rules)
    }

    /// Run possession, flight, goals and catches for one tick
    pub fn update(
        players: &mut BTreeMap<PlayerId, Player>,
        field: &mut BallField,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        if let Some(holder_id) = field.ball.caught_by {
            match players.get_mut(&holder_id) {
                Some(holder) if !holder.dead => {
                    Self::carry(holder, &mut field.ball, rules, now, events);
                    if !field.ball.is_free() {
                        Self::challenge_holder(players, &mut field.ball, holder_id, rules, now, events);
                    }
                    return;
                }
                _ => {
                    debug!(player_id = %holder_id, "Ball holder gone, ball is neutral");
                    field.ball.release_to_neutral();
                }
            }
        }

        Self::fly(players, field, rules, now, events);
    }

    /// Keep a possessed ball at the holder's aim point, throw it on release
    fn carry(holder: &mut Player, ball: &mut Ball, rules: &ArenaRules, now: u64, events: &mut Vec<GameEvent>) {
        let toward = holder.input.pointer_pos.unwrap_or(ball.position);
        match point_on_circle_towards(holder.position, BALL_CATCH_RADIUS, toward) {
            Ok(point) => ball.position = clamp_to_arena(point),
            Err(e) => debug!(player_id = %holder.id, error = %e, "Keeping ball position"),
        }
        ball.direction = Vec2::ZERO;

        let PlayerMode::Ball(striker) = &mut holder.mode else {
            return;
        };
        let Some((start, end)) = striker.completed_gesture() else {
            return;
        };
        striker.click_start = None;
        striker.click_end = None;

        let held = end - start;
        let Some(aim) = (ball.position - holder.position).try_normalize() else {
            return;
        };
        let speed = Self::shot_speed(held, rules);
        ball.direction = aim * speed;
        ball.caught_by = None;
        ball.last_shot_time = now;
        ball.last_shooter = Some(holder.id);

        events.push(GameEvent::Throw { player_id: holder.id, speed });
    }

    fn fly(
        players: &mut BTreeMap<PlayerId, Player>,
        field: &mut BallField,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let start = field.ball.position;
        let end = start + field.ball.direction;

        // A ball in its own team's goal counts for the other team
        let goals = [(GOAL_ONE, Team::Two), (GOAL_TWO, Team::One)];
        if let Some(&(_, scorer)) = goals
            .iter()
            .find(|(goal, _)| segment_intersects_circle(start, end, *goal, GOAL_RADIUS))
        {
            Self::score_goal(players, field, scorer, rules, now, events);
            return;
        }

        if PhysicsSystem::advance_ball(&mut field.ball) == BallStep::OutOfBounds {
            field.ball.reset();
            events.push(GameEvent::BallOut);
            return;
        }

        Self::resolve_catch(players, &mut field.ball, start, end, rules, now, events);
    }

    /// Live players whose catch radius the ball's travel segment touches
    fn claimants(players: &BTreeMap<PlayerId, Player>, start: Vec2, end: Vec2) -> Vec<(PlayerId, Team)> {
        players
            .values()
            .filter(|p| !p.dead)
            .filter_map(|p| p.team().map(|team| (p.id, team, p.position)))
            .filter(|(_, _, pos)| segment_intersects_circle(start, end, *pos, BALL_CATCH_RADIUS))
            .map(|(id, team, _)| (id, team))
            .collect()
    }

    fn in_catch_cooldown(ball: &Ball, rules: &ArenaRules, now: u64) -> bool {
        now.saturating_sub(ball.last_shot_time) < rules.min_shot_duration_ms
    }

    /// Any other live player touching a carried ball contests it with the
    /// holder, which leaves the ball neutral.
    fn challenge_holder(
        players: &BTreeMap<PlayerId, Player>,
        ball: &mut Ball,
        holder_id: PlayerId,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        if Self::in_catch_cooldown(ball, rules, now) {
            return;
        }

        let challengers = Self::claimants(players, ball.position, ball.position)
            .into_iter()
            .filter(|(id, _)| *id != holder_id)
            .count();
        if challengers == 0 {
            return;
        }

        ball.release_to_neutral();
        events.push(GameEvent::Contested {
            claimants: challengers as u32 + 1,
        });
    }

    /// Hand the ball to a single claimant. Two or more claimants in the same
    /// tick leave it neutral instead of picking one.
    fn resolve_catch(
        players: &BTreeMap<PlayerId, Player>,
        ball: &mut Ball,
        start: Vec2,
        end: Vec2,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        if Self::in_catch_cooldown(ball, rules, now) {
            return;
        }

        let claimants = Self::claimants(players, start, end);
        match claimants.as_slice() {
            [] => {}
            [(player_id, team)] => {
                ball.caught_by = Some(*player_id);
                ball.team = team.as_u8();
                ball.direction = Vec2::ZERO;
                events.push(GameEvent::Catch { player_id: *player_id, team: *team });
            }
            many => {
                ball.release_to_neutral();
                events.push(GameEvent::Contested { claimants: many.len() as u32 });
            }
        }
    }

    fn score_goal(
        players: &mut BTreeMap<PlayerId, Player>,
        field: &mut BallField,
        scorer: Team,
        rules: &ArenaRules,
        now: u64,
        events: &mut Vec<GameEvent>,
    ) {
        let total = field.score.add_goal(scorer);
        let scored_by = field.ball.last_shooter.take();
        field.ball.reset();
        events.push(GameEvent::Goal {
            team: scorer,
            score: field.score,
            scored_by,
        });
        info!(team = scorer.as_u8(), total, scored_by = ?scored_by, "Goal scored");

        if total < rules.win_threshold {
            return;
        }

        let losers = scorer.opponent();
        for player in players.values_mut().filter(|p| !p.dead && p.team() == Some(losers)) {
            player.kill(now);
            events.push(GameEvent::Kill {
                killer_id: None,
                victim_id: player.id,
                cause: KillCause::RoundLost,
            });
        }
        field.score.reset();
        events.push(GameEvent::RoundWon { team: scorer });
        info!(team = scorer.as_u8(), "Round won");
    }
}
