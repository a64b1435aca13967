//! Arena task: the single writer of simulation state

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{unix_millis, Timer, SIMULATION_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{JoinRequest, ServerMsg};

use super::engine;
use super::entity::{InputState, PlayerId};
use super::rules::GameMode;
use super::session::{self, JoinError};
use super::state::ArenaState;

/// Mutation requests from connection handlers, applied at the next tick
/// boundary in arrival order
#[derive(Debug)]
pub enum ArenaCommand {
    Join {
        player_id: PlayerId,
        request: JoinRequest,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Input {
        player_id: PlayerId,
        input: InputState,
    },
    Disconnect {
        player_id: PlayerId,
    },
}

/// Counters published for the health endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArenaStats {
    pub tick: u64,
    pub players: usize,
    pub alive: usize,
    pub projectiles: usize,
    pub last_tick_micros: u64,
    pub overruns: u64,
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub mode: GameMode,
    pub command_tx: mpsc::Sender<ArenaCommand>,
    pub snapshot_tx: broadcast::Sender<ServerMsg>,
    pub stats: Arc<RwLock<ArenaStats>>,
}

impl ArenaHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    pub fn stats(&self) -> ArenaStats {
        self.stats.read().clone()
    }

    /// Ask the arena to add a player and wait for the verdict
    pub async fn join(&self, player_id: PlayerId, request: JoinRequest) -> Result<(), ArenaError> {
        let (reply, verdict) = oneshot::channel();
        self.command_tx
            .send(ArenaCommand::Join { player_id, request, reply })
            .await
            .map_err(|_| ArenaError::Closed)?;
        verdict.await.map_err(|_| ArenaError::Closed)?.map_err(ArenaError::Join)
    }

    pub async fn input(&self, player_id: PlayerId, input: InputState) -> Result<(), ArenaError> {
        self.command_tx
            .send(ArenaCommand::Input { player_id, input })
            .await
            .map_err(|_| ArenaError::Closed)
    }

    pub async fn disconnect(&self, player_id: PlayerId) -> Result<(), ArenaError> {
        self.command_tx
            .send(ArenaCommand::Disconnect { player_id })
            .await
            .map_err(|_| ArenaError::Closed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error(transparent)]
    Join(#[from] JoinError),

    #[error("arena is not running")]
    Closed,
}

/// The authoritative arena
pub struct GameArena {
    state: ArenaState,
    command_rx: mpsc::Receiver<ArenaCommand>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    stats: Arc<RwLock<ArenaStats>>,
}

impl GameArena {
    pub fn new(mode: GameMode, seed: u64) -> (Self, ArenaHandle) {
        let (command_tx, command_rx) = mpsc::channel(1024);
        let (snapshot_tx, _) = broadcast::channel(64);
        let stats = Arc::new(RwLock::new(ArenaStats::default()));

        let handle = ArenaHandle {
            mode,
            command_tx,
            snapshot_tx: snapshot_tx.clone(),
            stats: stats.clone(),
        };

        let arena = Self {
            state: ArenaState::new(mode, seed),
            command_rx,
            snapshot_tx,
            stats,
        };

        (arena, handle)
    }

    /// Run the fixed-rate tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            mode = %self.state.mode(),
            seed = self.state.seed,
            tps = SIMULATION_TPS,
            "Arena started"
        );

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            if !self.drain_commands() {
                info!("All arena handles dropped, stopping");
                break;
            }

            self.step(unix_millis());
        }
    }

    /// Apply queued connection events. Returns false once the channel is
    /// closed and empty.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(mpsc::error::TryRecvError::Empty) => return true,
                Err(mpsc::error::TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: ArenaCommand) {
        match command {
            ArenaCommand::Join { player_id, request, reply } => {
                let result = session::join(&mut self.state, player_id, &request, unix_millis());
                if let Err(e) = &result {
                    debug!(player_id = %player_id, error = %e, "Join rejected");
                }
                // The connection may already be gone
                let _ = reply.send(result);
            }
            ArenaCommand::Input { player_id, input } => {
                session::update_input(&mut self.state, player_id, input);
            }
            ArenaCommand::Disconnect { player_id } => {
                session::disconnect(&mut self.state, player_id);
            }
        }
    }

    /// One tick: simulate, publish, record timing
    fn step(&mut self, now: u64) {
        let timer = Timer::new();
        let snapshot = engine::tick(&mut self.state, now);

        // No receivers just means nobody is connected
        let _ = self.snapshot_tx.send(ServerMsg::State(snapshot));

        let elapsed = timer.elapsed_micros();
        let mut stats = self.stats.write();
        stats.tick = self.state.tick;
        stats.players = self.state.players.len();
        stats.alive = self.state.alive_count();
        stats.projectiles = self.state.projectile_count();
        stats.last_tick_micros = elapsed;
        if elapsed > TICK_DURATION_MICROS {
            stats.overruns += 1;
            warn!(
                tick = self.state.tick,
                elapsed_micros = elapsed,
                budget_micros = TICK_DURATION_MICROS,
                "Tick overran its budget"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use uuid::Uuid;

    fn dm_join() -> JoinRequest {
        JoinRequest { name: "ada".into(), color: Some("#ff0000".into()), team: None }
    }

    #[test]
    fn test_step_publishes_snapshot_and_stats() {
        let (mut arena, handle) = GameArena::new(GameMode::Deathmatch, 9);
        let mut rx = handle.subscribe();
        let id = Uuid::new_v4();
        session::join(&mut arena.state, id, &dm_join(), 0).unwrap();

        arena.step(1_000);

        let msg = assert_ok!(rx.try_recv());
        let ServerMsg::State(snapshot) = msg else {
            panic!("expected a state snapshot");
        };
        assert_eq!(snapshot.tick, 1);
        assert!(snapshot.players.contains_key(&id));
        let stats = handle.stats();
        assert_eq!(stats.tick, 1);
        assert_eq!(stats.players, 1);
    }

    #[test]
    fn test_queued_commands_apply_in_order() {
        let (mut arena, handle) = GameArena::new(GameMode::Deathmatch, 9);
        let id = Uuid::new_v4();
        let (reply, mut verdict) = oneshot::channel();
        assert_ok!(handle.command_tx.try_send(ArenaCommand::Join { player_id: id, request: dm_join(), reply }));
        assert_ok!(handle.command_tx.try_send(ArenaCommand::Input {
            player_id: id,
            input: InputState { up: true, ..Default::default() },
        }));
        assert_ok!(handle.command_tx.try_send(ArenaCommand::Disconnect { player_id: id }));

        assert!(arena.drain_commands());
        assert!(matches!(verdict.try_recv(), Ok(Ok(()))));
        assert!(arena.state.players.is_empty());
    }

    #[tokio::test]
    async fn test_join_rejection_reaches_caller() {
        let (arena, handle) = GameArena::new(GameMode::Ball, 9);
        tokio::spawn(arena.run());

        let result = handle
            .join(Uuid::new_v4(), JoinRequest { name: "x".into(), color: None, team: Some(7) })
            .await;
        assert!(matches!(result, Err(ArenaError::Join(JoinError::InvalidTeam))));

        let id = Uuid::new_v4();
        assert_ok!(handle.join(id, JoinRequest { name: "x".into(), color: None, team: Some(1) }).await);
        let mut rx = handle.subscribe();
        let msg = assert_ok!(rx.recv().await);
        assert!(matches!(msg, ServerMsg::State(s) if s.players.contains_key(&id)));
    }

    #[test]
    fn test_drain_reports_closed_channel() {
        let (mut arena, handle) = GameArena::new(GameMode::Deathmatch, 9);
        drop(handle);
        assert!(!arena.drain_commands());
    }
}
