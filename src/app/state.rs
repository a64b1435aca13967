//! Application state shared across routes

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::config::Config;
use crate::game::entity::PlayerId;
use crate::game::ArenaHandle;

/// Transport-level record of an open WebSocket
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connected_at: DateTime<Utc>,
    /// Set once the arena accepted a join from this connection
    pub joined: bool,
}

/// Open connections, keyed by the id handed out at upgrade time
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<PlayerId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, id: PlayerId) {
        self.connections.insert(
            id,
            ConnectionInfo {
                connected_at: Utc::now(),
                joined: false,
            },
        );
    }

    pub fn mark_joined(&self, id: &PlayerId) {
        if let Some(mut info) = self.connections.get_mut(id) {
            info.joined = true;
        }
    }

    pub fn close(&self, id: &PlayerId) -> Option<ConnectionInfo> {
        self.connections.remove(id).map(|(_, info)| info)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn joined_count(&self) -> usize {
        self.connections.iter().filter(|c| c.value().joined).count()
    }

    /// Age in seconds of the longest-lived open connection
    pub fn oldest_age_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.connections
            .iter()
            .map(|c| c.value().connected_at)
            .min()
            .map(|opened| (now - opened).num_seconds().max(0))
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(config: Config, arena: ArenaHandle) -> Self {
        Self {
            config: Arc::new(config),
            arena,
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }
}
