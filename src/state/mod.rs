/// Authoritative per-room state and message handling.
pub mod room;
/// Room phase machine.
pub mod state_machine;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    services::room_service::{self, RoomCommand},
};

/// Application state shared across handlers and room tasks.
pub type SharedState = Arc<AppState>;

#[derive(Clone, Debug)]
/// Handle used to push commands to a running room task.
pub struct RoomHandle {
    room_id: String,
    instance: Uuid,
    tx: mpsc::UnboundedSender<RoomCommand>,
    connections: Arc<AtomicUsize>,
    created_at: SystemTime,
}

impl RoomHandle {
    /// Wrap the command sender of a freshly spawned room task.
    pub(crate) fn new(room_id: String, tx: mpsc::UnboundedSender<RoomCommand>) -> Self {
        Self {
            room_id,
            instance: Uuid::new_v4(),
            tx,
            connections: Arc::new(AtomicUsize::new(0)),
            created_at: SystemTime::now(),
        }
    }

    /// Identifier of the room.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Identifier of this room task; a retired and recreated room gets a new one.
    pub fn instance(&self) -> Uuid {
        self.instance
    }

    /// When the room task was spawned.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Number of connections currently attached through the registry.
    pub fn attached(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Queue a command for the room task. Returns `false` when the task is gone.
    pub fn send(&self, command: RoomCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    /// Whether the room task stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Central application state: configuration and the registry of live rooms.
pub struct AppState {
    config: Arc<AppConfig>,
    rooms: DashMap<String, RoomHandle>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config: Arc::new(config),
            rooms: DashMap::new(),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of live rooms keyed by their identifier.
    pub fn rooms(&self) -> &DashMap<String, RoomHandle> {
        &self.rooms
    }

    /// Handle of a live room, if any.
    pub fn room(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Attach a connection to `room_id`, spawning the room on first use.
    ///
    /// The attached counter is bumped while the registry entry is locked so a concurrent
    /// [`AppState::retire_room`] cannot remove the room under a joining connection.
    pub fn join_room(self: &Arc<Self>, room_id: &str) -> RoomHandle {
        let mut entry = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room_id, "creating room");
                room_service::spawn_room(self.clone(), room_id.to_string())
            });

        if entry.is_closed() {
            warn!(room_id, "room task stopped unexpectedly; recreating room");
            *entry = room_service::spawn_room(self.clone(), room_id.to_string());
        }

        entry.connections.fetch_add(1, Ordering::SeqCst);
        entry.value().clone()
    }

    /// Detach a connection previously attached with [`AppState::join_room`].
    pub fn leave_room(&self, handle: &RoomHandle) {
        handle.connections.fetch_sub(1, Ordering::SeqCst);
    }

    /// Remove the room from the registry if it is still `instance` and nobody is attached.
    pub fn retire_room(&self, room_id: &str, instance: Uuid) -> bool {
        self.rooms
            .remove_if(room_id, |_, handle| {
                handle.instance == instance && handle.attached() == 0
            })
            .is_some()
    }
}
