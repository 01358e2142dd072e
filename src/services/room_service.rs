use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        room::{RoomDetailResponse, RoomSummary},
        ws::{InboundMessage, OutboundMessage},
    },
    services::websocket_service::{encode_message, send_message_to_websocket},
    state::{
        RoomHandle, SharedState,
        room::{ConnectionId, RoomEffect, RoomState},
        state_machine::PlanId,
    },
};

/// Commands processed one at a time by a room task.
#[derive(Debug)]
pub enum RoomCommand {
    /// A connection attached to the room.
    Connect {
        /// Identifier assigned to the connection.
        connection_id: ConnectionId,
        /// Writer channel of the connection.
        outbound: mpsc::UnboundedSender<Message>,
    },
    /// A connection went away.
    Close {
        /// Identifier of the closed connection.
        connection_id: ConnectionId,
    },
    /// A validated message from a connection.
    Inbound {
        /// Sender of the message.
        connection_id: ConnectionId,
        /// Parsed message.
        message: InboundMessage,
    },
    /// The ready-up countdown for `plan_id` is over.
    CountdownElapsed {
        /// Plan the countdown was started for.
        plan_id: PlanId,
    },
    /// The idle grace period of an empty room is over.
    RetireCheck,
    /// Read-only view of the room for the HTTP API.
    Describe {
        /// Where to send the description.
        reply: oneshot::Sender<RoomDetailResponse>,
    },
}

/// Spawn the task owning the state of `room_id` and return its handle.
pub fn spawn_room(state: SharedState, room_id: String) -> RoomHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = RoomHandle::new(room_id.clone(), tx.clone());
    let actor = RoomActor {
        room: RoomState::new(room_id, state.config()),
        state,
        handle: handle.clone(),
        tx,
        connections: HashMap::new(),
        countdown: None,
        retire_timer: None,
    };
    tokio::spawn(actor.run(rx));
    handle
}

struct RoomActor {
    state: SharedState,
    handle: RoomHandle,
    tx: mpsc::UnboundedSender<RoomCommand>,
    room: RoomState,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    countdown: Option<(PlanId, JoinHandle<()>)>,
    retire_timer: Option<JoinHandle<()>>,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                RoomCommand::Connect {
                    connection_id,
                    outbound,
                } => {
                    if let Some(timer) = self.retire_timer.take() {
                        timer.abort();
                    }
                    self.connections.insert(connection_id.clone(), outbound);
                    let effects = self.room.connect(&connection_id);
                    self.execute(effects);
                }
                RoomCommand::Close { connection_id } => {
                    self.connections.remove(&connection_id);
                    self.room.close(&connection_id);
                    if self.handle.attached() == 0 {
                        self.schedule_retire();
                    }
                }
                RoomCommand::Inbound {
                    connection_id,
                    message,
                } => {
                    debug!(
                        room_id = %self.handle.room_id(),
                        conn_id = %connection_id,
                        kind = message.kind(),
                        "handling message"
                    );
                    let effects = self.room.handle(&connection_id, &message);
                    self.execute(effects);
                }
                RoomCommand::CountdownElapsed { plan_id } => {
                    if self.countdown.as_ref().is_some_and(|(id, _)| *id == plan_id) {
                        self.countdown = None;
                    }
                    let effects = self.room.countdown_elapsed(plan_id);
                    self.execute(effects);
                }
                RoomCommand::RetireCheck => {
                    self.retire_timer = None;
                    if self
                        .state
                        .retire_room(self.handle.room_id(), self.handle.instance())
                    {
                        info!(room_id = %self.handle.room_id(), "retiring idle room");
                        break;
                    }
                }
                RoomCommand::Describe { reply } => {
                    let _ = reply.send(self.describe());
                }
            }
        }

        if let Some((_, timer)) = self.countdown.take() {
            timer.abort();
        }
    }

    fn execute(&mut self, effects: Vec<RoomEffect>) {
        for effect in effects {
            match effect {
                RoomEffect::Send {
                    connection_id,
                    message,
                } => match self.connections.get(&connection_id) {
                    Some(tx) => {
                        if send_message_to_websocket(tx, &message).is_err() {
                            debug!(conn_id = %connection_id, "connection closed before send");
                        }
                    }
                    None => debug!(conn_id = %connection_id, "no writer for connection"),
                },
                RoomEffect::Broadcast(message) => self.broadcast(&message),
                RoomEffect::BroadcastMirror => {
                    let mirror = OutboundMessage::Mirror(self.room.mirror());
                    self.broadcast(&mirror);
                }
                RoomEffect::ScheduleCountdown(plan_id) => self.schedule_countdown(plan_id),
                RoomEffect::CancelCountdown(plan_id) => {
                    if let Some((id, timer)) = self.countdown.take() {
                        if id == plan_id {
                            timer.abort();
                        } else {
                            self.countdown = Some((id, timer));
                        }
                    }
                }
            }
        }
    }

    /// Serialize once and push the same frame to every attached connection.
    fn broadcast(&self, message: &OutboundMessage) {
        let Some(frame) = encode_message(message) else {
            return;
        };

        for (connection_id, tx) in &self.connections {
            if tx.send(frame.clone()).is_err() {
                debug!(
                    room_id = %self.handle.room_id(),
                    conn_id = %connection_id,
                    "skipping closed connection"
                );
            }
        }
    }

    fn schedule_countdown(&mut self, plan_id: PlanId) {
        let delay = self.state.config().countdown();
        let tx = self.tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RoomCommand::CountdownElapsed { plan_id });
        });

        if let Some((previous, old_timer)) = self.countdown.replace((plan_id, timer)) {
            warn!(room_id = %self.handle.room_id(), plan_id = %previous, "replacing countdown timer");
            old_timer.abort();
        }
    }

    fn schedule_retire(&mut self) {
        let ttl = self.state.config().room_idle_ttl();
        debug!(room_id = %self.handle.room_id(), ttl_ms = ttl.as_millis() as u64, "room is empty");

        let tx = self.tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let _ = tx.send(RoomCommand::RetireCheck);
        });

        if let Some(old_timer) = self.retire_timer.replace(timer) {
            old_timer.abort();
        }
    }

    fn describe(&self) -> RoomDetailResponse {
        RoomDetailResponse {
            room: RoomSummary::new(
                self.handle.room_id().to_string(),
                self.room.phase().into(),
                self.room.player_count(),
                self.handle.created_at(),
            ),
            mirror: self.room.mirror(),
        }
    }
}
