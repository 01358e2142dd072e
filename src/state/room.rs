//! Authoritative state of one room and the per-phase message handling.
//!
//! Every handler mutates the room synchronously and returns the [`RoomEffect`]s the owning
//! task must carry out (sends, broadcasts, countdown timers). Nothing in here awaits.

use std::sync::Arc;

use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::{
    config::{AppConfig, CountdownPolicy, FinishPolicy},
    dto::{
        room::{FinishedResultView, MirrorSnapshot, PlayerView},
        ws::{InboundMessage, OutboundMessage},
    },
    state::state_machine::{PlanError, PlanId, RoomEvent, RoomPhase, RoomStateMachine},
};

/// Opaque identifier the transport assigns to a connection.
pub type ConnectionId = String;

/// Per-connection facts tracked by the room.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Connection this player is attached through.
    pub connection_id: ConnectionId,
    /// Display name, empty until the player picks one.
    pub name: String,
    /// Score of the last completed race.
    pub score: i64,
    /// Ready-up flag.
    pub is_ready: bool,
}

impl Player {
    fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            name: String::new(),
            score: 0,
            is_ready: false,
        }
    }
}

/// A race result in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedResult {
    /// Connection that reported the result.
    pub connection_id: ConnectionId,
    /// Reported result.
    pub result: f64,
}

/// Side effects requested by the room after handling an event.
#[derive(Debug, Clone)]
pub enum RoomEffect {
    /// Send a message to a single connection.
    Send {
        /// Receiving connection.
        connection_id: ConnectionId,
        /// Message to deliver.
        message: OutboundMessage,
    },
    /// Send a message to every attached connection.
    Broadcast(OutboundMessage),
    /// Send the current [`MirrorSnapshot`] to every attached connection.
    BroadcastMirror,
    /// Fire [`RoomState::countdown_elapsed`] with this plan once the countdown is over.
    ScheduleCountdown(PlanId),
    /// The countdown for this plan was aborted; its timer may be dropped.
    CancelCountdown(PlanId),
}

/// Rank bonus added to the result at `index` (0-based arrival order).
pub fn bonus(index: usize) -> i64 {
    match index {
        0 => 3,
        1 => 2,
        2 => 1,
        _ => 0,
    }
}

/// Score for the result at `index`: the rounded result plus its rank bonus.
///
/// Saturates at the `i64` bounds; a non-finite result counts as zero.
pub fn race_score(result: f64, index: usize) -> i64 {
    (result.round() as i64).saturating_add(bonus(index))
}

/// Build a target text of `count` words drawn at random from `words`.
pub fn generate_target_text(words: &[String], count: usize) -> String {
    let mut rng = rand::rng();
    (0..count)
        .filter_map(|_| words.choose(&mut rng))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Authoritative snapshot of one room.
#[derive(Debug)]
pub struct RoomState {
    id: String,
    config: Arc<AppConfig>,
    machine: RoomStateMachine,
    players: IndexMap<ConnectionId, Player>,
    target_text: String,
    finished_results: Vec<FinishedResult>,
}

impl RoomState {
    /// Create an empty room in the lobby.
    pub fn new(id: impl Into<String>, config: Arc<AppConfig>) -> Self {
        Self {
            id: id.into(),
            config,
            machine: RoomStateMachine::new(),
            players: IndexMap::new(),
            target_text: String::new(),
            finished_results: Vec::new(),
        }
    }

    /// Room identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current phase.
    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Look up a player by connection.
    pub fn player(&self, connection_id: &str) -> Option<&Player> {
        self.players.get(connection_id)
    }

    /// Number of players in the room.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Text of the current (or last) race.
    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    /// Results reported in the current (or last) race.
    pub fn finished_results(&self) -> &[FinishedResult] {
        &self.finished_results
    }

    /// Whether a race start is waiting on the countdown.
    pub fn countdown_pending(&self) -> bool {
        self.machine.pending_plan().is_some()
    }

    /// Register a new connection as a player.
    pub fn connect(&mut self, connection_id: &str) -> Vec<RoomEffect> {
        if self.players.contains_key(connection_id) {
            warn!(room_id = %self.id, conn_id = %connection_id, "connection already registered");
        } else {
            self.players
                .insert(connection_id.to_string(), Player::new(connection_id.to_string()));
            info!(
                room_id = %self.id,
                conn_id = %connection_id,
                players = self.players.len(),
                "player joined"
            );
        }

        vec![
            RoomEffect::Send {
                connection_id: connection_id.to_string(),
                message: OutboundMessage::Connected {
                    conn_id: connection_id.to_string(),
                },
            },
            RoomEffect::BroadcastMirror,
        ]
    }

    /// Drop the player attached through `connection_id`.
    ///
    /// Results already reported by the player stay in place and the countdown is left alone.
    pub fn close(&mut self, connection_id: &str) -> bool {
        let removed = self.players.shift_remove(connection_id).is_some();
        if removed {
            info!(
                room_id = %self.id,
                conn_id = %connection_id,
                players = self.players.len(),
                "player left"
            );
        }
        removed
    }

    /// Route an inbound message to the handler of the current phase.
    pub fn handle(&mut self, sender: &str, message: &InboundMessage) -> Vec<RoomEffect> {
        match (self.phase(), message) {
            (RoomPhase::Lobby, InboundMessage::Ready { is_ready }) => {
                self.lobby_ready(sender, *is_ready)
            }
            (RoomPhase::Lobby, InboundMessage::UpdateName { name }) => {
                self.update_name(sender, name)
            }
            (RoomPhase::Running, InboundMessage::Finished { result }) => {
                self.finished(sender, *result)
            }
            (RoomPhase::Ending, InboundMessage::Mirror) => vec![RoomEffect::BroadcastMirror],
            (RoomPhase::Ending, InboundMessage::Ready { is_ready }) => {
                self.ending_ready(sender, *is_ready)
            }
            (phase, message) => {
                debug!(
                    room_id = %self.id,
                    conn_id = %sender,
                    phase = ?phase,
                    kind = message.kind(),
                    "ignoring message not handled in this phase"
                );
                Vec::new()
            }
        }
    }

    /// Called when the countdown of `plan_id` is over.
    pub fn countdown_elapsed(&mut self, plan_id: PlanId) -> Vec<RoomEffect> {
        if self.machine.pending_plan() != Some(plan_id) {
            debug!(room_id = %self.id, plan_id = %plan_id, "ignoring stale countdown");
            return Vec::new();
        }

        if self.config.countdown_policy() == CountdownPolicy::Revalidate && !self.everyone_ready() {
            if let Err(err) = self.machine.abort(plan_id) {
                warn!(room_id = %self.id, error = %err, "failed to abort countdown");
            }
            info!(
                room_id = %self.id,
                ready = self.ready_count(),
                players = self.players.len(),
                "countdown elapsed but not everyone is ready; staying in lobby"
            );
            return Vec::new();
        }

        match self.machine.apply(plan_id) {
            Ok(phase) => {
                self.target_text =
                    generate_target_text(self.config.words(), self.config.word_count());
                self.finished_results.clear();
                info!(room_id = %self.id, phase = ?phase, players = self.players.len(), "race started");
                vec![
                    RoomEffect::Broadcast(OutboundMessage::StartGame {}),
                    RoomEffect::BroadcastMirror,
                ]
            }
            Err(err) => {
                warn!(room_id = %self.id, error = %err, "failed to start race");
                Vec::new()
            }
        }
    }

    /// Project the room into the snapshot clients reconcile against.
    pub fn mirror(&self) -> MirrorSnapshot {
        let phase = self.phase();
        let players = self.players.values().map(PlayerView::from).collect();
        let (target_text, finished_results) = match phase {
            RoomPhase::Running => (
                Some(self.target_text.clone()),
                Some(
                    self.finished_results
                        .iter()
                        .map(FinishedResultView::from)
                        .collect(),
                ),
            ),
            RoomPhase::Lobby | RoomPhase::Ending => (None, None),
        };

        MirrorSnapshot {
            phase: phase.into(),
            players,
            target_text,
            finished_results,
        }
    }

    fn ready_count(&self) -> usize {
        self.players.values().filter(|player| player.is_ready).count()
    }

    fn everyone_ready(&self) -> bool {
        !self.players.is_empty() && self.ready_count() == self.players.len()
    }

    fn lobby_ready(&mut self, sender: &str, is_ready: bool) -> Vec<RoomEffect> {
        let Some(player) = self.players.get_mut(sender) else {
            return Vec::new();
        };
        player.is_ready = is_ready;

        let mut effects = vec![RoomEffect::BroadcastMirror];
        if self.ready_count() == self.players.len() {
            match self.machine.plan(RoomEvent::CountdownElapsed) {
                Ok(plan) => {
                    info!(room_id = %self.id, plan_id = %plan.id, "everyone is ready; countdown started");
                    effects.push(RoomEffect::ScheduleCountdown(plan.id));
                }
                Err(PlanError::AlreadyPending) => {
                    debug!(room_id = %self.id, "countdown already pending");
                }
                Err(err) => {
                    warn!(room_id = %self.id, error = %err, "failed to plan race start");
                }
            }
        } else if self.config.countdown_policy() == CountdownPolicy::Revalidate {
            if let Some(plan_id) = self.machine.pending_plan() {
                match self.machine.abort(plan_id) {
                    Ok(()) => {
                        info!(room_id = %self.id, conn_id = %sender, "player un-readied; countdown cancelled");
                        effects.push(RoomEffect::CancelCountdown(plan_id));
                    }
                    Err(err) => warn!(room_id = %self.id, error = %err, "failed to cancel countdown"),
                }
            }
        }

        effects
    }

    fn update_name(&mut self, sender: &str, name: &str) -> Vec<RoomEffect> {
        let Some(player) = self.players.get_mut(sender) else {
            return Vec::new();
        };
        player.name = name.to_string();
        vec![RoomEffect::BroadcastMirror]
    }

    fn finished(&mut self, sender: &str, result: f64) -> Vec<RoomEffect> {
        if self.config.finish_policy() == FinishPolicy::Once
            && self
                .finished_results
                .iter()
                .any(|entry| entry.connection_id == sender)
        {
            warn!(room_id = %self.id, conn_id = %sender, "ignoring repeated finished report");
            return Vec::new();
        }

        self.finished_results.push(FinishedResult {
            connection_id: sender.to_string(),
            result,
        });

        if self.finished_results.len() == self.players.len() {
            self.complete_race();
        }

        vec![RoomEffect::BroadcastMirror]
    }

    fn complete_race(&mut self) {
        for (index, entry) in self.finished_results.iter().enumerate() {
            if let Some(player) = self.players.get_mut(&entry.connection_id) {
                player.score = race_score(entry.result, index);
            }
        }
        for player in self.players.values_mut() {
            player.is_ready = false;
        }

        match self.machine.advance(RoomEvent::RaceCompleted) {
            Ok(phase) => info!(room_id = %self.id, phase = ?phase, "race completed"),
            Err(err) => warn!(room_id = %self.id, error = %err, "failed to complete race"),
        }
    }

    fn ending_ready(&mut self, sender: &str, is_ready: bool) -> Vec<RoomEffect> {
        let Some(player) = self.players.get_mut(sender) else {
            return Vec::new();
        };
        player.is_ready = is_ready;

        if self.ready_count() >= self.players.len() {
            for player in self.players.values_mut() {
                player.score = 0;
                player.is_ready = false;
            }
            self.target_text.clear();

            match self.machine.advance(RoomEvent::Rematch) {
                Ok(phase) => info!(room_id = %self.id, phase = ?phase, "back to lobby"),
                Err(err) => warn!(room_id = %self.id, error = %err, "failed to return to lobby"),
            }
        }

        vec![RoomEffect::BroadcastMirror]
    }
}
