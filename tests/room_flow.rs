use std::time::Duration;

use axum::extract::ws::Message;
use serde_json::Value;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    time::{sleep, timeout},
};
use typerace_party::{
    config::{AppConfig, CountdownPolicy},
    dto::ws::InboundMessage,
    services::{room_service::RoomCommand, rooms_service},
    state::{AppState, RoomHandle, SharedState},
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn test_state() -> SharedState {
    AppState::new(
        AppConfig::default()
            .with_countdown(Duration::from_millis(50))
            .with_room_idle_ttl(Duration::from_millis(50)),
    )
}

fn attach(state: &SharedState, room_id: &str, conn: &str) -> (RoomHandle, UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = state.join_room(room_id);
    assert!(handle.send(RoomCommand::Connect {
        connection_id: conn.to_string(),
        outbound: tx,
    }));
    (handle, rx)
}

fn detach(state: &SharedState, handle: &RoomHandle, conn: &str) {
    state.leave_room(handle);
    handle.send(RoomCommand::Close {
        connection_id: conn.to_string(),
    });
}

fn send(handle: &RoomHandle, conn: &str, message: InboundMessage) {
    assert!(handle.send(RoomCommand::Inbound {
        connection_id: conn.to_string(),
        message,
    }));
}

async fn next_json(rx: &mut UnboundedReceiver<Message>) -> Value {
    let message = timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("connection channel closed");
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).expect("valid json"),
        other => panic!("unexpected frame {other:?}"),
    }
}

/// Skip frames until one of type `kind` arrives.
async fn next_of_type(rx: &mut UnboundedReceiver<Message>, kind: &str) -> Value {
    loop {
        let value = next_json(rx).await;
        if value["type"] == kind {
            return value["values"].clone();
        }
    }
}

/// Skip mirrors until one in `phase` arrives.
async fn mirror_in_phase(rx: &mut UnboundedReceiver<Message>, phase: &str) -> Value {
    loop {
        let mirror = next_of_type(rx, "mirror").await;
        if mirror["phase"] == phase {
            return mirror;
        }
    }
}

fn score_of(mirror: &Value, conn: &str) -> i64 {
    mirror["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|player| player["connectionId"] == conn)
        .and_then(|player| player["score"].as_i64())
        .expect("player present")
}

#[tokio::test]
async fn connect_replies_with_id_then_mirror() {
    let state = test_state();
    let (_handle, mut rx) = attach(&state, "hello", "a");

    let connected = next_json(&mut rx).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["values"]["connId"], "a");

    let mirror = next_json(&mut rx).await;
    assert_eq!(mirror["type"], "mirror");
    assert_eq!(mirror["values"]["phase"], "lobby");
    assert_eq!(mirror["values"]["players"][0]["connectionId"], "a");
    assert_eq!(mirror["values"]["players"][0]["name"], "");
    assert_eq!(mirror["values"]["players"][0]["isReady"], false);
    assert!(mirror["values"].get("targetText").is_none());
}

#[tokio::test]
async fn two_player_race_round_trip() {
    let state = test_state();
    let word_count = state.config().word_count();
    let (room, mut rx_a) = attach(&state, "race", "a");
    let (_, mut rx_b) = attach(&state, "race", "b");

    send(&room, "a", InboundMessage::Ready { is_ready: true });
    send(&room, "b", InboundMessage::Ready { is_ready: true });

    next_of_type(&mut rx_a, "startGame").await;
    let running = next_of_type(&mut rx_a, "mirror").await;
    assert_eq!(running["phase"], "running");
    let target = running["targetText"].as_str().unwrap();
    assert_eq!(target.split(' ').count(), word_count);
    assert_eq!(running["finishedResults"], serde_json::json!([]));

    // b saw the same start and text.
    next_of_type(&mut rx_b, "startGame").await;
    let running_b = next_of_type(&mut rx_b, "mirror").await;
    assert_eq!(running_b["targetText"], running["targetText"]);

    send(&room, "a", InboundMessage::Finished { result: 10.0 });
    let progress = next_of_type(&mut rx_b, "mirror").await;
    assert_eq!(progress["phase"], "running");
    assert_eq!(progress["finishedResults"][0]["connectionId"], "a");

    send(&room, "b", InboundMessage::Finished { result: 8.0 });
    let ending = mirror_in_phase(&mut rx_a, "ending").await;
    assert_eq!(score_of(&ending, "a"), 13);
    assert_eq!(score_of(&ending, "b"), 10);
    assert!(ending.get("finishedResults").is_none());

    // Reconnect reconciliation: mirror in Ending re-sends the same snapshot.
    send(&room, "b", InboundMessage::Mirror);
    let again = next_of_type(&mut rx_a, "mirror").await;
    assert_eq!(again, ending);

    send(&room, "a", InboundMessage::Ready { is_ready: true });
    send(&room, "b", InboundMessage::Ready { is_ready: true });
    let lobby = mirror_in_phase(&mut rx_a, "lobby").await;
    assert_eq!(score_of(&lobby, "a"), 0);
    assert_eq!(score_of(&lobby, "b"), 0);
}

#[tokio::test]
async fn unknown_messages_do_not_stall_the_room() {
    let state = test_state();
    let (room, mut rx) = attach(&state, "names", "a");
    next_of_type(&mut rx, "mirror").await;

    send(
        &room,
        "a",
        InboundMessage::Unknown {
            kind: "dance".into(),
        },
    );
    send(
        &room,
        "a",
        InboundMessage::UpdateName {
            name: "ada".into(),
        },
    );

    let mirror = next_of_type(&mut rx, "mirror").await;
    assert_eq!(mirror["players"][0]["name"], "ada");
}

#[tokio::test]
async fn revalidated_countdown_keeps_lobby_after_unready() {
    let state = AppState::new(
        AppConfig::default()
            .with_countdown(Duration::from_millis(100))
            .with_countdown_policy(CountdownPolicy::Revalidate),
    );
    let (room, mut rx) = attach(&state, "careful", "a");

    send(&room, "a", InboundMessage::Ready { is_ready: true });
    send(&room, "a", InboundMessage::Ready { is_ready: false });
    sleep(Duration::from_millis(250)).await;

    let detail = rooms_service::get_room(&state, "careful").await.unwrap();
    assert_eq!(detail.mirror.phase, typerace_party::dto::phase::VisibleRoomPhase::Lobby);

    // No start signal was ever sent.
    while let Ok(message) = rx.try_recv() {
        if let Message::Text(text) = message {
            let value: Value = serde_json::from_str(text.as_str()).unwrap();
            assert_ne!(value["type"], "startGame");
        }
    }
}

#[tokio::test]
async fn empty_room_retires_after_ttl() {
    let state = test_state();
    let (room, _rx) = attach(&state, "idle", "a");
    let first_instance = room.instance();

    detach(&state, &room, "a");
    sleep(Duration::from_millis(300)).await;

    assert!(state.room("idle").is_none());
    assert!(matches!(
        rooms_service::get_room(&state, "idle").await,
        Err(typerace_party::error::ServiceError::NotFound(_))
    ));

    let (again, _rx) = attach(&state, "idle", "b");
    assert_ne!(again.instance(), first_instance);
}

#[tokio::test]
async fn reconnect_within_ttl_keeps_room() {
    let state = test_state();
    let (room, _rx) = attach(&state, "sticky", "a");
    detach(&state, &room, "a");

    let (again, _rx_b) = attach(&state, "sticky", "b");
    sleep(Duration::from_millis(300)).await;

    assert_eq!(again.instance(), room.instance());
    let live = state.room("sticky").expect("room still live");
    assert_eq!(live.instance(), room.instance());
    assert_eq!(live.attached(), 1);
}

#[tokio::test]
async fn rooms_are_listed_in_id_order() {
    let state = test_state();
    let (_b, _rx_b) = attach(&state, "beta", "x");
    let (_a, _rx_a) = attach(&state, "alpha", "y");
    let (_a2, _rx_a2) = attach(&state, "alpha", "z");

    let listing = rooms_service::list_rooms(&state).await.unwrap();
    let ids: Vec<&str> = listing.rooms.iter().map(|room| room.id.as_str()).collect();
    assert_eq!(ids, ["alpha", "beta"]);
    assert_eq!(listing.rooms[0].player_count, 2);
    assert_eq!(listing.rooms[1].player_count, 1);
}

#[tokio::test]
async fn invalid_room_id_is_rejected() {
    let state = test_state();
    assert!(matches!(
        rooms_service::get_room(&state, "no spaces").await,
        Err(typerace_party::error::ServiceError::InvalidInput(_))
    ));
}
