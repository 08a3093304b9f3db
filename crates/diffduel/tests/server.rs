//! End-to-end tests: a real WebSocket client against a running server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use diffduel::ServerBuilder;
use diffduel_engine::{
    GameHistory, GameProvider, HistoryError, HistoryStore, CLASSIC_SOLO,
};
use diffduel_protocol::{
    ClientEvent, DifferenceMatrix, GameData, GameMode, Position, RoomId,
    ServerEvent, EMPTY_PIXEL,
};

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

// =========================================================================
// Fakes
// =========================================================================

struct StaticProvider {
    board: GameData,
}

impl GameProvider for StaticProvider {
    async fn classic_board(&self, name: &str) -> Option<GameData> {
        (name == self.board.name).then(|| self.board.clone())
    }

    async fn any_board(&self) -> Option<GameData> {
        Some(self.board.clone())
    }
}

#[derive(Clone, Default)]
struct SharedStore {
    saved: Arc<Mutex<Vec<GameHistory>>>,
}

impl HistoryStore for SharedStore {
    async fn save(&self, history: GameHistory) -> Result<(), HistoryError> {
        self.saved.lock().unwrap().push(history);
        Ok(())
    }
}

fn board() -> GameData {
    GameData {
        name: "meadow".into(),
        nb_difference: 2,
        difficulty: "easy".into(),
        difference_matrix: DifferenceMatrix(vec![
            vec![EMPTY_PIXEL, 0, EMPTY_PIXEL],
            vec![EMPTY_PIXEL, EMPTY_PIXEL, 1],
        ]),
    }
}

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server whose first timer tick is an hour away, so game events
/// never interleave with `Timer` broadcasts mid-test.
async fn start_server() -> (String, SharedStore) {
    let store = SharedStore::default();
    let server = ServerBuilder::new()
        .bind("127.0.0.1:0")
        .tick_period(Duration::from_secs(3600))
        .build(StaticProvider { board: board() }, store.clone())
        .await
        .expect("server should start");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    (format!("ws://{addr}"), store)
}

async fn send_event(ws: &mut Ws, event: &ClientEvent) {
    let text = serde_json::to_string(event).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

async fn recv_event(ws: &mut Ws) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("frame error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("decode");
            }
            _ => continue,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_solo_classic_game_over_websocket() {
    let (url, store) = start_server().await;
    let (mut ws, _) = connect_async(url).await.expect("connect");

    send_event(
        &mut ws,
        &ClientEvent::CreateGame {
            username: "alice".into(),
            game_mode: GameMode::Classic,
            game_name: Some("meadow".into()),
            started: true,
        },
    )
    .await;
    let room_id = match recv_event(&mut ws).await {
        ServerEvent::GameCreated { room_id } => room_id,
        other => panic!("expected GameCreated, got {other:?}"),
    };

    send_event(&mut ws, &ClientEvent::StartGame { room_id }).await;
    assert_eq!(recv_event(&mut ws).await, ServerEvent::Started);

    for position in [Position { x: 1, y: 0 }, Position { x: 2, y: 1 }] {
        send_event(
            &mut ws,
            &ClientEvent::ValidateDifference {
                room_id,
                position,
                username: "alice".into(),
            },
        )
        .await;
        match recv_event(&mut ws).await {
            ServerEvent::DifferenceValidated { validated, .. } => {
                assert!(validated);
            }
            other => panic!("expected DifferenceValidated, got {other:?}"),
        }
    }

    // Both differences found: the server closes the game on its own.
    assert_eq!(recv_event(&mut ws).await, ServerEvent::GameFinished);

    // The history lands in storage exactly once, with the winner set.
    let mut saved = Vec::new();
    for _ in 0..100 {
        saved = store.saved.lock().unwrap().clone();
        if !saved.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].winner.as_deref(), Some("alice"));
    assert_eq!(saved[0].game_mode, CLASSIC_SOLO);

    ws.close(None).await.ok();
}

#[tokio::test]
async fn test_check_game_without_rooms_reports_not_found() {
    let (url, _store) = start_server().await;
    let (mut ws, _) = connect_async(url).await.expect("connect");

    send_event(
        &mut ws,
        &ClientEvent::CheckGame {
            game_name: Some("meadow".into()),
            game_mode: GameMode::Classic,
        },
    )
    .await;
    assert_eq!(
        recv_event(&mut ws).await,
        ServerEvent::GameNotFound { game_mode: GameMode::Classic }
    );

    ws.close(None).await.ok();
}

#[tokio::test]
async fn test_wrong_guess_is_broadcast_as_invalid() {
    let (url, _store) = start_server().await;
    let (mut ws, _) = connect_async(url).await.expect("connect");

    send_event(
        &mut ws,
        &ClientEvent::CreateGame {
            username: "alice".into(),
            game_mode: GameMode::Classic,
            game_name: Some("meadow".into()),
            started: true,
        },
    )
    .await;
    let room_id = match recv_event(&mut ws).await {
        ServerEvent::GameCreated { room_id } => room_id,
        other => panic!("expected GameCreated, got {other:?}"),
    };
    assert_ne!(room_id, RoomId(0));

    send_event(
        &mut ws,
        &ClientEvent::ValidateDifference {
            room_id,
            position: Position { x: 0, y: 0 },
            username: "alice".into(),
        },
    )
    .await;
    match recv_event(&mut ws).await {
        ServerEvent::DifferenceValidated { validated, username, .. } => {
            assert!(!validated);
            assert_eq!(username, "alice");
        }
        other => panic!("expected DifferenceValidated, got {other:?}"),
    }

    ws.close(None).await.ok();
}
