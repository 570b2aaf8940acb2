//! End-to-end tests against a real listener.

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use server::{AppState, Config};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "integration-secret";

fn config() -> Config {
    let mut config = Config::default();
    config.server.jwt_secret = SECRET.to_string();
    config
}

fn token(id: &str, name: &str) -> String {
    let exp = protocol::now_millis() / 1000 + 300;
    encode(
        &Header::default(),
        &json!({"id": id, "name": name, "type": "user", "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn start(config: Config) -> (SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(&config);
    tokio::spawn(server::serve(listener, state.clone()));
    (addr, state)
}

async fn join(addr: SocketAddr, id: &str, name: &str) -> Socket {
    let url = format!("ws://{}/ws?token={}", addr, token(id, name));
    let (socket, _) = connect_async(url).await.unwrap();
    socket
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a message")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Skip periodic updates until a message of `kind` arrives.
async fn next_of_type(socket: &mut Socket, kind: &str) -> Value {
    loop {
        let message = next_json(socket).await;
        if message["type"] == kind {
            return message;
        }
    }
}

#[tokio::test]
async fn test_valid_token_joins_world() {
    let (addr, state) = start(config()).await;
    let mut socket = join(addr, "u42", "Ann").await;

    let init = next_json(&mut socket).await;
    assert_eq!(init["type"], "init");
    assert_eq!(init["player"]["id"], "u42");
    assert_eq!(init["player"]["name"], "Ann");
    assert_eq!(init["gameState"]["coins"].as_array().unwrap().len(), 500);
    assert_eq!(init["gameState"]["viruses"].as_array().unwrap().len(), 15);

    let welcome = next_json(&mut socket).await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["playerCount"], 1);

    let game = state.game.read().await;
    assert_eq!(game.world.players.len(), 1);
    assert_eq!(game.world.players["u42"].name, "Ann");
}

#[tokio::test]
async fn test_invalid_token_is_refused() {
    let (addr, state) = start(config()).await;

    for url in [
        format!("ws://{}/ws", addr),
        format!("ws://{}/ws?token=garbage", addr),
    ] {
        match connect_async(url).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status().as_u16(), 401);
            }
            other => panic!("expected HTTP 401, got {:?}", other.map(|_| ())),
        }
    }

    let game = state.game.read().await;
    assert!(game.world.players.is_empty());
    assert!(game.clients.is_empty());
}

#[tokio::test]
async fn test_connection_cap() {
    let mut config = config();
    config.server.max_connections = 1;
    let (addr, state) = start(config).await;

    let mut first = join(addr, "u1", "Ann").await;
    next_of_type(&mut first, "welcome").await;

    let url = format!("ws://{}/ws?token={}", addr, token("u2", "Bo"));
    match connect_async(url).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 503);
        }
        other => panic!("expected HTTP 503, got {:?}", other.map(|_| ())),
    }
    assert!(!state.game.read().await.world.players.contains_key("u2"));
}

#[tokio::test]
async fn test_chat_join_and_leave() {
    let (addr, _state) = start(config()).await;
    let mut ann = join(addr, "u1", "Ann").await;
    next_of_type(&mut ann, "welcome").await;

    let mut bo = join(addr, "u2", "Bo").await;
    next_of_type(&mut bo, "welcome").await;

    let joined = next_of_type(&mut ann, "player_joined").await;
    assert_eq!(joined["player"]["id"], "u2");

    bo.send(Message::Text(
        json!({"type": "chat", "message": "hi all"}).to_string().into(),
    ))
    .await
    .unwrap();

    for socket in [&mut ann, &mut bo] {
        let chat = next_of_type(socket, "chat").await;
        assert_eq!(chat["playerId"], "u2");
        assert_eq!(chat["playerName"], "Bo");
        assert_eq!(chat["message"], "hi all");
    }

    bo.close(None).await.unwrap();
    let left = next_of_type(&mut ann, "player_left").await;
    assert_eq!(left["playerId"], "u2");
    assert_eq!(left["playerName"], "Bo");
}

#[tokio::test]
async fn test_ping_and_game_updates() {
    let (addr, _state) = start(config()).await;
    let mut socket = join(addr, "u1", "Ann").await;
    next_of_type(&mut socket, "welcome").await;

    socket
        .send(Message::Text(
            r#"{"type":"ping","timestamp":123456}"#.to_string().into(),
        ))
        .await
        .unwrap();
    let pong = next_of_type(&mut socket, "pong").await;
    assert_eq!(pong["clientTimestamp"], 123456);

    // Malformed input is dropped without closing the connection.
    socket
        .send(Message::Text(r#"{"type":"warp"}"#.to_string().into()))
        .await
        .unwrap();

    let update = next_of_type(&mut socket, "game_update").await;
    assert_eq!(update["players"].as_array().unwrap().len(), 1);
    assert_eq!(update["leaderboard"][0]["id"], "u1");
    assert!(update["timestamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_token_with_both_claim_spellings_joins() {
    let (addr, state) = start(config()).await;
    let exp = protocol::now_millis() / 1000 + 300;
    let token = encode(
        &Header::default(),
        &json!({"sub": "auth0|u7", "id": "u7", "name": "Ann", "username": "ann_7", "exp": exp}),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let (mut socket, _) = connect_async(format!("ws://{}/ws?token={}", addr, token))
        .await
        .unwrap();
    let init = next_of_type(&mut socket, "init").await;
    assert_eq!(init["player"]["id"], "u7");
    assert_eq!(init["player"]["name"], "Ann");
    assert!(state.game.read().await.world.players.contains_key("u7"));
}
