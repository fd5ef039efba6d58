use futures_util::{SinkExt, StreamExt};
use presence_relay::{
    build_router, AppState, HubConfig, LocationUpdated, PresenceHub, ServerConfig, ServerMessage,
    Timestamp,
};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_server() -> (String, PresenceHub) {
    let state = AppState::with_hub_config(ServerConfig::default(), HubConfig::default());
    let hub = state.hub.clone();
    let app = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://127.0.0.1:{}/ws", addr.port()), hub)
}

/// Poll the hub until `expected` users are registered
async fn wait_for_online(hub: &PresenceHub, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while hub.online_count().await.unwrap() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for registry size");
}

async fn connect(url: &str, user_id: &str) -> Client {
    let (ws, _) = connect_async(format!("{url}?userId={user_id}")).await.unwrap();
    ws
}

async fn next_event(ws: &mut Client) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert nothing arrives within a short window
async fn assert_silent(ws: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(150), ws.next()).await;
    assert!(result.is_err(), "unexpected frame: {:?}", result);
}

#[tokio::test]
async fn test_online_update_offline_scenario() {
    let (url, hub) = spawn_server().await;

    let mut u1 = connect(&url, "u1").await;
    wait_for_online(&hub, 1).await;
    let mut u2 = connect(&url, "u2").await;
    wait_for_online(&hub, 2).await;

    assert_eq!(next_event(&mut u1).await, ServerMessage::UserOnline("u2".to_string()));

    let update = serde_json::json!({
        "event": "locationUpdate",
        "data": {"latitude": 1, "longitude": 2, "timestamp": 5}
    });
    u2.send(Message::Text(update.to_string())).await.unwrap();

    assert_eq!(
        next_event(&mut u1).await,
        ServerMessage::UserLocationUpdated(LocationUpdated {
            user_id: "u2".to_string(),
            latitude: 1.0,
            longitude: 2.0,
            timestamp: Timestamp::from(5),
        })
    );
    assert_silent(&mut u2).await;

    u2.close(None).await.unwrap();

    assert_eq!(next_event(&mut u1).await, ServerMessage::UserOffline("u2".to_string()));
    assert_eq!(hub.online_users().await.unwrap(), vec!["u1"]);
}

#[tokio::test]
async fn test_anonymous_connection_is_closed() {
    let (url, hub) = spawn_server().await;

    let mut watcher = connect(&url, "watcher").await;
    wait_for_online(&hub, 1).await;

    // A repeated userId fails to parse and is treated as anonymous
    for query in ["", "?userId=", "?userId=a&userId=b"] {
        let (mut ws, _) = connect_async(format!("{url}{query}")).await.unwrap();
        let frame = tokio::time::timeout(WAIT, ws.next()).await.unwrap();
        match frame {
            Some(Ok(Message::Close(Some(close)))) => assert_eq!(close.code, CloseCode::Policy),
            Some(Ok(Message::Close(None))) | None | Some(Err(_)) => {}
            other => panic!("expected close, got {:?}", other),
        }
    }

    assert_eq!(hub.online_users().await.unwrap(), vec!["watcher"]);
    assert_silent(&mut watcher).await;
}

#[tokio::test]
async fn test_location_updates_reach_every_other_client() {
    let (url, hub) = spawn_server().await;

    let mut a = connect(&url, "a").await;
    wait_for_online(&hub, 1).await;
    let mut b = connect(&url, "b").await;
    wait_for_online(&hub, 2).await;
    let mut c = connect(&url, "c").await;
    wait_for_online(&hub, 3).await;

    // drain the online notices
    next_event(&mut a).await;
    next_event(&mut a).await;
    next_event(&mut b).await;

    let update = serde_json::json!({
        "event": "locationUpdate",
        "data": {"latitude": 10, "longitude": 20, "timestamp": "2024-05-01T10:00:00Z"}
    });
    a.send(Message::Text(update.to_string())).await.unwrap();

    let expected = ServerMessage::UserLocationUpdated(LocationUpdated {
        user_id: "a".to_string(),
        latitude: 10.0,
        longitude: 20.0,
        timestamp: Timestamp::from("2024-05-01T10:00:00Z"),
    });
    assert_eq!(next_event(&mut b).await, expected);
    assert_eq!(next_event(&mut c).await, expected);
    assert_silent(&mut a).await;

    let session = hub.session("a").await.unwrap().unwrap();
    assert_eq!(session.latest_location.unwrap().latitude, 10.0);
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() {
    let (url, hub) = spawn_server().await;

    let mut a = connect(&url, "a").await;
    wait_for_online(&hub, 1).await;
    let mut b = connect(&url, "b").await;
    wait_for_online(&hub, 2).await;
    next_event(&mut a).await;

    b.send(Message::Text("not json".to_string())).await.unwrap();
    b.send(Message::Text(r#"{"event":"locationUpdate","data":{"latitude":1}}"#.to_string()))
        .await
        .unwrap();
    assert_silent(&mut a).await;

    let update = serde_json::json!({
        "event": "locationUpdate",
        "data": {"latitude": 3, "longitude": 4, "timestamp": 6}
    });
    b.send(Message::Text(update.to_string())).await.unwrap();
    assert_eq!(next_event(&mut a).await.event_name(), "userLocationUpdated");
    assert_eq!(hub.online_count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_reconnect_replaces_previous_connection() {
    let (url, hub) = spawn_server().await;

    let mut watcher = connect(&url, "watcher").await;
    wait_for_online(&hub, 1).await;
    let mut first = connect(&url, "u1").await;
    wait_for_online(&hub, 2).await;
    assert_eq!(next_event(&mut watcher).await, ServerMessage::UserOnline("u1".to_string()));

    let _second = connect(&url, "u1").await;
    assert_eq!(next_event(&mut watcher).await, ServerMessage::UserOnline("u1".to_string()));

    // The first transport is released once its session is replaced
    let frame = tokio::time::timeout(WAIT, first.next()).await.unwrap();
    assert!(matches!(
        frame,
        Some(Ok(Message::Close(_))) | None | Some(Err(_))
    ));

    assert_eq!(hub.online_users().await.unwrap(), vec!["u1", "watcher"]);
    assert_silent(&mut watcher).await;
}
