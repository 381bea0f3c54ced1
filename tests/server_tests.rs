// Integration tests for the UI bridge routes and WebSocket push

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use research_stream_lib::server::{build_router, spawn_snapshot_forwarder, ServerAppState};
use research_stream_lib::shutdown::ShutdownState;
use research_stream_lib::{
    AgentId, ChannelTransport, ControllerOptions, ResearchController, ResearchEvent,
};

const WAIT: Duration = Duration::from_secs(5);

fn setup() -> (ServerAppState, ChannelTransport) {
    let transport = ChannelTransport::new();
    let controller = Arc::new(ResearchController::new(
        Arc::new(transport.clone()),
        ControllerOptions::default(),
    ));
    (ServerAppState::new(controller, ShutdownState::new()), transport)
}

fn router(state: &ServerAppState) -> Router {
    build_router(state.clone(), &[])
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_research(topic: &str) -> Request<Body> {
    Request::post("/api/research")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "topic": topic }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (state, _) = setup();
    let response = router(&state)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_start_research_returns_session_id() {
    let (state, transport) = setup();
    let response = router(&state)
        .oneshot(post_research("  battery chemistry  "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    let session_id = body["sessionId"].as_str().unwrap();
    assert_eq!(body["topic"], "battery chemistry");
    assert_eq!(transport.requests()[0].session_id, session_id);
    assert_eq!(transport.requests()[0].topic, "battery chemistry");
}

#[tokio::test]
async fn test_blank_topic_is_bad_request() {
    let (state, transport) = setup();
    let response = router(&state).oneshot(post_research("   ")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(transport.opened_count(), 0);
}

#[tokio::test]
async fn test_get_research_returns_snapshot() {
    let (state, _) = setup();
    let app = router(&state);

    app.clone().oneshot(post_research("topic")).await.unwrap();
    let response = app
        .oneshot(Request::get("/api/research").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["isLoading"], true);
    assert_eq!(body["lifecycle"], "connecting");
    assert_eq!(body["messages"][0]["content"], "topic");
    assert_eq!(body["status"].as_array().unwrap().len(), AgentId::roster().len());
}

async fn next_snapshot<S>(socket: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            let event: Value = serde_json::from_str(&text).unwrap();
            if event["event"] == "research:snapshot" {
                return event["payload"].clone();
            }
        }
    }
}

#[tokio::test]
async fn test_websocket_pushes_snapshots() {
    let (state, transport) = setup();
    let _forwarder = spawn_snapshot_forwarder(&state.controller, state.broadcaster.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(&state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/events", addr))
        .await
        .unwrap();

    let initial = next_snapshot(&mut socket).await;
    assert_eq!(initial["isLoading"], false);

    state.controller.start_research("ocean acidification").unwrap();
    let handle = transport.take_next().unwrap();
    handle.send(ResearchEvent::message(AgentId::GapAnalyst, "three open questions"));
    handle.send(ResearchEvent::Done);

    // Snapshots may coalesce; read until the terminal one
    let mut snapshot = next_snapshot(&mut socket).await;
    while snapshot["isLoading"] == true {
        snapshot = next_snapshot(&mut socket).await;
    }
    assert_eq!(snapshot["lifecycle"], "completed");
    assert_eq!(snapshot["messages"][1]["content"], "three open questions");
}
