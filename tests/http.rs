use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderValue, Method, Request, Response, StatusCode},
    routing::post,
    Router,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::{net::TcpListener, time::timeout};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};
use tower::ServiceExt;
use tower_sessions::{MemoryStore as SessionStore, Session, SessionManagerLayer};
use uuid::Uuid;
use votekeeper::{
    db::{Identity, Room, RoomId, RoomSettings},
    rooms,
    session::USER_ID,
    store::MemoryStore,
    votes::VoteCoordinator,
    AppState,
};

/// Plays the part of the identity service.
async fn login(Path(user_id): Path<String>, session: Session) -> StatusCode {
    session.insert(USER_ID, user_id).await.unwrap();
    StatusCode::NO_CONTENT
}

/// Room owned by alice with alice and bob as participants.
async fn seed_room(store: &MemoryStore) -> RoomId {
    let room_id = Uuid::now_v7();
    store.insert_room(Room {
        id: room_id,
        owner_id: "alice".to_owned(),
        votes_revealed: false,
    }).await;
    store.add_participant(room_id, "alice").await;
    store.add_participant(room_id, "bob").await;
    store.put_settings(RoomSettings {
        room_id,
        allow_others_to_delete_votes: false,
    }).await;
    room_id
}

struct TestApp {
    router: Router,
    coordinator: VoteCoordinator,
    room_id: RoomId,
    other_room_id: RoomId,
}

async fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let room_id = seed_room(&store).await;
    let other_room_id = seed_room(&store).await;

    let coordinator = VoteCoordinator::new(
        Arc::new(store.clone()),
        Arc::new(store),
        broadcast::channel(16).0,
    );
    let app_state = AppState {
        coordinator: coordinator.clone(),
    };

    let router = Router::new()
        .nest("/r", rooms::router())
        .route("/login/{user_id}", post(login))
        .with_state(app_state)
        .layer(SessionManagerLayer::new(SessionStore::default()));
    TestApp { router, coordinator, room_id, other_room_id }
}

async fn app() -> (Router, RoomId) {
    let TestApp { router, room_id, .. } = test_app().await;
    (router, room_id)
}

async fn send(app: &Router, method: Method, uri: String, cookie: Option<&str>, body: Option<Value>) -> Response<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    app.clone().oneshot(request).await.unwrap()
}

async fn cookie_for(app: &Router, user_id: &str) -> String {
    let response = send(app, Method::POST, format!("/login/{user_id}"), None, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_owned()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn anonymous_vote_is_unauthorized() {
    let (app, room_id) = app().await;

    let response = send(&app, Method::POST, format!("/r/{room_id}/votes"), None, Some(json!({ "value": "5" }))).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "AUTHENTICATION_REQUIRED");
}

#[tokio::test]
async fn vote_then_clear_over_http() {
    let (app, room_id) = app().await;
    let bob = cookie_for(&app, "bob").await;
    let alice = cookie_for(&app, "alice").await;

    let response = send(&app, Method::POST, format!("/r/{room_id}/votes"), Some(&bob), Some(json!({ "value": "5" }))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, format!("/r/{room_id}/votes"), Some(&bob), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["votes_revealed"], false);
    assert_eq!(body["votes"], json!([{ "user_id": "bob", "value": "5" }]));

    let response = send(&app, Method::DELETE, format!("/r/{room_id}/votes"), Some(&bob), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "INSUFFICIENT_PERMISSION");

    let response = send(&app, Method::DELETE, format!("/r/{room_id}/votes"), Some(&alice), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::GET, format!("/r/{room_id}/votes"), Some(&alice), None).await;
    assert_eq!(json_body(response).await["votes"], json!([]));
}

#[tokio::test]
async fn outsiders_and_unknown_rooms() {
    let (app, room_id) = app().await;
    let mallory = cookie_for(&app, "mallory").await;

    let response = send(&app, Method::POST, format!("/r/{room_id}/votes"), Some(&mallory), Some(json!({ "value": "1" }))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "NOT_A_PARTICIPANT");

    let nowhere = Uuid::now_v7();
    let response = send(&app, Method::DELETE, format!("/r/{nowhere}/votes"), Some(&mallory), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "ROOM_NOT_FOUND");
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn connect_ws(
    addr: SocketAddr,
    room_id: RoomId,
    cookie: &str,
) -> Result<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>, tungstenite::Error> {
    let mut request = format!("ws://{addr}/r/{room_id}/ws").into_client_request().unwrap();
    request.headers_mut().insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
    let (stream, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let msg = timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("no message within 5s")
        .unwrap()
        .unwrap();
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn room_feed_sends_snapshot_then_own_room_events() {
    let app = test_app().await;
    let bob = cookie_for(&app.router, "bob").await;
    app.coordinator.cast_vote(app.room_id, "3".to_owned(), Some(&Identity::new("alice"))).await.unwrap();
    let addr = serve(app.router.clone()).await;

    let mut feed = connect_ws(addr, app.room_id, &bob).await.unwrap();

    let snapshot = next_json(&mut feed).await;
    assert_eq!(snapshot["room_id"], app.room_id.to_string());
    assert_eq!(snapshot["votes_revealed"], false);
    assert_eq!(snapshot["votes"], json!([{ "user_id": "alice", "value": null }]));

    let bob_id = Identity::new("bob");
    app.coordinator.cast_vote(app.other_room_id, "13".to_owned(), Some(&bob_id)).await.unwrap();
    app.coordinator.cast_vote(app.room_id, "5".to_owned(), Some(&bob_id)).await.unwrap();

    let event = next_json(&mut feed).await;
    assert_eq!(event, json!({
        "type": "vote_cast",
        "room_id": app.room_id.to_string(),
        "user_id": "bob",
    }));

    app.coordinator.clear_votes(app.other_room_id, Some(&Identity::new("alice"))).await.unwrap();
    app.coordinator.clear_votes(app.room_id, Some(&Identity::new("alice"))).await.unwrap();

    let event = next_json(&mut feed).await;
    assert_eq!(event, json!({
        "type": "votes_cleared",
        "room_id": app.room_id.to_string(),
        "removed": 2,
    }));
}

#[tokio::test]
async fn room_feed_refuses_outsiders() {
    let app = test_app().await;
    let mallory = cookie_for(&app.router, "mallory").await;
    let addr = serve(app.router.clone()).await;

    match connect_ws(addr, app.room_id, &mallory).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("outsider was subscribed"),
    }
}
