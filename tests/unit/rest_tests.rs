// =============
// tests/unit/rest_tests.rs
// =============
//! REST routes driven through the full router with `oneshot`.
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use backend_lib::gate::JoinPolicy;
use backend_lib::meeting::MeetingStatus;
use backend_lib::storage::FlatFileStorage;
use backend_lib::ws_router::create_router;
use backend_lib::AppState;
use chrono::{Duration, Utc};
use meetwire_common::ChatDraft;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::test_utils::{bearer, schedule_meeting, setup_state, setup_state_with};

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn app(state: &Arc<AppState<FlatFileStorage>>) -> Router {
    create_router(state.clone())
}

#[tokio::test]
async fn test_health_needs_no_token() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let (status, body) = call(&app(&state), Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_meeting_routes_require_bearer_token() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);

    let (status, body) = call(&app, Method::GET, "/meetings/active", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "AUTH_001");

    let (status, _) = call(&app, Method::GET, "/meetings/active", Some("Bearer garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_schedule_and_fetch_meeting() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let org = bearer(&state, "org");
    let start = Utc::now() + Duration::hours(2);

    let (status, body) = call(
        &app,
        Method::POST,
        "/meetings",
        Some(&org),
        Some(json!({
            "title": "Retro",
            "startTime": start,
            "endTime": start + Duration::hours(1),
            "participants": ["p1"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["meeting"]["organizer"], "org");
    assert_eq!(body["meeting"]["status"], "scheduled");
    assert_eq!(body["meeting"]["isActive"], false);

    let id = body["meeting"]["id"].as_str().unwrap().to_string();
    let (status, body) = call(&app, Method::GET, &format!("/meetings/{id}"), Some(&org), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meeting"]["title"], "Retro");

    let (status, body) = call(
        &app,
        Method::POST,
        "/meetings",
        Some(&org),
        Some(json!({
            "title": "   ",
            "startTime": start,
            "endTime": start,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");
}

#[tokio::test]
async fn test_start_and_end_are_organizer_only() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let meeting = schedule_meeting(&state, "org", &["p1"]).await;
    let start_uri = format!("/meetings/{}/start", meeting.id);
    let end_uri = format!("/meetings/{}/end", meeting.id);

    let (status, body) = call(&app, Method::POST, &start_uri, Some(&bearer(&state, "p1")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTHZ_001");

    let (status, _) = call(
        &app,
        Method::POST,
        "/meetings/does-not-exist/start",
        Some(&bearer(&state, "org")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let org = bearer(&state, "org");
    let (status, body) = call(&app, Method::POST, &start_uri, Some(&org), None).await;
    assert_eq!(status, StatusCode::OK);
    let code = body["meeting"]["meetingCode"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert_eq!(
        body["meeting"]["meetingUrl"],
        format!("/meeting-room/{}?code={code}", meeting.id)
    );

    let (status, body) = call(&app, Method::GET, "/meetings/active", Some(&org), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meetings"].as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::POST, &end_uri, Some(&bearer(&state, "p1")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::POST, &end_uri, Some(&org), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meeting"]["status"], "completed");

    let stored = state.meetings.get(&meeting.id).await.unwrap();
    assert_eq!(stored.status, MeetingStatus::Completed);
    assert!(!stored.is_active);

    // a completed meeting cannot be started again
    let (status, body) = call(&app, Method::POST, &start_uri, Some(&org), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MEETING_001");
}

#[tokio::test]
async fn test_cancel_meeting() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let meeting = schedule_meeting(&state, "org", &["p1"]).await;
    let uri = format!("/meetings/{}", meeting.id);

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&bearer(&state, "p1")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, Method::DELETE, &uri, Some(&bearer(&state, "org")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meeting"]["status"], "cancelled");

    let (status, _) = call(&app, Method::DELETE, &uri, Some(&bearer(&state, "org")), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_join_by_code() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let meeting = schedule_meeting(&state, "org", &["p1"]).await;
    let activated = state.meetings.activate(&meeting.id).await.unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        "/meetings/join",
        Some(&bearer(&state, "p1")),
        Some(json!({ "meetingCode": activated.meeting_code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meeting"]["id"], meeting.id);
    assert_eq!(body["meeting"]["organizer"], "org");
    assert_eq!(body["meeting"]["meetingUrl"], activated.meeting_url);

    let (status, body) = call(
        &app,
        Method::POST,
        "/meetings/join",
        Some(&bearer(&state, "stranger")),
        Some(json!({ "meetingCode": activated.meeting_code })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("not authorized"));

    let (status, _) = call(
        &app,
        Method::POST,
        "/meetings/join",
        Some(&bearer(&state, "p1")),
        Some(json!({ "meetingCode": "FFFFFFFF" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_room_history_route() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let token = bearer(&state, "u1");

    for i in 0..3 {
        state
            .presence
            .broadcast_chat(
                Uuid::new_v4(),
                ChatDraft {
                    content: format!("m{i}"),
                    sender: "u1".to_string(),
                    room: Some("meeting-42".to_string()),
                    sender_name: None,
                },
            )
            .await
            .unwrap();
    }

    let (status, body) = call(&app, Method::GET, "/messages/room/meeting-42", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let contents: Vec<&str> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["m0", "m1", "m2"]);
    assert_eq!(body["messages"][0]["type"], "meeting");

    let (_, body) = call(
        &app,
        Method::GET,
        "/messages/room/meeting-42?limit=1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(body["messages"][0]["content"], "m2");

    let (_, body) = call(&app, Method::GET, "/messages/room/meeting-7", Some(&token), None).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limit_applies_per_client() {
    let (state, _temp_dir) = setup_state_with(|settings| {
        settings.rate_limit.max_requests = 2;
    });
    let app = app(&state);
    let token = bearer(&state, "u1");

    let request = |ip: &str| {
        Request::builder()
            .uri("/meetings/active")
            .header(header::AUTHORIZATION, token.as_str())
            .header("x-real-ip", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = app.clone().oneshot(request("198.51.100.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = app.clone().oneshot(request("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app.clone().oneshot(request("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // health sits outside the limiter
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-real-ip", "198.51.100.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unparseable_requests_get_json_errors() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let token = bearer(&state, "p1");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/meetings/join")
        .header(header::AUTHORIZATION, token.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "JSON_001");

    let (status, body) = call(
        &app,
        Method::GET,
        "/messages/room/meeting-1?limit=abc",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "JSON_001");
}

#[tokio::test]
async fn test_list_all_meetings() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let first = schedule_meeting(&state, "org", &["p1"]).await;
    let second = schedule_meeting(&state, "other", &[]).await;
    state.meetings.activate(&second.id).await.unwrap();

    let (status, body) = call(&app, Method::GET, "/meetings", Some(&bearer(&state, "p1")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let mut ids: Vec<&str> = body["meetings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    ids.sort();
    let mut expected = vec![first.id.as_str(), second.id.as_str()];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_update_meeting_is_organizer_only() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let meeting = schedule_meeting(&state, "org", &["p1"]).await;
    let uri = format!("/meetings/{}", meeting.id);

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&bearer(&state, "p1")),
        Some(json!({ "title": "Hijacked" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTHZ_001");

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&bearer(&state, "org")),
        Some(json!({ "title": "Moved sync", "participants": ["p1", "p2"], "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meeting"]["title"], "Moved sync");
    assert_eq!(body["meeting"]["participants"], json!(["p1", "p2"]));
    // status is not editable through this route
    assert_eq!(body["meeting"]["status"], "scheduled");

    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&bearer(&state, "org")),
        Some(json!({ "endTime": meeting.start_time - Duration::hours(1) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");

    state.meetings.activate(&meeting.id).await.unwrap();
    state.meetings.deactivate(&meeting.id).await.unwrap();
    let (status, body) = call(
        &app,
        Method::PUT,
        &uri,
        Some(&bearer(&state, "org")),
        Some(json!({ "title": "Too late" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "MEETING_002");

    let (status, _) = call(
        &app,
        Method::PUT,
        "/meetings/does-not-exist",
        Some(&bearer(&state, "org")),
        Some(json!({ "title": "Ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_message_route() {
    let (state, _temp_dir) = setup_state(JoinPolicy::Lenient);
    let app = app(&state);
    let token = bearer(&state, "u1");

    let (status, body) = call(
        &app,
        Method::POST,
        "/messages",
        Some(&token),
        Some(json!({ "content": "minutes attached", "room": "meeting-9", "sender": "u1", "senderName": "Uma" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"]["type"], "meeting");
    assert_eq!(body["message"]["senderName"], "Uma");

    let (status, body) = call(
        &app,
        Method::POST,
        "/messages",
        Some(&token),
        Some(json!({ "content": "no room", "sender": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VAL_001");

    let (_, body) = call(&app, Method::GET, "/messages/room/meeting-9", Some(&token), None).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "minutes attached");
}
