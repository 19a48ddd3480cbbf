// ============================
// crates/backend-lib/src/ws_router.rs
// ============================
//! HTTP router and the WebSocket connection loop.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderValue, Method},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use meetwire_common::{ClientEvent, ServerEvent, Welcome};
use metrics::counter;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{self, meetings, messages};
use crate::metrics::WS_MALFORMED;
use crate::middleware::rate_limit;
use crate::storage::Storage;
use crate::websocket::ConnectionSupervisor;
use crate::AppState;

/// Create the application router
pub fn create_router<S: Storage + Clone + 'static>(state: Arc<AppState<S>>) -> Router {
    let api = Router::new()
        .route(
            "/meetings",
            get(meetings::list_all::<S>).post(meetings::create::<S>),
        )
        .route("/meetings/active", get(meetings::list_active::<S>))
        .route("/meetings/join", post(meetings::join::<S>))
        .route(
            "/meetings/{id}",
            get(meetings::get::<S>)
                .put(meetings::update::<S>)
                .delete(meetings::cancel::<S>),
        )
        .route("/meetings/{id}/start", post(meetings::start::<S>))
        .route("/meetings/{id}/end", post(meetings::end::<S>))
        .route("/messages", post(messages::create::<S>))
        .route("/messages/room/{room}", get(messages::room_history::<S>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::<S>,
        ));

    let router = Router::new()
        .route("/ws", get(ws_handler::<S>))
        .route("/health", get(handlers::health::<S>))
        .merge(api)
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(&state.settings.server.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            },
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

/// Handler for WebSocket connections
pub async fn ws_handler<S: Storage + Clone + 'static>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<S>>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection<S: Storage + Clone + 'static>(socket: WebSocket, state: Arc<AppState<S>>) {
    let (mut sink, mut stream) = socket.split();
    let (mut supervisor, mut outbound) = ConnectionSupervisor::connect(state);
    let connection_id = supervisor.id();

    // Drain the outbound queue into the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(%connection_id, event = event.name(), error = %e, "failed to encode event");
                    continue;
                },
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    supervisor.reply(ServerEvent::Connected(Welcome {
        socket_id: connection_id,
    }));

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "socket read failed");
                break;
            },
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => supervisor.handle(event).await,
                Err(e) => {
                    counter!(WS_MALFORMED).increment(1);
                    tracing::debug!(%connection_id, error = %e, "malformed frame");
                    supervisor.reply(ServerEvent::error(format!("Malformed message: {e}")));
                },
            },
            Message::Close(_) => break,
            _ => {},
        }
    }

    // Dropping the table entry closes the queue, which ends the send task
    supervisor.disconnect();
    if let Err(e) = send_task.await {
        tracing::debug!(%connection_id, error = %e, "send task ended abnormally");
    }
}
