// ============================
// crates/backend-lib/src/lib.rs
// ============================
//! Core of the `meetwire` real-time collaboration hub: rooms, meetings,
//! signaling relay, presence and chat fan-out, plus the REST surface.

pub mod auth;
pub mod config;
pub mod connections;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod meeting;
pub mod metrics;
pub mod middleware;
pub mod presence;
pub mod rooms;
pub mod signaling;
pub mod storage;
pub mod validation;
pub mod websocket;
pub mod ws_router;

use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::Settings;
use crate::connections::ConnectionTable;
use crate::gate::AuthorizationGate;
use crate::meeting::MeetingManager;
use crate::middleware::rate_limit::RateLimiter;
use crate::presence::PresenceBroadcaster;
use crate::rooms::RoomRegistry;
use crate::signaling::SignalingRelay;
use crate::storage::Storage;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState<S> {
    /// Settings the server was started with
    pub settings: Arc<Settings>,
    /// Storage backend
    pub storage: S,
    /// Room membership
    pub rooms: Arc<RoomRegistry>,
    /// Live connections and their outbound queues
    pub connections: Arc<ConnectionTable>,
    pub meetings: MeetingManager<S>,
    pub gate: AuthorizationGate<S>,
    pub presence: PresenceBroadcaster<S>,
    pub relay: SignalingRelay,
    /// Bearer token verification for REST routes
    pub tokens: TokenService,
    /// Rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl<S: Storage + Clone + 'static> AppState<S> {
    /// Create a new application state
    pub fn new(storage: S, config: &Settings) -> anyhow::Result<Self> {
        config.validate()?;

        let settings = Arc::new(config.clone());
        let rooms = Arc::new(RoomRegistry::new());
        let connections = Arc::new(ConnectionTable::new());
        let meetings = MeetingManager::new(storage.clone(), &config.meetings.url_prefix);
        let gate = AuthorizationGate::new(meetings.clone(), config.meetings.join_policy);
        let presence = PresenceBroadcaster::new(
            rooms.clone(),
            connections.clone(),
            storage.clone(),
            config.chat.broadcast_without_room,
        );
        let relay = SignalingRelay::new(connections.clone());
        let tokens = TokenService::new(&config.auth.jwt_secret);
        let rate_limiter = Arc::new(RateLimiter::from_settings(config.get_rate_limit_settings()));

        Ok(Self {
            settings,
            storage,
            rooms,
            connections,
            meetings,
            gate,
            presence,
            relay,
            tokens,
            rate_limiter,
        })
    }
}
