// ============================
// crates/backend-lib/src/signaling.rs
// ============================
//! Point-to-point relay of WebRTC negotiation messages.
//!
//! Payloads are forwarded as opaque JSON. A target that is gone or cannot
//! keep up simply misses the message; peers renegotiate on their own.
use meetwire_common::{
    ConnectionId, RelayedAnswer, RelayedIceCandidate, RelayedOffer, ServerEvent, UserInfo,
};
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;

use crate::connections::ConnectionTable;
use crate::metrics::{SIGNAL_DROPPED, SIGNAL_RELAYED};

#[derive(Clone)]
pub struct SignalingRelay {
    connections: Arc<ConnectionTable>,
}

impl SignalingRelay {
    pub fn new(connections: Arc<ConnectionTable>) -> Self {
        Self { connections }
    }

    pub fn relay_offer(&self, from: ConnectionId, to: ConnectionId, offer: Value, from_user: UserInfo) {
        let event = ServerEvent::WebrtcOffer(RelayedOffer {
            offer,
            from,
            from_user,
        });
        self.relay(from, to, event);
    }

    pub fn relay_answer(&self, from: ConnectionId, to: ConnectionId, answer: Value) {
        self.relay(from, to, ServerEvent::WebrtcAnswer(RelayedAnswer { answer, from }));
    }

    pub fn relay_ice_candidate(&self, from: ConnectionId, to: ConnectionId, candidate: Value) {
        self.relay(
            from,
            to,
            ServerEvent::WebrtcIceCandidate(RelayedIceCandidate { candidate, from }),
        );
    }

    fn relay(&self, from: ConnectionId, to: ConnectionId, event: ServerEvent) {
        let name = event.name();
        if self.connections.send_to(to, event) {
            counter!(SIGNAL_RELAYED).increment(1);
        } else {
            counter!(SIGNAL_DROPPED).increment(1);
            tracing::debug!(%from, %to, event = name, "signaling target unavailable, dropping");
        }
    }
}
