// ============================
// crates/backend-lib/src/gate.rs
// ============================
//! Authorization gate for meeting rooms.
use serde::Deserialize;

use crate::meeting::{Meeting, MeetingManager};
use crate::storage::Storage;

/// How the gate treats a join it cannot verify: unknown meeting, anonymous
/// caller or a failed lookup.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Deny unverifiable joins
    Strict,
    /// Let unverifiable joins through
    #[default]
    Lenient,
}

/// Outcome of [`AuthorizationGate::can_join`]
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDecision {
    pub authorized: bool,
    pub meeting: Option<Meeting>,
}

impl JoinDecision {
    fn denied(meeting: Option<Meeting>) -> Self {
        Self {
            authorized: false,
            meeting,
        }
    }
}

/// Read-only check of whether a user may enter a meeting room
#[derive(Clone)]
pub struct AuthorizationGate<S> {
    meetings: MeetingManager<S>,
    policy: JoinPolicy,
}

impl<S: Storage + Clone + 'static> AuthorizationGate<S> {
    pub fn new(meetings: MeetingManager<S>, policy: JoinPolicy) -> Self {
        Self { meetings, policy }
    }

    pub fn policy(&self) -> JoinPolicy {
        self.policy
    }

    /// Decide whether `user_id` may join `meeting_id`. Never fails; lookup
    /// errors are folded into the decision according to the policy.
    pub async fn can_join(&self, meeting_id: &str, user_id: Option<&str>) -> JoinDecision {
        let unverifiable = self.policy == JoinPolicy::Lenient;

        let meeting = match self.meetings.find(meeting_id).await {
            Ok(Some(meeting)) => meeting,
            Ok(None) => {
                tracing::debug!(meeting_id, policy = ?self.policy, "join check on unknown meeting");
                return JoinDecision {
                    authorized: unverifiable,
                    meeting: None,
                };
            },
            Err(e) => {
                tracing::warn!(meeting_id, error = %e, policy = ?self.policy, "meeting lookup failed during join check");
                return JoinDecision {
                    authorized: unverifiable,
                    meeting: None,
                };
            },
        };

        match user_id {
            Some(user_id) if meeting.admits(user_id) => JoinDecision {
                authorized: true,
                meeting: Some(meeting),
            },
            Some(_) => JoinDecision::denied(Some(meeting)),
            None => JoinDecision {
                authorized: unverifiable,
                meeting: Some(meeting),
            },
        }
    }
}
