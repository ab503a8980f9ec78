//! Short-lived, single-use tokens that gate the `/ws` upgrade.

use std::time::{Duration, Instant};

use moka::future::{Cache as MokaCache, CacheBuilder as MokaCacheBuilder};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::debug;
use uuid::Uuid;

use crate::errors::{SessionError, SessionResult};

const MAX_PENDING_SESSIONS: u64 = 10_000;

/// What `POST /sessions` hands back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct SessionTicket {
    pub session_id: String,
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: u64,
}

#[derive(Debug, Clone)]
struct PendingSession {
    token: String,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    pending: MokaCache<String, PendingSession>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        let pending = MokaCacheBuilder::new(MAX_PENDING_SESSIONS)
            .time_to_live(ttl)
            .build();
        Self { pending, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self) -> SessionTicket {
        let session_id = Uuid::new_v4().to_string();
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

        self.pending
            .insert(
                session_id.clone(),
                PendingSession {
                    token: token.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            )
            .await;
        debug!(session_id = %session_id, "Session issued");

        SessionTicket {
            session_id,
            token,
            expires_in: self.ttl.as_secs(),
        }
    }

    /// Consume the session. Any attempt burns it, matching token or not.
    pub async fn redeem(&self, session_id: &str, token: &str) -> SessionResult<()> {
        let Some(pending) = self.pending.remove(session_id).await else {
            return Err(SessionError::InvalidToken);
        };

        if Instant::now() >= pending.expires_at {
            return Err(SessionError::InvalidToken);
        }

        if !bool::from(pending.token.as_bytes().ct_eq(token.as_bytes())) {
            return Err(SessionError::InvalidToken);
        }

        debug!(session_id = %session_id, "Session redeemed");
        Ok(())
    }
}
