//! Ephemeral Emohaa session management
//!
//! Emohaa only chats inside a conversation, and every conversation it creates
//! shows up in the account's history. Each turn therefore opens its own
//! session and deletes it once the turn is over. Deletion is detached from the
//! turn: it never delays the response and its failures are only logged.

use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{UpstreamApi, UpstreamError};
use crate::routes::metrics::record_session_teardown;

/// An upstream conversation owned by exactly one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque identifier issued by Emohaa
    pub id: String,
    /// Unix timestamp (seconds) when the session was opened
    pub created_at: i64,
}

/// Opens and tears down upstream sessions
#[derive(Clone)]
pub struct SessionManager {
    upstream: Arc<dyn UpstreamApi>,
}

impl SessionManager {
    pub fn new(upstream: Arc<dyn UpstreamApi>) -> Self {
        Self { upstream }
    }

    /// Open a new session for one turn
    #[instrument(skip(self, credential))]
    pub async fn open(&self, credential: &str) -> Result<Session, UpstreamError> {
        let id = self.upstream.create_session(credential).await?;
        debug!(session_id = %id, "Session opened");

        Ok(Session {
            id,
            created_at: Utc::now().timestamp(),
        })
    }

    /// Delete a session. Failures are logged and swallowed.
    #[instrument(skip(self, credential), fields(session_id = %session.id))]
    pub async fn close(&self, session: &Session, credential: &str) {
        match self.upstream.delete_session(&session.id, credential).await {
            Ok(()) => {
                record_session_teardown("ok");
                debug!("Session closed");
            }
            Err(e) => {
                record_session_teardown("error");
                warn!(error = %e, "Failed to remove session");
            }
        }
    }

    /// Schedule [`SessionManager::close`] on a detached task.
    ///
    /// The returned handle may be dropped; the task keeps running. Returns
    /// `None` when called outside a tokio runtime, in which case the session
    /// is left for the upstream to expire.
    pub fn close_detached(
        &self,
        session: Session,
        credential: String,
    ) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            record_session_teardown("skipped");
            warn!(session_id = %session.id, "No runtime available, session not removed");
            return None;
        };

        let manager = self.clone();
        Some(runtime.spawn(async move {
            manager.close(&session, &credential).await;
        }))
    }
}
