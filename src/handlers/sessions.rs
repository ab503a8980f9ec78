use axum::{extract::State, response::Json};
use std::sync::Arc;
use tracing::info;

use crate::errors::AppResult;
use crate::state::{AppState, SessionTicket};

/// Issue a single-use token for one `/ws` connection.
///
/// Answers 503 when the server could not run a call anyway, so clients learn
/// about a missing provider key before they open the socket.
pub async fn create_session(State(state): State<Arc<AppState>>) -> AppResult<Json<SessionTicket>> {
    state.core_state.call_backends()?;

    let ticket = state.sessions.issue().await;
    info!(
        session_id = %ticket.session_id,
        expires_in = ticket.expires_in,
        "Session created"
    );
    Ok(Json(ticket))
}
