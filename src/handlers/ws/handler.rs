//! Axum WebSocket handler
//!
//! Upgrades `/ws`, runs the writer task, and feeds frames to the call's
//! turn controller until the caller goes away.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::call::Call;
use crate::core::transport::{ClientMessage, Inbound, MessageRoute, ServerMessage, TransportHandle};
use crate::errors::SessionError;
use crate::state::AppState;

/// How long teardown waits for the controller and writer to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Query parameters accepted at upgrade
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub session_id: Option<String>,
    pub token: Option<String>,
}

/// WebSocket voice handler
///
/// When sessions are required the token is redeemed here, so a bad token is
/// answered with 401 and the upgrade never happens.
pub async fn ws_voice_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("WebSocket voice connection upgrade requested");

    if state.config.session_required {
        let (Some(session_id), Some(token)) = (&params.session_id, &params.token) else {
            return SessionError::MissingToken.into_response();
        };
        if let Err(e) = state.sessions.redeem(session_id, token).await {
            return e.into_response();
        }
    }

    // Registry keys are always ours; a client-chosen id is only logged
    let call_id = Uuid::new_v4().to_string();
    if let Some(session_id) = &params.session_id {
        info!(call_id = %call_id, session_id = %session_id, "Call bound to session");
    }

    ws.on_upgrade(move |socket| handle_voice_socket(socket, state, call_id))
}

/// Drain the outbound queue into the socket
async fn run_writer(
    mut sender: SplitSink<WebSocket, Message>,
    mut routes: mpsc::Receiver<MessageRoute>,
) {
    while let Some(route) = routes.recv().await {
        let result = match route {
            MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                Err(e) => {
                    error!("Failed to serialize outgoing message: {}", e);
                    continue;
                }
            },
            MessageRoute::Close => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = result {
            error!("Failed to send WebSocket message: {}", e);
            break;
        }
    }
}

async fn handle_voice_socket(socket: WebSocket, app_state: Arc<AppState>, call_id: String) {
    info!(call_id = %call_id, "WebSocket voice connection established");

    let (sender, mut receiver) = socket.split();
    let (transport, routes) = TransportHandle::channel();
    let mut writer = tokio::spawn(run_writer(sender, routes));

    let backends = match app_state.core_state.call_backends() {
        Ok(backends) => backends,
        Err(e) => {
            error!(call_id = %call_id, "Cannot start call: {}", e);
            let _ = transport.send_control(ServerMessage::error(e.to_string())).await;
            transport.close().await;
            drop(transport);
            if timeout(SHUTDOWN_GRACE, &mut writer).await.is_err() {
                writer.abort();
            }
            return;
        }
    };

    let (call, controller) = Call::spawn(
        call_id.clone(),
        transport.clone(),
        backends,
        app_state.config.turn_settings(),
    );
    let call = app_state.calls.register(call);

    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(msg) => {
                if !process_message(msg, &call, &transport).await {
                    break;
                }
            }
            Err(e) => {
                warn!(call_id = %call_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    // Clean up resources
    call.hangup().await;
    app_state.calls.unregister(&call);
    match timeout(SHUTDOWN_GRACE, controller).await {
        Ok(Ok(history)) => debug!(call_id = %call_id, entries = history.len(), "Call finished"),
        Ok(Err(e)) => error!(call_id = %call_id, "Turn controller panicked: {}", e),
        Err(_) => warn!(call_id = %call_id, "Turn controller did not stop in time"),
    }
    writer.abort();

    info!(call_id = %call_id, "WebSocket voice connection terminated");
}

/// Route one frame. Returns false when the connection should end.
async fn process_message(msg: Message, call: &Call, transport: &TransportHandle) -> bool {
    match msg {
        Message::Text(text) => {
            debug!("Received text message: {} bytes", text.len());

            let control: ClientMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Failed to parse incoming message: {}", e);
                    let _ = transport
                        .send_control(ServerMessage::error(format!("Invalid message format: {e}")))
                        .await;
                    return true;
                }
            };

            call.deliver(Inbound::Control(control)).await
        }
        Message::Binary(data) => call.deliver(Inbound::Audio(data)).await,
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!("WebSocket connection closed by client");
            false
        }
    }
}
