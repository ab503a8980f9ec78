//! Live calls and the registry that tracks them.
//!
//! A [`Call`] is the outside handle to one running [`TurnController`] task.
//! The registry replaces process-wide globals: every piece of per-call state
//! lives in the controller task, reachable only through its event queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::transport::{CHANNEL_BUFFER_SIZE, Inbound, TransportHandle};
use crate::core::turn::{CallBackends, CallEvent, ConversationHistory, TurnController, TurnSettings};

/// Handle to one running call
#[derive(Debug)]
pub struct Call {
    id: String,
    started_at: Instant,
    events: mpsc::Sender<CallEvent>,
}

impl Call {
    /// Spawn the call's controller task.
    pub fn spawn(
        id: impl Into<String>,
        transport: TransportHandle,
        backends: CallBackends,
        settings: TurnSettings,
    ) -> (Self, JoinHandle<ConversationHistory>) {
        let id = id.into();
        let (events, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let controller = TurnController::new(id.clone(), transport, backends, settings);
        let task = tokio::spawn(controller.run(events_rx));

        (
            Self {
                id,
                started_at: Instant::now(),
                events,
            },
            task,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Queue an inbound item. Returns false once the controller has exited.
    pub async fn deliver(&self, inbound: Inbound) -> bool {
        self.events.send(CallEvent::Inbound(inbound)).await.is_ok()
    }

    /// Ask the controller to tear the call down.
    pub async fn hangup(&self) {
        if self.events.send(CallEvent::Hangup).await.is_err() {
            debug!(call_id = %self.id, "Call already finished at hangup");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.events.is_closed()
    }
}

/// Live calls keyed by call id
#[derive(Debug, Default)]
pub struct CallRegistry {
    calls: RwLock<HashMap<String, Arc<Call>>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, call: Call) -> Arc<Call> {
        let call = Arc::new(call);
        let previous = self
            .calls
            .write()
            .insert(call.id.clone(), call.clone());
        if previous.is_some() {
            debug!(call_id = %call.id, "Replaced call with the same id");
        }
        info!(call_id = %call.id, active = self.len(), "Call registered");
        call
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Call>> {
        let removed = self.calls.write().remove(id);
        if let Some(call) = &removed {
            info!(
                call_id = %id,
                duration_ms = call.started_at.elapsed().as_millis() as u64,
                active = self.len(),
                "Call removed"
            );
        }
        removed
    }

    /// Remove `call` only if it is still the entry registered under its id.
    pub fn unregister(&self, call: &Arc<Call>) -> bool {
        let mut calls = self.calls.write();
        let registered = calls
            .get(&call.id)
            .is_some_and(|current| Arc::ptr_eq(current, call));
        if !registered {
            debug!(call_id = %call.id, "Call already replaced or removed");
            return false;
        }
        calls.remove(&call.id);
        let active = calls.len();
        drop(calls);

        info!(
            call_id = %call.id,
            duration_ms = call.started_at.elapsed().as_millis() as u64,
            active,
            "Call removed"
        );
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<Call>> {
        self.calls.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.calls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.read().is_empty()
    }

    /// Hang up every live call, e.g. on shutdown.
    pub async fn hangup_all(&self) {
        let calls: Vec<Arc<Call>> = self.calls.read().values().cloned().collect();
        for call in calls {
            call.hangup().await;
        }
    }
}
