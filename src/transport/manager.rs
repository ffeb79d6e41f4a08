// ABOUTME: One lazily-opened session per (hostname, port), shared by every worker in a run.
// ABOUTME: The cache lock covers lookup/insert only; connection attempts run outside it.

use super::TransportError;
use super::session::{Connector, RemoteSession};
use crate::config::Target;
use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh;
use crate::types::SessionKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

type Connected = Result<Arc<dyn RemoteSession>, Arc<ssh::Error>>;
type Slot = Arc<OnceCell<Connected>>;

/// Owns every session opened during one run.
///
/// Concurrent requests for the same key share a single connection attempt,
/// and its outcome, including failure, is kept for the rest of the run.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    slots: Mutex<HashMap<SessionKey, Slot>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.slots.lock().len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            slots: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub async fn get_session(&self, target: &Target) -> Result<Arc<dyn RemoteSession>, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let key = target.session_key();
        let slot = Arc::clone(self.slots.lock().entry(key.clone()).or_default());

        let connected = slot
            .get_or_init(|| async {
                tracing::debug!("Opening session to {} ({})", target.name, key);
                self.connector.connect(target).await.map_err(|e| {
                    tracing::error!("Failed to connect to {}: {}", target.name, e);
                    Arc::new(e)
                })
            })
            .await;

        match connected {
            Ok(session) => Ok(Arc::clone(session)),
            Err(source) => Err(TransportError::Session {
                key,
                source: Arc::clone(source),
            }),
        }
    }

    /// Number of keys that have been requested this run.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every open session. Only the first call does anything.
    pub async fn close_all(&self, diagnostics: &Diagnostics) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }

        let slots: Vec<(SessionKey, Slot)> = self.slots.lock().drain().collect();
        let mut closed = 0;
        for (key, slot) in slots {
            let Some(Ok(session)) = slot.get() else {
                continue;
            };
            match session.close().await {
                Ok(()) => closed += 1,
                Err(e) => diagnostics.warn(Warning::ssh_disconnect(format!(
                    "failed to close session to {}: {}",
                    key, e
                ))),
            }
        }
        tracing::info!("Closed {} SSH session(s)", closed);
        closed
    }
}
