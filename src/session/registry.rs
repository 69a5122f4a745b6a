//! Registry of live HTTP sessions.
//!
//! The registry is the only shared mutable state of the HTTP transport. It is
//! constructed once and injected wherever sessions are looked up.

use crate::session::binding::SessionBinding;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionBinding>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh random id and a default binding.
    pub async fn create(&self) -> Arc<SessionBinding> {
        let (_, binding) = self.create_with(|id| SessionBinding::new(id)).await;
        binding
    }

    /// Create a session whose binding is built by `factory` from the new id.
    ///
    /// Id generation, binding construction and insertion happen under one
    /// write lock, so two concurrent creations can never observe or claim
    /// the same id and no lookup sees a half-registered session.
    pub async fn create_with<F>(&self, factory: F) -> (String, Arc<SessionBinding>)
    where
        F: FnOnce(&str) -> SessionBinding,
    {
        let mut sessions = self.sessions.write().await;
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let binding = Arc::new(factory(&id));
        sessions.insert(id.clone(), binding.clone());
        info!(session_id = %id, active = sessions.len(), "Session created");
        (id, binding)
    }

    pub async fn lookup(&self, id: &str) -> Option<Arc<SessionBinding>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session and close its binding. Returns false if it was not live.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(binding) => {
                binding.close();
                info!(
                    session_id = %id,
                    requests = binding.request_count(),
                    "Session closed"
                );
                true
            }
            None => {
                debug!(session_id = %id, "Session already gone");
                false
            }
        }
    }

    /// Close every session, used at shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        for (_, binding) in &drained {
            binding.close();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Closed all sessions");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ids of the live sessions, in no particular order.
    pub async fn ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
