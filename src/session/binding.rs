//! Live per-session state.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

/// The transport binding of one HTTP session.
///
/// It owns the close signal observed by the session's event streams and
/// counts the requests served. Closing is idempotent.
#[derive(Debug)]
pub struct SessionBinding {
    id: String,
    created_at: DateTime<Utc>,
    closed: watch::Sender<bool>,
    requests: AtomicU64,
}

impl SessionBinding {
    pub fn new(id: impl Into<String>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: id.into(),
            created_at: Utc::now(),
            closed,
            requests: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record one served request and return the running total.
    pub fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Signal every subscriber that the session is gone.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Receiver that observes `true` once the session closes.
    pub fn subscribe_close(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_wakes_subscribers() {
        let binding = SessionBinding::new("abc");
        let mut rx = binding.subscribe_close();
        assert!(!binding.is_closed());

        binding.close();
        rx.wait_for(|closed| *closed).await.unwrap();
        assert!(binding.is_closed());

        // Second close is a no-op
        binding.close();
        assert!(binding.is_closed());
    }

    #[test]
    fn test_request_counter() {
        let binding = SessionBinding::new("abc");
        assert_eq!(binding.record_request(), 1);
        assert_eq!(binding.record_request(), 2);
        assert_eq!(binding.request_count(), 2);
    }
}
