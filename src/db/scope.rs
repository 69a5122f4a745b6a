//! Scoped acquisition of database connections.
//!
//! Every tool invocation gets a fresh [`ResourceScope`]. The scope acquires a
//! handle from its [`Connector`], lends it to one action and releases it
//! exactly once, whether the action succeeds, fails, panics or times out.
//! A handle that was never acquired is never released.

use crate::error::{DbError, DbResult};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Source of database handles.
///
/// Implementations open a brand-new handle per `acquire` and tear it down in
/// `release`; they hold no handle between calls.
pub trait Connector: Send + Sync {
    type Handle: Send;

    fn acquire(&self) -> impl Future<Output = DbResult<Self::Handle>> + Send;

    fn release(&self, handle: Self::Handle) -> impl Future<Output = DbResult<()>> + Send;
}

/// Time bounds applied to a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimits {
    pub acquire_timeout: Duration,
    pub action_timeout: Duration,
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(crate::config::DEFAULT_CONNECT_TIMEOUT_SECS),
            action_timeout: Duration::from_secs(crate::config::DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

/// One acquire/use/release cycle. Consumed by [`ResourceScope::with_resource`].
pub struct ResourceScope<'a, C: Connector> {
    connector: &'a C,
    limits: ScopeLimits,
}

impl<'a, C: Connector> ResourceScope<'a, C> {
    pub fn new(connector: &'a C, limits: ScopeLimits) -> Self {
        Self { connector, limits }
    }

    /// Run `action` with a freshly acquired handle.
    ///
    /// Acquisition errors are returned as-is and nothing is released. Once a
    /// handle exists it is released before this returns; a release failure
    /// or a release that outlives the acquire timeout is logged and never
    /// replaces the action's result.
    pub async fn with_resource<T, F>(self, action: F) -> DbResult<T>
    where
        T: Send,
        F: for<'h> FnOnce(&'h mut C::Handle) -> BoxFuture<'h, DbResult<T>> + Send,
    {
        let mut handle =
            match timeout(self.limits.acquire_timeout, self.connector.acquire()).await {
                Ok(Ok(handle)) => handle,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(DbError::timeout(
                        "connection acquisition",
                        self.limits.acquire_timeout.as_secs(),
                    ));
                }
            };
        debug!("Database handle acquired");

        let outcome = {
            let guarded = AssertUnwindSafe(action(&mut handle)).catch_unwind();
            match timeout(self.limits.action_timeout, guarded).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(DbError::internal(format!(
                    "tool handler panicked: {}",
                    panic_message(panic.as_ref())
                ))),
                Err(_) => Err(DbError::timeout(
                    "query execution",
                    self.limits.action_timeout.as_secs(),
                )),
            }
        };

        // An expired release drops the handle without closing it
        match timeout(self.limits.acquire_timeout, self.connector.release(handle)).await {
            Ok(Ok(())) => debug!("Database handle released"),
            Ok(Err(e)) => warn!(error = %e, "Failed to release database handle"),
            Err(_) => warn!(
                timeout_secs = self.limits.acquire_timeout.as_secs_f64(),
                "Releasing database handle timed out"
            ),
        }

        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
