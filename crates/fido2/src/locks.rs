use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// One async lock per device handle
///
/// The tool and the authenticator handle one conversation at a time, so
/// invocations against the same handle queue up here. Different handles
/// never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct DeviceLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl DeviceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `handle`
    pub async fn acquire(&self, handle: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.lock().entry(handle.to_string()).or_default());
        trace!("Waiting for {}", handle);
        lock.lock_owned().await
    }
}
