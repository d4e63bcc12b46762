use dashmap::DashMap;
use rally_storage::SessionId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes mutations of the same session within this process.
///
/// The store's version check still guards against writers in other processes.
/// An entry lives only while some caller holds or waits on it, so the map
/// stays bounded by the number of sessions in flight.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<SessionId, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a session. Released when the guard drops.
    pub async fn acquire(&self, session_id: &SessionId) -> SessionGuard<'_> {
        let lock = self
            .locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SessionGuard {
            guard: Some(lock.lock_owned().await),
            locks: self,
            session_id: session_id.clone(),
        }
    }
}

/// Exclusive access to one session; drops its map entry when nobody else wants it.
pub struct SessionGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a SessionLocks,
    session_id: SessionId,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Clones happen under the shard lock, so a count of one here means no waiters.
        self.locks
            .locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
