use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per user; a message pipeline holds its user's guard from
/// state read to final write.
#[derive(Default)]
pub struct UserLocks {
    inner: DashMap<i64, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let mutex = self
            .inner
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drops entries nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, m| Arc::strong_count(m) > 1);
        before - self.inner.len()
    }
}
