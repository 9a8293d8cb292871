use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// Clones of a store share one lock.
#[derive(Clone, Debug, Default)]
pub struct PartitionLock {
    inner: Option<Arc<RwLock<()>>>,
}

#[must_use]
#[allow(dead_code)]
pub enum PartitionGuard<'a> {
    Unlocked,
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

impl PartitionLock {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: enabled.then(|| Arc::new(RwLock::new(()))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn shared(&self) -> PartitionGuard<'_> {
        match &self.inner {
            Some(lock) => PartitionGuard::Shared(lock.read().await),
            None => PartitionGuard::Unlocked,
        }
    }

    pub async fn exclusive(&self) -> PartitionGuard<'_> {
        match &self.inner {
            Some(lock) => PartitionGuard::Exclusive(lock.write().await),
            None => PartitionGuard::Unlocked,
        }
    }
}
