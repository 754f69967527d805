use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// One mutex per generated artifact path.
///
/// Entries are never removed; artifacts themselves are never removed either.
#[derive(Clone, Default)]
pub struct ArtifactLocks {
    locks: Arc<RwLock<HashMap<PathBuf, Arc<Mutex<()>>>>>,
}

impl ArtifactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`.
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let existing = self.locks.read().await.get(path).cloned();

        let mutex = match existing {
            Some(mutex) => mutex,
            None => self
                .locks
                .write()
                .await
                .entry(path.to_path_buf())
                .or_default()
                .clone(),
        };

        mutex.lock_owned().await
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}
