use std::sync::Arc;
use std::time::Instant;

use chunkwise_common::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

/// Mutual exclusion between migration invocations, keyed by migration name.
///
/// The orchestrator never locks on its own; callers inject an implementation
/// when concurrent invocations are possible.
pub trait MigrationLock: Send + Sync {
    /// Fails with [`Error::Locked`] when `migration` is already held.
    fn try_acquire(&self, migration: &str) -> Result<()>;
    fn release(&self, migration: &str);
}

/// Releases the lock when dropped, including on early return.
pub struct LockGuard<'a> {
    lock: &'a dyn MigrationLock,
    migration: String,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(lock: &'a dyn MigrationLock, migration: &str) -> Result<Self> {
        lock.try_acquire(migration)?;
        debug!(migration, "migration lock acquired");
        Ok(Self {
            lock,
            migration: migration.to_string(),
        })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(&self.migration);
        debug!(migration = %self.migration, "migration lock released");
    }
}

pub(crate) fn guard<'a>(
    lock: Option<&'a Arc<dyn MigrationLock>>,
    migration: &str,
) -> Result<Option<LockGuard<'a>>> {
    lock.map(|l| LockGuard::acquire(l.as_ref(), migration))
        .transpose()
}

/// In-process lock. Only serializes callers that share this instance.
#[derive(Default)]
pub struct LocalMigrationLock {
    held: DashMap<String, Instant>,
}

impl LocalMigrationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, migration: &str) -> bool {
        self.held.contains_key(migration)
    }
}

impl MigrationLock for LocalMigrationLock {
    fn try_acquire(&self, migration: &str) -> Result<()> {
        match self.held.entry(migration.to_string()) {
            Entry::Occupied(entry) => Err(Error::Locked(format!(
                "{migration} has been running for {}ms",
                entry.get().elapsed().as_millis()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
                Ok(())
            }
        }
    }

    fn release(&self, migration: &str) {
        self.held.remove(migration);
    }
}
