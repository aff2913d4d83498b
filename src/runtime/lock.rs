use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One in-flight redirection per process instance.
#[derive(Default)]
pub struct InstanceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds an instance lock. Dropping it unlocks and, when nobody else holds
/// or waits on the instance, removes its registry entry.
pub struct InstanceLockGuard<'a> {
    locks: &'a InstanceLocks,
    instance_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    pub async fn acquire(&self, instance_id: &str) -> InstanceLockGuard<'_> {
        let mut held = InstanceLockGuard {
            locks: self,
            instance_id: instance_id.to_string(),
            guard: None,
        };
        // Clone the Arc out so the map shard lock is released before awaiting.
        let lock = self.locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        held.guard = Some(lock.lock_owned().await);
        held
    }

    /// Drops the entry when nobody holds or waits on it.
    pub fn release_idle(&self, instance_id: &str) {
        self.locks.remove_if(instance_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for InstanceLockGuard<'_> {
    fn drop(&mut self) {
        // unlock before counting references
        self.guard.take();
        self.locks.release_idle(&self.instance_id);
    }
}
