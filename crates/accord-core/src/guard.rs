use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per subject: turns for the same subject run strictly one at a time,
/// different subjects proceed in parallel. Entries are dropped once no turn holds or awaits
/// them.
#[derive(Debug, Default)]
pub struct SubjectLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held for the duration of one turn.
pub struct SubjectTurn<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    subject_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SubjectTurn<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone of the Arc, so a count of one means the map is the only owner.
        self.locks
            .remove_if(&self.subject_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SubjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, subject_id: &str) -> SubjectTurn<'_> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let lock = self
            .locks
            .entry(subject_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        SubjectTurn {
            locks: &self.locks,
            subject_id: subject_id.to_string(),
            guard: Some(guard),
        }
    }

    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}
