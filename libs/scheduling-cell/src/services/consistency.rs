use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Single-writer serialization keyed by therapist id. Accept paths hold the
/// therapist's lock across their final conflict check and the status write,
/// so two simultaneous requests for the same slot cannot both pass the
/// check inside one process.
///
/// Cross-process protection still belongs to the store (unique index on
/// ACCEPTED (therapist_id, scheduled_to)).
#[derive(Default)]
pub struct TherapistLockRegistry {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TherapistLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, therapist_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(
                locks
                    .entry(therapist_id)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        debug!("Acquiring booking lock for therapist {}", therapist_id);
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn serializes_writers_for_the_same_therapist() {
        let registry = Arc::new(TherapistLockRegistry::new());
        let therapist_id = Uuid::new_v4();
        let in_critical_section = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let counter = Arc::clone(&in_critical_section);
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire(therapist_id).await;
                let inside = counter.fetch_add(1, Ordering::SeqCst);
                assert_eq!(inside, 0, "two writers entered the critical section");
                tokio::task::yield_now().await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn different_therapists_do_not_contend() {
        let registry = TherapistLockRegistry::new();
        let first = registry.acquire(Uuid::new_v4()).await;
        // A second therapist's lock must be immediately available while the
        // first guard is still held.
        let second = registry.acquire(Uuid::new_v4()).await;
        drop(first);
        drop(second);
    }
}
