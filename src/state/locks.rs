/// Keyed async locks
///
/// One async mutex per key (a sticker's stable id, or a set name), so two
/// requests touching the same files never interleave.
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn get(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // Entries only referenced by the map are idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key.to_string()).or_default().clone()
    }

    /// Wait for exclusive use of `key`; released when the guard drops
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        self.get(key).lock_owned().await
    }

    /// Claim `key` only if nobody holds it right now
    pub fn try_acquire(&self, key: &str) -> Option<OwnedMutexGuard<()>> {
        self.get(key).try_lock_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_same_key_shares_a_lock() {
        let locks = KeyedLocks::default();
        let a = locks.get("AgADone");
        let b = locks.get("AgADone");
        let c = locks.get("AgADtwo");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_idle_locks_are_dropped() {
        let locks = KeyedLocks::default();
        drop(locks.get("AgADone"));
        let _held = locks.get("AgADtwo");
        let map = locks.locks.lock().unwrap();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("AgADtwo"));
    }

    #[tokio::test]
    async fn test_held_key_is_not_claimable() {
        let locks = KeyedLocks::default();
        let guard = locks.acquire("AgADone").await;

        assert!(locks.try_acquire("AgADone").is_none());
        assert!(locks.try_acquire("AgADtwo").is_some());

        drop(guard);
        assert!(locks.try_acquire("AgADone").is_some());
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let locks = Arc::new(KeyedLocks::default());
        let guard = locks.acquire("set:Cats").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire("set:Cats").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }
}
