use greenmon_common::types::DedupKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

type KeyMutex = Arc<tokio::sync::Mutex<()>>;

/// Per-key async locks serialising the lookup-then-insert sequence.
///
/// Entries exist only while some task holds or waits on them.
#[derive(Default)]
pub(crate) struct KeyLocks {
    inner: Mutex<HashMap<DedupKey, KeyMutex>>,
}

/// A claim on one key's lock. Dropping it, including when the owning future
/// is abandoned mid-await, prunes the map entry once no other claim remains.
pub(crate) struct KeyHandle<'a> {
    locks: &'a KeyLocks,
    key: DedupKey,
    lock: KeyMutex,
}

impl KeyLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<DedupKey, KeyMutex>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the lock for `key`, creating it on first use.
    pub(crate) fn handle(&self, key: &DedupKey) -> KeyHandle<'_> {
        let lock = self
            .map()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        KeyHandle {
            locks: self,
            key: key.clone(),
            lock,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}

impl KeyHandle<'_> {
    pub(crate) async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for KeyHandle<'_> {
    fn drop(&mut self) {
        // The map's Arc plus ours: no other claim remains.
        let mut map = self.locks.map();
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2)
        {
            map.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenmon_common::types::ConditionType;

    fn key(device: &str) -> DedupKey {
        DedupKey {
            greenhouse_id: "gh-1".into(),
            condition: ConditionType::HumidityHigh,
            device_id: device.into(),
        }
    }

    #[test]
    fn entry_lives_while_any_handle_does() {
        let locks = KeyLocks::default();
        let a = locks.handle(&key("d1"));
        let b = locks.handle(&key("d1"));
        let other = locks.handle(&key("d2"));
        assert_eq!(locks.len(), 2);

        drop(a);
        assert_eq!(locks.len(), 2);
        drop(b);
        assert_eq!(locks.len(), 1);
        drop(other);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn second_claim_waits_for_the_first() {
        let locks = KeyLocks::default();
        let first = locks.handle(&key("d1"));
        let second = locks.handle(&key("d1"));

        let held = first.lock().await;
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), second.lock())
            .await
            .is_err());
        drop(held);
        let _held = second.lock().await;
    }
}
