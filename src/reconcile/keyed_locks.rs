//! Reference-counted per-application mutexes.
//!
//! The invariant is at-most-one critical section per application; a single
//! process-wide lock would serialize unrelated applications for no reason.
//! Entries are removed once the last holder leaves so the map does not
//! grow with the total number of applications ever seen.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::AppKey;

struct LockEntry {
    lock: Arc<Mutex<()>>,
    holders: usize,
}

#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: DashMap<AppKey, LockEntry>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Block until this key's critical section is free. The returned guard
    /// releases it (and garbage-collects the entry) on drop.
    pub(crate) async fn acquire(&self, key: &AppKey) -> KeyedLockGuard<'_> {
        let lock = {
            let mut entry = self.locks.entry(key.clone()).or_insert_with(|| LockEntry {
                lock: Arc::new(Mutex::new(())),
                holders: 0,
            });
            entry.holders += 1;
            entry.lock.clone()
        };

        let guard = lock.lock_owned().await;
        KeyedLockGuard {
            locks: self,
            key: key.clone(),
            _guard: guard,
        }
    }

    fn release(&self, key: &AppKey) {
        let last_holder = if let Some(mut entry) = self.locks.get_mut(key) {
            entry.holders -= 1;
            entry.holders == 0
        } else {
            false
        };

        if last_holder {
            self.locks.remove_if(key, |_, entry| entry.holders == 0);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

pub(crate) struct KeyedLockGuard<'a> {
    locks: &'a KeyedLocks,
    key: AppKey,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}
