use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

/// Lazily created mutex per key, used to serialise read-modify-write cycles.
pub(crate) struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Run `f` while holding the lock for `key`.
    ///
    /// The guarded value is `()`, so a poisoned lock carries no broken state
    /// and is simply reclaimed.
    pub(crate) fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        let handle = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            let handle = locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())));
            Arc::clone(handle)
        };

        let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}
