//! Single-flight guard for script executions.
//!
//! [`ActiveSet`] tracks a "currently running" flag per [`ScriptKey`]. The
//! dispatcher acquires a key with [`ActiveSet::try_acquire`]; the returned
//! [`ActiveGuard`] is moved into the execution unit and clears the flag when
//! it is dropped, whichever way the unit ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::ScriptKey;

/// Concurrency-safe map of `ScriptKey -> running`.
///
/// All reads and writes go through one mutex. The critical sections are a
/// single hash lookup and are never held across an `.await`.
#[derive(Debug, Default)]
pub struct ActiveSet {
    flags: Mutex<HashMap<ScriptKey, bool>>,
}

impl ActiveSet {
    /// Create a set with every key seeded as inactive.
    pub fn seeded(keys: impl IntoIterator<Item = ScriptKey>) -> Self {
        let flags = keys.into_iter().map(|key| (key, false)).collect();
        Self {
            flags: Mutex::new(flags),
        }
    }

    /// Atomically flip `key` from inactive to active.
    ///
    /// Returns `None` when the key is already active or was never seeded.
    pub fn try_acquire(self: &Arc<Self>, key: &ScriptKey) -> Option<ActiveGuard> {
        let mut flags = self.lock();
        let flag = flags.get_mut(key)?;
        if *flag {
            return None;
        }
        *flag = true;
        drop(flags);

        Some(ActiveGuard {
            set: Arc::clone(self),
            key: key.clone(),
        })
    }

    /// Whether `key` is currently held by an execution unit.
    pub fn is_active(&self, key: &ScriptKey) -> bool {
        self.lock().get(key).copied().unwrap_or(false)
    }

    /// Number of keys currently active.
    pub fn active_count(&self) -> usize {
        self.lock().values().filter(|active| **active).count()
    }

    /// Number of seeded keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn release(&self, key: &ScriptKey) {
        if let Some(flag) = self.lock().get_mut(key) {
            *flag = false;
        }
    }

    // A panic while the lock is held cannot leave a flag half-written, so a
    // poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<ScriptKey, bool>> {
        self.flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Ownership of one key's active flag.
///
/// Dropping the guard clears the flag exactly once.
#[derive(Debug)]
pub struct ActiveGuard {
    set: Arc<ActiveSet>,
    key: ScriptKey,
}

impl ActiveGuard {
    pub fn key(&self) -> &ScriptKey {
        &self.key
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.set.release(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
