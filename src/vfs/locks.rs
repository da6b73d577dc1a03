//! Per-path mutual exclusion.
//!
//! One `tokio::sync::Mutex` per path, created on demand. Multi-path
//! operations take their locks in sorted order so two operations can never
//! wait on each other in a cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Drop idle lock entries once the table grows past this.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held locks; released on drop.
pub struct PathGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_lock(&self, path: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.len() > PRUNE_THRESHOLD {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Block until every path in `paths` is locked. Duplicates are fine.
    ///
    /// Must not be called from inside an async context.
    pub fn acquire(&self, paths: &[&str]) -> PathGuard {
        let mut sorted: Vec<&str> = paths.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let guards = sorted
            .into_iter()
            .map(|p| self.get_lock(p).blocking_lock_owned())
            .collect();
        PathGuard { _guards: guards }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}
