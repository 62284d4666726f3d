//! Per-board mutual exclusion
//!
//! Two concurrent syncs of the same board would each mint a template for the
//! same new descriptor. Every board-mutating operation takes the board's lock
//! first; operations spanning two boards take both in id order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Guards held for the duration of one operation
pub struct BoardGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

#[derive(Default)]
pub struct BoardLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl BoardLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, board_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        // An entry only referenced by the map is neither held nor awaited
        locks.retain(|id, lock| *id == board_id || Arc::strong_count(lock) > 1);
        locks.entry(board_id).or_default().clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }

    pub async fn lock(&self, board_id: Uuid) -> BoardGuard {
        let guard = self.entry(board_id).lock_owned().await;
        BoardGuard { _guards: vec![guard] }
    }

    /// Lock two boards in a fixed order; a single lock when they are the same
    pub async fn lock_pair(&self, a: Uuid, b: Uuid) -> BoardGuard {
        if a == b {
            return self.lock(a).await;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first = self.entry(first).lock_owned().await;
        let second = self.entry(second).lock_owned().await;
        BoardGuard {
            _guards: vec![first, second],
        }
    }
}
