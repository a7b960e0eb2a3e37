use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Mutex, MutexGuard, PoisonError};

use mcuwire_frame::Response;

use crate::error::SessionError;

pub(crate) type Outcome = Result<Response, SessionError>;

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-flight requests keyed by sequence number.
///
/// Each entry is a single-slot channel. Whoever removes the entry (the
/// dispatcher on a matching response, the waiter on timeout, or a drain on
/// disconnect) is the only party that may complete it, so a slot is never
/// resolved twice.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    slots: Mutex<HashMap<u16, SyncSender<Outcome>>>,
}

impl PendingTable {
    /// Add an entry for `seq`. `None` if one already exists.
    pub fn register(&self, seq: u16) -> Option<Receiver<Outcome>> {
        let mut slots = lock(&self.slots);
        if slots.contains_key(&seq) {
            return None;
        }
        let (tx, rx) = mpsc::sync_channel(1);
        slots.insert(seq, tx);
        Some(rx)
    }

    /// Complete and remove the entry for `seq`. False if there was none.
    pub fn resolve(&self, seq: u16, outcome: Outcome) -> bool {
        let Some(slot) = lock(&self.slots).remove(&seq) else {
            return false;
        };
        // The waiter may already have given up.
        let _ = slot.send(outcome);
        true
    }

    /// Remove the entry for `seq` without completing it.
    pub fn cancel(&self, seq: u16) -> bool {
        lock(&self.slots).remove(&seq).is_some()
    }

    /// Fail and remove every entry. Returns how many were drained.
    pub fn drain(&self, error: impl Fn() -> SessionError) -> usize {
        let slots: Vec<_> = lock(&self.slots).drain().collect();
        let count = slots.len();
        for (_, slot) in slots {
            let _ = slot.send(Err(error()));
        }
        count
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }
}
