/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Sorted deadline list.
//!
//! Holds one entry per sequencer with an armed timeout, ordered by absolute
//! expiry. Entries with equal expiry fire in the order they were armed.

use super::core::SequencerId;
use crossbeam_skiplist::SkipSet;

/// Position of a sequencer in the [`DeadlineList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct DeadlineKey {
    /// Absolute expiry in clock microseconds.
    pub(crate) expiry_us: u64,
    ticket: u64,
    pub(crate) id: SequencerId,
}

/// Deadlines sorted ascending by expiry.
///
/// Backed by a [`SkipSet`] for ordered iteration from the front and removal
/// by key. Its lock-free concurrency goes unused: the list is only touched
/// under the owning context's lock, so the mutating methods take
/// `&mut self`.
#[derive(Default)]
pub(crate) struct DeadlineList {
    entries: SkipSet<DeadlineKey>,
    next_ticket: u64,
}

impl DeadlineList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Arms a deadline and returns the key needed to cancel it.
    pub(crate) fn insert(&mut self, id: SequencerId, expiry_us: u64) -> DeadlineKey {
        let key = DeadlineKey {
            expiry_us,
            ticket: self.next_ticket,
            id,
        };
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.entries.insert(key);
        key
    }

    pub(crate) fn remove(&mut self, key: &DeadlineKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes every entry with `expiry_us <= now_us`, earliest first.
    pub(crate) fn pop_expired(&mut self, now_us: u64) -> Vec<DeadlineKey> {
        let mut expired = Vec::new();
        while let Some(front) = self.entries.front() {
            if front.value().expiry_us > now_us {
                break;
            }
            let key = *front.value();
            drop(front);
            self.entries.remove(&key);
            expired.push(key);
        }
        expired
    }

    /// Microseconds from `now_us` until the earliest deadline, if any.
    pub(crate) fn next_in(&self, now_us: u64) -> Option<u64> {
        self.entries
            .front()
            .map(|e| e.value().expiry_us.saturating_sub(now_us).max(1))
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
