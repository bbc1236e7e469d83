/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Retry and backoff policy carried by sequencers.
//!
//! The scheduler stores a policy reference per sequencer and hands it back
//! to the callback; it never interprets it.

use serde::{Deserialize, Serialize};

/// Backoff table and connection-liveness limits for a sequencer's peer.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::RetryPolicy;
///
/// let policy = RetryPolicy {
///     retry_ms_table: vec![100, 500, 2_000],
///     ..RetryPolicy::default()
/// };
/// assert_eq!(policy.delay_ms(0), Some(100));
/// assert_eq!(policy.delay_ms(9), Some(2_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before each retry, in milliseconds. The last entry repeats.
    pub retry_ms_table: Vec<u32>,

    /// Failed attempts to absorb before reporting failure upwards.
    pub conceal_count: u16,

    /// Seconds of silence before the peer should be pinged.
    pub secs_since_valid_ping: u16,

    /// Seconds of silence before the peer is considered gone.
    pub secs_since_valid_hangup: u16,

    /// Random jitter applied to each delay, as a percentage.
    pub jitter_percent: u8,
}

impl RetryPolicy {
    /// Returns the delay for the zero-based `attempt`, clamped to the last
    /// table entry, or `None` for an empty table.
    #[must_use]
    pub fn delay_ms(&self, attempt: usize) -> Option<u32> {
        let last = self.retry_ms_table.len().checked_sub(1)?;
        self.retry_ms_table.get(attempt.min(last)).copied()
    }

    /// Returns `true` while `attempt` failures should still be hidden from
    /// the caller.
    #[inline]
    #[must_use]
    pub fn conceals(&self, attempt: usize) -> bool {
        attempt < usize::from(self.conceal_count)
    }
}
