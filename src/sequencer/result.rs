/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Callback outcome types.
//!
//! This module defines what a sequencer callback hands back to the
//! dispatcher after handling one event.

/// Outcome of delivering one event to a sequencer callback.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::Flow;
///
/// assert!(Flow::Continue.is_continue());
/// assert!(Flow::Destroy.is_destroy());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Keep the sequencer alive.
    #[default]
    Continue,

    /// Tear the sequencer down right after this event.
    Destroy,
}

impl Flow {
    /// Returns `true` if the sequencer should stay alive.
    #[inline]
    #[must_use]
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }

    /// Returns `true` if the callback asked to be destroyed.
    #[inline]
    #[must_use]
    pub fn is_destroy(&self) -> bool {
        matches!(self, Self::Destroy)
    }
}

/// What the dispatcher does with the rest of a tick once a callback returns
/// [`Flow::Destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// End the tick; sequencers not yet serviced wait for the next one.
    #[default]
    StopTick,

    /// Keep servicing the remaining pending sequencers in the same tick.
    ContinueTick,
}
