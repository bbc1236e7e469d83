/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Sequencer event types.
//!
//! This module defines the events queued on a sequencer and delivered, one
//! per dispatch tick, to its callback.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque payload carried by an event.
///
/// The scheduler never looks inside a payload; it only keeps it alive until
/// the event has been delivered or discarded.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Identifier of an external resource (typically a connection) that a
/// sequencer is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerHandle(pub u64);

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// The kind of an event.
///
/// The core set is closed; `User` carries caller-defined tags whose meaning
/// is private to the sequencer's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First event any sequencer sees, queued by `create`.
    Created,

    /// Delivered synchronously by `destroy`, never through the queue.
    Destroyed,

    /// The deadline armed with `set_timeout` has passed.
    TimedOut,

    /// Periodic broadcast to every live sequencer.
    Heartbeat,

    /// The peer connection closed.
    PeerClosed(PeerHandle),

    /// The peer connection failed before producing anything.
    PeerFailed(PeerHandle),

    /// Caller-defined tag.
    User(u32),
}

/// An event waiting in, or being delivered from, a sequencer's queue.
///
/// Events are immutable once queued.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::{EventKind, SequencerEvent};
/// use std::sync::Arc;
///
/// let event = SequencerEvent::with_data(EventKind::User(7), Arc::new(42u32));
/// assert_eq!(event.kind, EventKind::User(7));
/// assert_eq!(event.data_ref::<u32>(), Some(&42));
/// assert!(event.aux.is_none());
/// ```
#[derive(Clone)]
pub struct SequencerEvent {
    /// What happened.
    pub kind: EventKind,

    /// Primary payload.
    pub data: Option<Payload>,

    /// Secondary payload.
    pub aux: Option<Payload>,
}

impl SequencerEvent {
    /// Creates an event with both payloads.
    #[must_use]
    pub fn new(kind: EventKind, data: Option<Payload>, aux: Option<Payload>) -> Self {
        Self { kind, data, aux }
    }

    /// Creates an event without payloads.
    #[must_use]
    pub fn bare(kind: EventKind) -> Self {
        Self::new(kind, None, None)
    }

    /// Creates an event carrying only a primary payload.
    #[must_use]
    pub fn with_data(kind: EventKind, data: Payload) -> Self {
        Self::new(kind, Some(data), None)
    }

    /// Downcasts the primary payload.
    #[must_use]
    pub fn data_ref<T: Any>(&self) -> Option<&T> {
        self.data.as_deref().and_then(|d| d.downcast_ref::<T>())
    }

    /// Downcasts the secondary payload.
    #[must_use]
    pub fn aux_ref<T: Any>(&self) -> Option<&T> {
        self.aux.as_deref().and_then(|d| d.downcast_ref::<T>())
    }

    /// Returns `true` if this is a close notification about `handle`.
    #[inline]
    #[must_use]
    pub fn is_peer_closed(&self, handle: PeerHandle) -> bool {
        self.kind == EventKind::PeerClosed(handle)
    }
}

impl fmt::Debug for SequencerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequencerEvent")
            .field("kind", &self.kind)
            .field("data", &self.data.is_some())
            .field("aux", &self.aux.is_some())
            .finish()
    }
}
