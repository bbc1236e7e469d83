/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Sequencer module for cooperative, event-driven state machines.
//!
//! A sequencer is a named state machine fed by its own FIFO queue of typed
//! events. Every sequencer belongs to one [`ThreadContext`] for its whole
//! life; the context's event loop delivers at most one event per pending
//! sequencer per dispatch pass, turns expired deadlines into
//! [`EventKind::TimedOut`] events, and broadcasts a periodic
//! [`EventKind::Heartbeat`] to everyone.
//!
//! # Architecture
//!
//! - Sequencers live in a generational arena owned by the context
//! - The context tracks all sequencers, those with queued events, and those
//!   with an armed deadline, all under one lock
//! - Callbacks run outside the lock and may queue events, arm timeouts or
//!   destroy sequencers, including themselves
//! - Destruction delivers a synchronous [`EventKind::Destroyed`] call and
//!   frees any undelivered events
//!
//! # Examples
//!
//! ```
//! use sequencer_sched::sequencer::{EventKind, Flow, SequencerInfo, ThreadContext};
//!
//! let context = ThreadContext::new(0);
//!
//! let id = context
//!     .create(SequencerInfo::from_fn("handshake", |cx, event| {
//!         match event.kind {
//!             EventKind::Created => {
//!                 cx.set_timeout(5_000_000).ok();
//!                 Flow::Continue
//!             }
//!             EventKind::TimedOut => Flow::Destroy,
//!             _ => Flow::Continue,
//!         }
//!     }))
//!     .unwrap();
//!
//! // One pass per event loop iteration.
//! context.dispatch_pending();
//! assert!(context.deadline(id).is_some());
//!
//! let next_wake_us = context.check_timeouts(context.now());
//! assert!(next_wake_us.is_some());
//!
//! context.destroy_all();
//! assert!(context.is_empty());
//! ```

pub mod callback;
pub mod clock;
pub mod config;
pub mod core;
mod deadline;
pub mod driver;
pub mod error;
pub mod event;
pub mod result;
pub mod retry;

#[cfg(test)]
mod tests;

// Re-export main types
pub use callback::{SequencerCallback, SequencerCx, SequencerInfo};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::SchedulerConfig;
pub use core::{SequencerId, ThreadContext};
pub use driver::{ContextDriver, DriverHandle, DriverStats};
pub use error::{ConfigError, SequencerError};
pub use event::{EventKind, Payload, PeerHandle, SequencerEvent};
pub use result::{DispatchPolicy, Flow};
pub use retry::RetryPolicy;
