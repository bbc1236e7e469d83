/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! # sequencer-sched
//!
//! A per-thread scheduler for many small asynchronous state machines
//! ("sequencers") that run cooperatively inside a single event-loop tick.
//!
//! Each sequencer owns a FIFO queue of typed events and a callback. The
//! owning event loop calls [`ThreadContext::dispatch_pending`] once per
//! iteration to deliver one event to every sequencer with pending work, and
//! [`ThreadContext::check_timeouts`] to expire deadlines and broadcast
//! heartbeats. [`ContextDriver`] provides a ready-made tokio loop.
//!
//! ## Guarantees
//!
//! - Per-sequencer delivery is strictly FIFO.
//! - One event per pending sequencer per dispatch pass; no sequencer is
//!   serviced twice in one pass.
//! - A sequencer is pending exactly when its queue is non-empty.
//! - Once destruction starts no more events are accepted, and undelivered
//!   events are freed, never delivered.
//!
//! [`ThreadContext::dispatch_pending`]: sequencer::ThreadContext::dispatch_pending
//! [`ThreadContext::check_timeouts`]: sequencer::ThreadContext::check_timeouts
//! [`ContextDriver`]: sequencer::ContextDriver

pub mod sequencer;

pub use sequencer::{
    EventKind, Flow, SchedulerConfig, SequencerError, SequencerEvent, SequencerId, SequencerInfo,
    ThreadContext,
};
