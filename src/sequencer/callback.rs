/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Sequencer callbacks and the context they run in.
//!
//! A callback is the sequencer's state machine. Its own fields are the
//! sequencer's private user data: the scheduler stores the value, hands it
//! one event at a time, and drops it when the sequencer is destroyed.

use super::core::{SequencerId, ThreadContext};
use super::error::SequencerError;
use super::event::{EventKind, Payload, PeerHandle, SequencerEvent};
use super::result::Flow;
use super::retry::RetryPolicy;
use std::fmt;
use std::sync::Arc;

/// A sequencer's event handler.
///
/// Called outside the context lock, so it may freely queue events, arm
/// timeouts, create sequencers or destroy any sequencer of the same
/// context, including itself.
pub trait SequencerCallback: Send + 'static {
    /// Handles one event. Return [`Flow::Destroy`] to have the sequencer
    /// torn down right after this call.
    fn on_event(&mut self, cx: &SequencerCx<'_>, event: &SequencerEvent) -> Flow;
}

impl<F> SequencerCallback for F
where
    F: FnMut(&SequencerCx<'_>, &SequencerEvent) -> Flow + Send + 'static,
{
    #[inline]
    fn on_event(&mut self, cx: &SequencerCx<'_>, event: &SequencerEvent) -> Flow {
        self(cx, event)
    }
}

/// Everything needed to create a sequencer.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::{Flow, SequencerInfo, ThreadContext};
///
/// let context = ThreadContext::new(0);
/// let info = SequencerInfo::from_fn("probe", |_cx, _event| Flow::Continue);
/// let id = context.create(info).unwrap();
/// assert_eq!(context.name(id).as_deref(), Some("probe"));
/// ```
pub struct SequencerInfo {
    pub(crate) name: Arc<str>,
    pub(crate) callback: Box<dyn SequencerCallback>,
    pub(crate) retry: Option<Arc<RetryPolicy>>,
}

impl SequencerInfo {
    /// Describes a sequencer driven by `callback`.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, callback: impl SequencerCallback) -> Self {
        Self {
            name: name.into(),
            callback: Box::new(callback),
            retry: None,
        }
    }

    /// Describes a sequencer driven by a closure.
    ///
    /// Prefer this over [`new`](Self::new) for closures so their argument
    /// types are inferred.
    #[must_use]
    pub fn from_fn<F>(name: impl Into<Arc<str>>, callback: F) -> Self
    where
        F: FnMut(&SequencerCx<'_>, &SequencerEvent) -> Flow + Send + 'static,
    {
        Self::new(name, callback)
    }

    /// Attaches a retry policy, returned untouched by [`SequencerCx::retry`].
    #[must_use]
    pub fn with_retry(mut self, retry: Arc<RetryPolicy>) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Returns the sequencer name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for SequencerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequencerInfo")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// View of the running sequencer handed to its callback.
pub struct SequencerCx<'a> {
    context: &'a ThreadContext,
    id: SequencerId,
    name: Arc<str>,
    retry: Option<Arc<RetryPolicy>>,
    created_at_us: u64,
}

impl<'a> SequencerCx<'a> {
    pub(crate) fn new(
        context: &'a ThreadContext,
        id: SequencerId,
        name: Arc<str>,
        retry: Option<Arc<RetryPolicy>>,
        created_at_us: u64,
    ) -> Self {
        Self {
            context,
            id,
            name,
            retry,
            created_at_us,
        }
    }

    /// The id returned by `create` for this sequencer.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SequencerId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The context this sequencer belongs to for its whole life.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &'a ThreadContext {
        self.context
    }

    #[inline]
    #[must_use]
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn created_at_us(&self) -> u64 {
        self.created_at_us
    }

    /// Whole seconds elapsed since creation.
    #[must_use]
    pub fn seconds_since_creation(&self) -> u64 {
        self.context.now().saturating_sub(self.created_at_us) / 1_000_000
    }

    /// Queues an event on this sequencer.
    ///
    /// # Errors
    ///
    /// Same as [`ThreadContext::queue_event`].
    pub fn queue_event(
        &self,
        kind: EventKind,
        data: Option<Payload>,
        aux: Option<Payload>,
    ) -> Result<(), SequencerError> {
        self.context.queue_event(self.id, kind, data, aux)
    }

    /// Arms, re-arms or (with `0`) clears this sequencer's deadline.
    ///
    /// # Errors
    ///
    /// Same as [`ThreadContext::set_timeout`].
    pub fn set_timeout(&self, us: u64) -> Result<(), SequencerError> {
        self.context.set_timeout(self.id, us)
    }

    /// Asks for this sequencer to be destroyed once the current callback
    /// returns. No further events are accepted from this point on.
    ///
    /// # Errors
    ///
    /// Same as [`ThreadContext::destroy`].
    pub fn destroy(&self) -> Result<(), SequencerError> {
        self.context.destroy(self.id)
    }

    /// See [`ThreadContext::check_closing_reference`].
    #[must_use]
    pub fn check_closing_reference(&self, handle: PeerHandle) -> bool {
        self.context.check_closing_reference(self.id, handle)
    }
}

impl fmt::Debug for SequencerCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequencerCx")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tsi", &self.context.tsi())
            .finish()
    }
}
