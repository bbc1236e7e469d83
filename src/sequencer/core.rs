/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Core scheduler implementation.
//!
//! This module provides [`ThreadContext`], the per-thread owner of every
//! sequencer, and the dispatch and timer passes its event loop drives.
//!
//! # Locking
//!
//! One mutex guards the sequencer arena, the "all", "pending" and
//! "deadline" collections, and every sequencer's queue. It is held only for
//! short list manipulations. Callbacks always run with the lock released:
//! the callback object is checked out of the arena for the duration of the
//! call and checked back in afterwards.

use super::callback::{SequencerCallback, SequencerCx, SequencerInfo};
use super::clock::{Clock, MonotonicClock};
use super::config::SchedulerConfig;
use super::deadline::{DeadlineKey, DeadlineList};
use super::error::SequencerError;
use super::event::{EventKind, Payload, PeerHandle, SequencerEvent};
use super::result::{DispatchPolicy, Flow};
use super::retry::RetryPolicy;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle to a sequencer.
///
/// Ids are generational: once a sequencer is destroyed its id never
/// resolves again, even after the slot is reused. Each id also names the
/// [`ThreadContext`] that created it and resolves in no other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequencerId {
    context: u64,
    slot: u32,
    generation: u32,
}

impl SequencerId {
    /// Id of the owning context, as returned by [`ThreadContext::id`].
    #[inline]
    #[must_use]
    pub fn context_id(&self) -> u64 {
        self.context
    }
}

impl fmt::Display for SequencerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq#{}:{}.{}", self.context, self.slot, self.generation)
    }
}

struct SequencerEntry {
    name: Arc<str>,
    /// `None` while the callback is running.
    callback: Option<Box<dyn SequencerCallback>>,
    retry: Option<Arc<RetryPolicy>>,
    created_at_us: u64,
    serial: u64,
    queue: VecDeque<SequencerEvent>,
    /// Key in the pending collection; `Some` iff `queue` is non-empty.
    pending_ticket: Option<u64>,
    deadline: Option<DeadlineKey>,
    going_down: bool,
    /// Destroy was requested while the callback was checked out.
    destroy_deferred: bool,
}

impl SequencerEntry {
    fn checkout(&mut self) -> Option<Checkout> {
        let callback = self.callback.take()?;
        Some(Checkout {
            callback,
            name: Arc::clone(&self.name),
            retry: self.retry.clone(),
            created_at_us: self.created_at_us,
        })
    }
}

/// A callback taken out of the arena so it can run without the lock.
struct Checkout {
    callback: Box<dyn SequencerCallback>,
    name: Arc<str>,
    retry: Option<Arc<RetryPolicy>>,
    created_at_us: u64,
}

/// Result of returning a callback to the arena after delivery. Carries the
/// delivered event out so it is freed after the lock is released.
enum Checkin {
    Kept(Option<SequencerEvent>),
    Teardown(Box<dyn SequencerCallback>, Option<SequencerEvent>),
    Orphaned(Box<dyn SequencerCallback>),
}

struct Slot {
    generation: u32,
    entry: Option<SequencerEntry>,
}

/// Generational slot storage for the sequencers of one context.
struct Arena {
    context: u64,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn new(context: u64) -> Self {
        Self {
            context,
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn slot(&self, id: SequencerId) -> Option<&Slot> {
        if id.context != self.context {
            return None;
        }
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.generation == id.generation)
    }

    fn slot_mut(&mut self, id: SequencerId) -> Option<&mut Slot> {
        if id.context != self.context {
            return None;
        }
        self.slots
            .get_mut(id.slot as usize)
            .filter(|s| s.generation == id.generation)
    }

    fn get(&self, id: SequencerId) -> Option<&SequencerEntry> {
        self.slot(id).and_then(|s| s.entry.as_ref())
    }

    fn get_mut(&mut self, id: SequencerId) -> Option<&mut SequencerEntry> {
        self.slot_mut(id).and_then(|s| s.entry.as_mut())
    }

    fn insert(&mut self, entry: SequencerEntry) -> Result<SequencerId, SequencerError> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let slot =
                    u32::try_from(self.slots.len()).map_err(|_| SequencerError::AllocationFailure)?;
                self.slots
                    .try_reserve(1)
                    .map_err(|_| SequencerError::AllocationFailure)?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                slot
            }
        };
        let target = &mut self.slots[slot as usize];
        target.entry = Some(entry);
        Ok(SequencerId {
            context: self.context,
            slot,
            generation: target.generation,
        })
    }

    /// Empties the slot and retires `id`.
    fn take(&mut self, id: SequencerId) -> Option<SequencerEntry> {
        let slot = self.slot_mut(id)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot);
        Some(entry)
    }
}

/// Lock-protected state of a [`ThreadContext`].
struct Registry {
    arena: Arena,
    /// Live sequencers in creation order.
    all: BTreeMap<u64, SequencerId>,
    /// Sequencers with queued events, in the order they became pending.
    pending: BTreeMap<u64, SequencerId>,
    deadlines: DeadlineList,
    next_serial: u64,
    next_pending_ticket: u64,
    last_heartbeat_us: u64,
    /// Makes every queue append fail as if out of memory.
    #[cfg(test)]
    fail_queue_reserve: bool,
}

impl Registry {
    fn new(context: u64) -> Self {
        Self {
            arena: Arena::new(context),
            all: BTreeMap::new(),
            pending: BTreeMap::new(),
            deadlines: DeadlineList::new(),
            next_serial: 0,
            next_pending_ticket: 0,
            last_heartbeat_us: 0,
            #[cfg(test)]
            fail_queue_reserve: false,
        }
    }

    fn insert(
        &mut self,
        name: Arc<str>,
        callback: Box<dyn SequencerCallback>,
        retry: Option<Arc<RetryPolicy>>,
        created_at_us: u64,
    ) -> Result<SequencerId, SequencerError> {
        let serial = self.next_serial;
        let id = self.arena.insert(SequencerEntry {
            name,
            callback: Some(callback),
            retry,
            created_at_us,
            serial,
            queue: VecDeque::new(),
            pending_ticket: None,
            deadline: None,
            going_down: false,
            destroy_deferred: false,
        })?;
        self.next_serial += 1;
        self.all.insert(serial, id);
        Ok(id)
    }

    /// Unlinks a sequencer from every collection and hands back its entry.
    /// The caller drops it, and with it any still-queued events, after
    /// releasing the lock.
    fn remove(&mut self, id: SequencerId) -> Option<SequencerEntry> {
        let entry = self.arena.take(id)?;
        self.all.remove(&entry.serial);
        if let Some(ticket) = entry.pending_ticket {
            self.pending.remove(&ticket);
        }
        if let Some(key) = entry.deadline {
            self.deadlines.remove(&key);
        }
        Some(entry)
    }

    /// Appends an event. Returns `true` if the sequencer just became pending.
    fn enqueue(
        &mut self,
        id: SequencerId,
        event: SequencerEvent,
        sanity_limit: usize,
    ) -> Result<bool, SequencerError> {
        let entry =
            self.arena.get_mut(id).ok_or(SequencerError::UnknownSequencer(id))?;
        if entry.going_down {
            return Err(SequencerError::ShuttingDown(id));
        }
        #[cfg(test)]
        if self.fail_queue_reserve {
            return Err(SequencerError::AllocationFailure);
        }
        entry
            .queue
            .try_reserve(1)
            .map_err(|_| SequencerError::AllocationFailure)?;

        if entry.queue.len() > sanity_limit {
            warn!(
                sequencer = %entry.name,
                depth = entry.queue.len(),
                limit = sanity_limit,
                "more events queued than the sanity limit"
            );
        }

        trace!(sequencer = %entry.name, kind = ?event.kind, "event queued");
        entry.queue.push_back(event);

        if entry.pending_ticket.is_some() {
            return Ok(false);
        }
        let ticket = self.next_pending_ticket;
        self.next_pending_ticket += 1;
        entry.pending_ticket = Some(ticket);
        self.pending.insert(ticket, id);
        Ok(true)
    }

    /// Puts a callback back after delivery, pops the delivered event and
    /// refreshes pending membership.
    fn checkin(
        &mut self,
        id: SequencerId,
        callback: Box<dyn SequencerCallback>,
        flow: Flow,
    ) -> Checkin {
        let Some(entry) = self.arena.get_mut(id) else {
            return Checkin::Orphaned(callback);
        };

        let delivered = entry.queue.pop_front();
        if entry.queue.is_empty() {
            if let Some(ticket) = entry.pending_ticket.take() {
                self.pending.remove(&ticket);
            }
        }

        if flow.is_destroy() || entry.destroy_deferred {
            entry.going_down = true;
            Checkin::Teardown(callback, delivered)
        } else {
            entry.callback = Some(callback);
            Checkin::Kept(delivered)
        }
    }

    fn set_deadline(&mut self, id: SequencerId, expiry_us: Option<u64>) -> Result<(), SequencerError> {
        let entry =
            self.arena.get_mut(id).ok_or(SequencerError::UnknownSequencer(id))?;
        if let Some(key) = entry.deadline.take() {
            self.deadlines.remove(&key);
        }
        if let Some(expiry_us) = expiry_us {
            entry.deadline = Some(self.deadlines.insert(id, expiry_us));
        }
        Ok(())
    }
}

/// Per-thread owner of a set of sequencers.
///
/// The owning event loop calls [`dispatch_pending`](Self::dispatch_pending)
/// and [`check_timeouts`](Self::check_timeouts) once per iteration, and
/// [`destroy_all`](Self::destroy_all) at shutdown. Any thread may queue
/// events; dispatch and callbacks stay on the loop's thread.
///
/// # Examples
///
/// ```
/// use sequencer_sched::sequencer::{EventKind, Flow, SequencerInfo, ThreadContext};
/// use std::sync::{Arc, Mutex};
///
/// let context = ThreadContext::new(0);
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let log = seen.clone();
///
/// let id = context
///     .create(SequencerInfo::from_fn("echo", move |_cx, event| {
///         log.lock().unwrap().push(event.kind);
///         Flow::Continue
///     }))
///     .unwrap();
/// context.queue_event(id, EventKind::User(1), None, None).unwrap();
///
/// while context.dispatch_pending() {}
/// assert_eq!(*seen.lock().unwrap(), vec![EventKind::Created, EventKind::User(1)]);
/// ```
pub struct ThreadContext {
    id: u64,
    tsi: usize,
    config: SchedulerConfig,
    clock: Arc<dyn Clock>,
    registry: Mutex<Registry>,
    wake: Notify,
}

impl ThreadContext {
    /// Creates a context for thread slot `tsi` with default settings and a
    /// [`MonotonicClock`].
    #[must_use]
    pub fn new(tsi: usize) -> Self {
        Self::with_config(tsi, SchedulerConfig::default(), Arc::new(MonotonicClock::new()))
    }

    /// Creates a context with explicit settings and time source.
    #[must_use]
    pub fn with_config(tsi: usize, config: SchedulerConfig, clock: Arc<dyn Clock>) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            tsi,
            config,
            clock,
            registry: Mutex::new(Registry::new(id)),
            wake: Notify::new(),
        }
    }

    /// Creates a sequencer and queues its [`EventKind::Created`] event.
    ///
    /// The returned id is the caller's handle for every other operation.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::AllocationFailure`] if the sequencer or its
    /// first event cannot be stored. Nothing is left behind in that case.
    pub fn create(&self, info: SequencerInfo) -> Result<SequencerId, SequencerError> {
        let SequencerInfo {
            name,
            callback,
            retry,
        } = info;
        let created_at_us = self.clock.now_us();

        let id = self
            .registry
            .lock()
            .insert(Arc::clone(&name), callback, retry, created_at_us)?;

        if let Err(err) = self.queue_event(id, EventKind::Created, None, None) {
            let removed = self.registry.lock().remove(id);
            drop(removed);
            debug!(sequencer = %name, error = %err, "sequencer creation rolled back");
            return Err(err);
        }

        debug!(sequencer = %name, %id, tsi = self.tsi, "sequencer created");
        Ok(id)
    }

    /// Queues an event on a sequencer.
    ///
    /// Marks the sequencer pending if its queue was empty. Exceeding the
    /// configured sanity depth only logs a warning.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::UnknownSequencer`] if `id` is not live
    /// - [`SequencerError::ShuttingDown`] once destruction has begun
    /// - [`SequencerError::AllocationFailure`] if the event cannot be stored
    pub fn queue_event(
        &self,
        id: SequencerId,
        kind: EventKind,
        data: Option<Payload>,
        aux: Option<Payload>,
    ) -> Result<(), SequencerError> {
        self.queue(id, SequencerEvent::new(kind, data, aux))
    }

    /// Queues a prebuilt event. See [`queue_event`](Self::queue_event).
    ///
    /// # Errors
    ///
    /// Same as [`queue_event`](Self::queue_event).
    pub fn queue(&self, id: SequencerId, event: SequencerEvent) -> Result<(), SequencerError> {
        let became_pending =
            self.registry
                .lock()
                .enqueue(id, event, self.config.queue_sanity_limit)?;
        if became_pending {
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Destroys a sequencer.
    ///
    /// The sequencer stops accepting events immediately, its callback gets
    /// a synchronous [`EventKind::Destroyed`] call that bypasses the queue,
    /// and then it is unlinked from every collection and freed along with
    /// any undelivered events.
    ///
    /// Called from inside the sequencer's own callback, the teardown
    /// completes as soon as that callback returns. Calling it again on a
    /// sequencer already going down does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::UnknownSequencer`] if `id` is not live.
    pub fn destroy(&self, id: SequencerId) -> Result<(), SequencerError> {
        let checkout = {
            let mut registry = self.registry.lock();
            let entry = registry.arena.get_mut(id)
                .ok_or(SequencerError::UnknownSequencer(id))?;
            if entry.going_down {
                return Ok(());
            }
            entry.going_down = true;
            match entry.checkout() {
                Some(checkout) => checkout,
                None => {
                    entry.destroy_deferred = true;
                    debug!(sequencer = %entry.name, "destroy deferred until callback returns");
                    return Ok(());
                }
            }
        };

        self.teardown(id, checkout);
        Ok(())
    }

    /// Second half of the destroy protocol, entered with `going_down` set
    /// and the callback checked out.
    fn teardown(&self, id: SequencerId, checkout: Checkout) {
        let Checkout {
            mut callback,
            name,
            retry,
            created_at_us,
        } = checkout;

        let cx = SequencerCx::new(self, id, Arc::clone(&name), retry, created_at_us);
        let _ = callback.on_event(&cx, &SequencerEvent::bare(EventKind::Destroyed));

        let removed = self.registry.lock().remove(id);
        let dropped_events = removed.as_ref().map_or(0, |entry| entry.queue.len());
        drop(removed);
        drop(callback);

        debug!(sequencer = %name, %id, dropped_events, "sequencer destroyed");
    }

    /// Destroys every sequencer of this context. Returns how many were
    /// destroyed.
    ///
    /// Sequencers created by callbacks during the sweep are destroyed too.
    pub fn destroy_all(&self) -> usize {
        let mut destroyed = 0;
        loop {
            let ids: Vec<SequencerId> = {
                let registry = self.registry.lock();
                registry
                    .all
                    .values()
                    .copied()
                    .filter(|id| registry.arena.get(*id).is_some_and(|e| !e.going_down))
                    .collect()
            };
            if ids.is_empty() {
                break;
            }
            for id in ids {
                if self.destroy(id).is_ok() {
                    destroyed += 1;
                }
            }
        }
        debug!(tsi = self.tsi, destroyed, "all sequencers destroyed");
        destroyed
    }

    /// Delivers one event to each sequencer that was pending when the pass
    /// started. Returns `false` if nothing was pending.
    ///
    /// A sequencer with `n` queued events needs `n` passes to drain. When a
    /// callback returns [`Flow::Destroy`] the sequencer is destroyed and,
    /// under [`DispatchPolicy::StopTick`], the pass ends there; sequencers
    /// not yet serviced keep their events for the next pass.
    pub fn dispatch_pending(&self) -> bool {
        let snapshot: Vec<SequencerId> = {
            let registry = self.registry.lock();
            if registry.pending.is_empty() {
                return false;
            }
            registry.pending.values().copied().collect()
        };

        for id in snapshot {
            let Some((checkout, event)) = self.checkout_head(id) else {
                continue;
            };
            let Checkout {
                mut callback,
                name,
                retry,
                created_at_us,
            } = checkout;

            trace!(sequencer = %name, kind = ?event.kind, "dispatching event");
            let cx = SequencerCx::new(self, id, Arc::clone(&name), retry.clone(), created_at_us);
            let flow = callback.on_event(&cx, &event);
            drop(event);

            let checkin = self.registry.lock().checkin(id, callback, flow);
            let callback = match checkin {
                Checkin::Kept(delivered) => {
                    drop(delivered);
                    continue;
                }
                Checkin::Orphaned(callback) => {
                    drop(callback);
                    continue;
                }
                Checkin::Teardown(callback, delivered) => {
                    drop(delivered);
                    callback
                }
            };
            if flow.is_destroy() {
                info!(sequencer = %name, "destroying sequencer by request");
            }
            self.teardown(
                id,
                Checkout {
                    callback,
                    name,
                    retry,
                    created_at_us,
                },
            );
            if flow.is_destroy() && self.config.dispatch_policy == DispatchPolicy::StopTick {
                break;
            }
        }

        true
    }

    /// Checks out the callback of a pending sequencer together with a copy
    /// of its head event.
    fn checkout_head(&self, id: SequencerId) -> Option<(Checkout, SequencerEvent)> {
        let mut registry = self.registry.lock();
        let entry = registry.arena.get_mut(id)?;
        if entry.going_down {
            return None;
        }
        let event = entry.queue.front()?.clone();
        let checkout = entry.checkout()?;
        Some((checkout, event))
    }

    /// Returns `true` if a [`EventKind::PeerClosed`] event about `handle` is
    /// still waiting in the sequencer's queue.
    ///
    /// Lets collaborators avoid touching a peer whose closure the sequencer
    /// has not processed yet. Failures never queue anything before the
    /// failure event itself, so they are not looked for.
    #[must_use]
    pub fn check_closing_reference(&self, id: SequencerId, handle: PeerHandle) -> bool {
        let registry = self.registry.lock();
        registry.arena.get(id)
            .is_some_and(|entry| entry.queue.iter().any(|e| e.is_peer_closed(handle)))
    }

    /// Arms the sequencer's deadline `us` microseconds from now, replacing
    /// any earlier one. `0` clears it.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::UnknownSequencer`] if `id` is not live.
    pub fn set_timeout(&self, id: SequencerId, us: u64) -> Result<(), SequencerError> {
        let expiry = (us != 0).then(|| self.clock.now_us().saturating_add(us));
        self.registry.lock().set_deadline(id, expiry)?;
        if let Some(expiry_us) = expiry {
            trace!(%id, expiry_us, "deadline armed");
            self.wake.notify_one();
        }
        Ok(())
    }

    /// Runs the periodic timer work: expires deadlines, then broadcasts a
    /// heartbeat if one is due. Returns microseconds until the next
    /// deadline, or `None` if none is armed.
    pub fn check_timeouts(&self, now_us: u64) -> Option<u64> {
        let next = self.expire_deadlines(now_us);
        self.heartbeat(now_us);
        next
    }

    /// Queues [`EventKind::TimedOut`] on every sequencer whose deadline is
    /// at or before `now_us`, earliest first. Returns microseconds until the
    /// next remaining deadline.
    pub fn expire_deadlines(&self, now_us: u64) -> Option<u64> {
        let mut woke = false;
        let next = {
            let mut registry = self.registry.lock();
            for key in registry.deadlines.pop_expired(now_us) {
                if let Some(entry) = registry.arena.get_mut(key.id) {
                    if entry.deadline == Some(key) {
                        entry.deadline = None;
                    }
                }
                match registry.enqueue(
                    key.id,
                    SequencerEvent::bare(EventKind::TimedOut),
                    self.config.queue_sanity_limit,
                ) {
                    Ok(became_pending) => woke |= became_pending,
                    Err(err) => trace!(id = %key.id, error = %err, "timeout not delivered"),
                }
            }
            registry.deadlines.next_in(now_us)
        };
        if woke {
            self.wake.notify_one();
        }
        next
    }

    /// Queues [`EventKind::Heartbeat`] on every live sequencer if at least
    /// the heartbeat interval has passed since the last broadcast. Returns
    /// `true` if a broadcast happened.
    pub fn heartbeat(&self, now_us: u64) -> bool {
        let mut registry = self.registry.lock();
        if now_us.saturating_sub(registry.last_heartbeat_us) < self.config.heartbeat_interval_us {
            return false;
        }
        registry.last_heartbeat_us = now_us;

        let ids: Vec<SequencerId> = registry.all.values().copied().collect();
        let mut delivered = 0usize;
        let mut woke = false;
        for id in ids {
            match registry.enqueue(
                id,
                SequencerEvent::bare(EventKind::Heartbeat),
                self.config.queue_sanity_limit,
            ) {
                Ok(became_pending) => {
                    delivered += 1;
                    woke |= became_pending;
                }
                Err(err) => trace!(%id, error = %err, "heartbeat skipped"),
            }
        }
        drop(registry);

        debug!(tsi = self.tsi, delivered, "heartbeat broadcast");
        if woke {
            self.wake.notify_one();
        }
        true
    }

    /// Returns the sequencer's name.
    #[must_use]
    pub fn name(&self, id: SequencerId) -> Option<Arc<str>> {
        let registry = self.registry.lock();
        registry.arena.get(id).map(|e| Arc::clone(&e.name))
    }

    /// Returns the retry policy the sequencer was created with.
    #[must_use]
    pub fn retry(&self, id: SequencerId) -> Option<Arc<RetryPolicy>> {
        let registry = self.registry.lock();
        registry.arena.get(id).and_then(|e| e.retry.clone())
    }

    #[must_use]
    pub fn created_at_us(&self, id: SequencerId) -> Option<u64> {
        let registry = self.registry.lock();
        registry.arena.get(id).map(|e| e.created_at_us)
    }

    /// Whole seconds since the sequencer was created.
    #[must_use]
    pub fn seconds_since_creation(&self, id: SequencerId) -> Option<u64> {
        self.created_at_us(id)
            .map(|created| self.now().saturating_sub(created) / 1_000_000)
    }

    /// Returns `true` if `id` denotes a live sequencer, including one that
    /// is going down.
    #[must_use]
    pub fn contains(&self, id: SequencerId) -> bool {
        self.registry.lock().arena.get(id).is_some()
    }

    /// Returns `true` if the sequencer has undelivered events.
    #[must_use]
    pub fn is_pending(&self, id: SequencerId) -> bool {
        self.registry.lock().arena.get(id).is_some_and(|e| e.pending_ticket.is_some())
    }

    /// Number of undelivered events, or `None` if `id` is not live.
    #[must_use]
    pub fn queue_len(&self, id: SequencerId) -> Option<usize> {
        self.registry.lock().arena.get(id).map(|e| e.queue.len())
    }

    /// Absolute expiry of the sequencer's armed deadline.
    #[must_use]
    pub fn deadline(&self, id: SequencerId) -> Option<u64> {
        self.registry.lock().arena.get(id)
            .and_then(|e| e.deadline)
            .map(|key| key.expiry_us)
    }

    /// Number of live sequencers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().all.is_empty()
    }

    /// Number of sequencers with undelivered events.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.registry.lock().pending.len()
    }

    /// Number of armed deadlines.
    #[must_use]
    pub fn deadline_len(&self) -> usize {
        self.registry.lock().deadlines.len()
    }

    /// Process-unique id of this context.
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `true` if `id` was created by this context. Holds for the
    /// id's whole life, including after the sequencer is destroyed.
    #[inline]
    #[must_use]
    pub fn owns(&self, id: SequencerId) -> bool {
        id.context == self.id
    }

    /// Thread slot index this context serves.
    #[inline]
    #[must_use]
    pub fn tsi(&self) -> usize {
        self.tsi
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current reading of the context's clock.
    #[inline]
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now_us()
    }

    /// Makes queue appends fail with [`SequencerError::AllocationFailure`]
    /// until switched off again.
    #[cfg(test)]
    pub(crate) fn fail_queue_allocations(&self, fail: bool) {
        self.registry.lock().fail_queue_reserve = fail;
    }

    /// Signalled whenever a sequencer becomes pending or a deadline is armed.
    pub(crate) fn wake_signal(&self) -> &Notify {
        &self.wake
    }

    /// Asserts that pending membership matches queue occupancy for every
    /// sequencer and that every collection only names live sequencers.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let registry = self.registry.lock();
        let mut live = 0usize;
        for (index, slot) in registry.arena.slots.iter().enumerate() {
            let Some(entry) = slot.entry.as_ref() else {
                continue;
            };
            live += 1;
            let id = SequencerId {
                context: self.id,
                slot: index as u32,
                generation: slot.generation,
            };
            assert_eq!(
                entry.pending_ticket.is_some(),
                !entry.queue.is_empty(),
                "pending membership of {id} out of sync with its queue"
            );
            if let Some(ticket) = entry.pending_ticket {
                assert_eq!(registry.pending.get(&ticket), Some(&id));
            }
            assert_eq!(registry.all.get(&entry.serial), Some(&id));
        }
        assert_eq!(registry.all.len(), live);
        assert_eq!(
            registry.arena.free.len() + live,
            registry.arena.slots.len(),
            "every empty slot must be on the free list"
        );
        assert!(registry.pending.len() <= live);
        assert!(registry.deadlines.len() <= live);
    }
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("ThreadContext")
            .field("id", &self.id)
            .field("tsi", &self.tsi)
            .field("sequencers", &registry.all.len())
            .field("pending", &registry.pending.len())
            .field("deadlines", &registry.deadlines.len())
            .finish()
    }
}
