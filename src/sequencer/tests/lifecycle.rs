/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 19/10/26
******************************************************************************/

//! Tests for sequencer creation and destruction.

#[cfg(test)]
mod tests {
    use crate::sequencer::{
        EventKind, Flow, ManualClock, Payload, RetryPolicy, SchedulerConfig, SequencerError,
        SequencerId, SequencerInfo, ThreadContext,
    };
    use std::sync::{Arc, Mutex, OnceLock};

    type Log = Arc<Mutex<Vec<EventKind>>>;

    fn recording(name: &str, log: Log) -> SequencerInfo {
        SequencerInfo::from_fn(name, move |_cx, event| {
            log.lock().unwrap().push(event.kind);
            Flow::Continue
        })
    }

    fn manual_context(start_us: u64) -> (ThreadContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_us));
        let context = ThreadContext::with_config(0, SchedulerConfig::default(), clock.clone());
        (context, clock)
    }

    #[test]
    fn test_create_queues_created_event() {
        let context = ThreadContext::new(3);
        let log = Log::default();
        let id = context.create(recording("fresh", log.clone())).unwrap();

        assert_eq!(context.len(), 1);
        assert!(context.is_pending(id));
        assert_eq!(context.queue_len(id), Some(1));
        assert!(log.lock().unwrap().is_empty());

        context.dispatch_pending();
        assert_eq!(*log.lock().unwrap(), vec![EventKind::Created]);
        context.assert_consistent();
    }

    #[test]
    fn test_destroy_calls_back_synchronously_and_frees_queue() {
        let context = ThreadContext::new(0);
        let log = Log::default();
        let id = context.create(recording("doomed", log.clone())).unwrap();

        let payload: Payload = Arc::new(7u32);
        context
            .queue_event(id, EventKind::User(1), Some(payload.clone()), None)
            .unwrap();
        context
            .queue_event(id, EventKind::User(2), None, Some(payload.clone()))
            .unwrap();
        assert_eq!(Arc::strong_count(&payload), 3);

        context.destroy(id).unwrap();

        assert_eq!(*log.lock().unwrap(), vec![EventKind::Destroyed]);
        assert_eq!(Arc::strong_count(&payload), 1);
        assert!(!context.contains(id));
        assert_eq!(context.pending_len(), 0);
        context.assert_consistent();
    }

    #[test]
    fn test_destroy_with_deadline_and_queued_events() {
        let context = ThreadContext::new(0);
        let id = context
            .create(SequencerInfo::from_fn("armed", |_cx, _event| Flow::Continue))
            .unwrap();
        context.dispatch_pending();

        context.set_timeout(id, 1_000_000).unwrap();
        context.queue_event(id, EventKind::User(1), None, None).unwrap();
        context.queue_event(id, EventKind::User(2), None, None).unwrap();
        assert_eq!(context.deadline_len(), 1);

        context.destroy(id).unwrap();

        assert_eq!(context.len(), 0);
        assert_eq!(context.pending_len(), 0);
        assert_eq!(context.deadline_len(), 0);
        assert!(context.queue_len(id).is_none());
        context.assert_consistent();
    }

    #[test]
    fn test_callback_requested_destroy() {
        let context = ThreadContext::new(0);
        let log = Log::default();
        let recorded = log.clone();
        let id = context
            .create(SequencerInfo::from_fn("oneshot", move |_cx, event| {
                recorded.lock().unwrap().push(event.kind);
                if event.kind == EventKind::User(1) {
                    Flow::Destroy
                } else {
                    Flow::Continue
                }
            }))
            .unwrap();
        context.queue_event(id, EventKind::User(1), None, None).unwrap();
        context.queue_event(id, EventKind::User(2), None, None).unwrap();

        context.dispatch_pending();
        context.dispatch_pending();

        assert!(!context.contains(id));
        assert_eq!(
            *log.lock().unwrap(),
            vec![EventKind::Created, EventKind::User(1), EventKind::Destroyed]
        );
        assert!(!context.dispatch_pending());
    }

    #[test]
    fn test_self_destroy_inside_callback_completes_after_return() {
        let context = ThreadContext::new(0);
        let log = Log::default();
        let recorded = log.clone();
        let id = context
            .create(SequencerInfo::from_fn("quitter", move |cx, event| {
                recorded.lock().unwrap().push(event.kind);
                if event.kind == EventKind::User(1) {
                    cx.destroy().unwrap();
                    // Already going down: further destroys are no-ops and
                    // new events are refused.
                    assert!(cx.destroy().is_ok());
                    assert!(cx.queue_event(EventKind::User(3), None, None).is_err());
                    assert!(cx.context().contains(cx.id()));
                }
                Flow::Continue
            }))
            .unwrap();
        context.queue_event(id, EventKind::User(1), None, None).unwrap();
        context.queue_event(id, EventKind::User(2), None, None).unwrap();

        context.dispatch_pending();
        context.dispatch_pending();

        assert!(!context.contains(id));
        assert_eq!(
            *log.lock().unwrap(),
            vec![EventKind::Created, EventKind::User(1), EventKind::Destroyed]
        );
        context.assert_consistent();
    }

    #[test]
    fn test_destroy_other_sequencer_from_callback() {
        let context = ThreadContext::new(0);
        let victim_log = Log::default();
        let victim_id: Arc<OnceLock<SequencerId>> = Arc::new(OnceLock::new());
        let target = victim_id.clone();

        let killer = context
            .create(SequencerInfo::from_fn("killer", move |cx, event| {
                if event.kind == EventKind::User(1) {
                    if let Some(victim) = target.get() {
                        cx.context().destroy(*victim).unwrap();
                    }
                }
                Flow::Continue
            }))
            .unwrap();
        let victim = context.create(recording("victim", victim_log.clone())).unwrap();
        victim_id.set(victim).unwrap();

        context.dispatch_pending();
        context.queue_event(killer, EventKind::User(1), None, None).unwrap();
        context.queue_event(victim, EventKind::User(2), None, None).unwrap();

        assert!(context.dispatch_pending());
        assert!(!context.contains(victim));
        assert!(context.contains(killer));
        assert_eq!(
            *victim_log.lock().unwrap(),
            vec![EventKind::Created, EventKind::Destroyed]
        );
        assert_eq!(context.pending_len(), 0);
        context.assert_consistent();
    }

    #[test]
    fn test_destroy_all() {
        let context = ThreadContext::new(0);
        let logs: Vec<Log> = (0..3).map(|_| Log::default()).collect();
        for (i, log) in logs.iter().enumerate() {
            context
                .create(recording(&format!("s{i}"), log.clone()))
                .unwrap();
        }

        assert_eq!(context.destroy_all(), 3);
        assert!(context.is_empty());
        assert_eq!(context.pending_len(), 0);
        for log in &logs {
            assert_eq!(*log.lock().unwrap(), vec![EventKind::Destroyed]);
        }
    }

    #[test]
    fn test_destroy_all_sweeps_sequencers_created_during_teardown() {
        let context = ThreadContext::new(0);
        let child_log = Log::default();
        let spawned = child_log.clone();

        context
            .create(SequencerInfo::from_fn("parent", move |cx, event| {
                if event.kind == EventKind::Destroyed {
                    cx.context()
                        .create(recording("child", spawned.clone()))
                        .unwrap();
                }
                Flow::Continue
            }))
            .unwrap();

        assert_eq!(context.destroy_all(), 2);
        assert!(context.is_empty());
        assert_eq!(*child_log.lock().unwrap(), vec![EventKind::Destroyed]);
    }

    #[test]
    fn test_destroy_is_noop_while_already_going_down() {
        let context = ThreadContext::new(0);
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let recorded = outcomes.clone();

        let id = context
            .create(SequencerInfo::from_fn("twice", move |cx, event| {
                if event.kind == EventKind::Destroyed {
                    recorded.lock().unwrap().push(cx.destroy());
                }
                Flow::Continue
            }))
            .unwrap();

        context.destroy(id).unwrap();
        assert_eq!(*outcomes.lock().unwrap(), vec![Ok(())]);
        assert!(context.destroy(id).is_err());
    }

    #[test]
    fn test_accessors() {
        let (context, clock) = manual_context(5_000_000);
        let policy = Arc::new(RetryPolicy {
            retry_ms_table: vec![1_000, 2_000],
            conceal_count: 3,
            ..RetryPolicy::default()
        });
        let seen_retry = Arc::new(Mutex::new(None));
        let recorded = seen_retry.clone();

        let id = context
            .create(
                SequencerInfo::from_fn("named", move |cx, _event| {
                    *recorded.lock().unwrap() = cx.retry().cloned();
                    assert_eq!(cx.name(), "named");
                    assert_eq!(cx.context().tsi(), 0);
                    Flow::Continue
                })
                .with_retry(policy.clone()),
            )
            .unwrap();

        assert_eq!(context.name(id).as_deref(), Some("named"));
        assert_eq!(context.created_at_us(id), Some(5_000_000));
        assert_eq!(context.seconds_since_creation(id), Some(0));
        assert_eq!(context.retry(id).as_deref(), Some(policy.as_ref()));

        clock.advance(2_500_000);
        assert_eq!(context.seconds_since_creation(id), Some(2));

        context.dispatch_pending();
        assert_eq!(seen_retry.lock().unwrap().as_ref(), Some(policy.as_ref()));
    }

    #[test]
    fn test_retry_policy_table() {
        let policy = RetryPolicy {
            retry_ms_table: vec![10, 20, 40],
            conceal_count: 2,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_ms(0), Some(10));
        assert_eq!(policy.delay_ms(2), Some(40));
        assert_eq!(policy.delay_ms(100), Some(40));
        assert!(policy.conceals(1));
        assert!(!policy.conceals(2));
        assert_eq!(RetryPolicy::default().delay_ms(0), None);
    }

    #[test]
    fn test_create_rolls_back_when_created_event_fails() {
        let context = ThreadContext::new(0);
        let log = Log::default();

        context.fail_queue_allocations(true);
        let result = context.create(recording("doomed", log.clone()));
        assert_eq!(result, Err(SequencerError::AllocationFailure));
        assert_eq!(context.len(), 0);
        assert_eq!(context.pending_len(), 0);
        assert!(context.is_empty());
        context.assert_consistent();

        context.fail_queue_allocations(false);
        let id = context.create(recording("retry", log.clone())).unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context.name(id).as_deref(), Some("retry"));
        context.assert_consistent();

        while context.dispatch_pending() {}
        assert_eq!(*log.lock().unwrap(), vec![EventKind::Created]);
    }
}
