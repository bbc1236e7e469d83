use sequencer_sched::sequencer::{
    DispatchPolicy, EventKind, Flow, ManualClock, PeerHandle, SchedulerConfig, SequencerId,
    SequencerInfo, ThreadContext,
};
use std::sync::{Arc, Mutex};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_tracing;

    type Log = Arc<Mutex<Vec<EventKind>>>;

    fn counting(name: &str, log: Log) -> SequencerInfo {
        SequencerInfo::from_fn(name, move |_cx, event| {
            log.lock().unwrap().push(event.kind);
            Flow::Continue
        })
    }

    fn context_with(policy: DispatchPolicy) -> (ThreadContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let config = SchedulerConfig {
            dispatch_policy: policy,
            ..SchedulerConfig::default()
        };
        (ThreadContext::with_config(0, config, clock.clone()), clock)
    }

    // --- Scenario A: one event per tick ---

    #[test]
    fn test_three_events_need_three_ticks() {
        init_tracing();
        let (context, _clock) = context_with(DispatchPolicy::StopTick);
        let log = Log::default();
        let s = context.create(counting("s", log.clone())).unwrap();
        context.dispatch_pending();
        log.lock().unwrap().clear();

        for _ in 0..3 {
            context.queue_event(s, EventKind::User(42), None, None).unwrap();
        }

        assert!(context.dispatch_pending());
        assert_eq!(*log.lock().unwrap(), vec![EventKind::User(42)]);
        assert_eq!(context.queue_len(s), Some(2));
        assert!(context.is_pending(s));

        context.dispatch_pending();
        context.dispatch_pending();
        assert_eq!(log.lock().unwrap().len(), 3);
        assert_eq!(context.queue_len(s), Some(0));
        assert!(!context.is_pending(s));
        assert_eq!(context.pending_len(), 0);
    }

    // --- Scenario B: timeout ---

    #[test]
    fn test_timeout_scenario() {
        init_tracing();
        let (context, clock) = context_with(DispatchPolicy::StopTick);
        let log = Log::default();
        let s = context.create(counting("s", log.clone())).unwrap();
        let created = context.created_at_us(s).unwrap();
        context.dispatch_pending();

        context.set_timeout(s, 500_000).unwrap();
        clock.set(created + 600_000);

        assert_eq!(context.check_timeouts(created + 600_000), None);
        assert_eq!(context.deadline_len(), 0);

        context.dispatch_pending();
        assert_eq!(
            *log.lock().unwrap(),
            vec![EventKind::Created, EventKind::TimedOut]
        );
    }

    // --- Scenario C: closing reference ---

    #[test]
    fn test_closing_reference_visible_until_delivered() {
        init_tracing();
        let (context, _clock) = context_with(DispatchPolicy::StopTick);
        let s = context.create(counting("s", Log::default())).unwrap();
        let h = PeerHandle(77);

        assert!(!context.check_closing_reference(s, h));
        context
            .queue_event(s, EventKind::PeerClosed(h), None, None)
            .unwrap();
        assert!(context.check_closing_reference(s, h));
        assert!(!context.check_closing_reference(s, PeerHandle(78)));

        // Created first, then the close notification.
        context.dispatch_pending();
        assert!(context.check_closing_reference(s, h));
        context.dispatch_pending();
        assert!(!context.check_closing_reference(s, h));
    }

    #[test]
    fn test_peer_failed_is_not_a_closing_reference() {
        let (context, _clock) = context_with(DispatchPolicy::StopTick);
        let s = context.create(counting("s", Log::default())).unwrap();
        let h = PeerHandle(5);
        context
            .queue_event(s, EventKind::PeerFailed(h), None, None)
            .unwrap();
        assert!(!context.check_closing_reference(s, h));
    }

    // --- Scenario D: destroy request ends the tick ---

    fn destroy_on_created(log: Log) -> SequencerInfo {
        SequencerInfo::from_fn("s1", move |_cx, event| {
            log.lock().unwrap().push(event.kind);
            if event.kind == EventKind::Created {
                Flow::Destroy
            } else {
                Flow::Continue
            }
        })
    }

    #[test]
    fn test_destroy_request_stops_tick() {
        init_tracing();
        let (context, _clock) = context_with(DispatchPolicy::StopTick);
        let s1_log = Log::default();
        let s2_log = Log::default();
        let s1 = context.create(destroy_on_created(s1_log.clone())).unwrap();
        let s2 = context.create(counting("s2", s2_log.clone())).unwrap();

        assert!(context.dispatch_pending());

        assert!(!context.contains(s1));
        assert_eq!(
            *s1_log.lock().unwrap(),
            vec![EventKind::Created, EventKind::Destroyed]
        );
        assert!(s2_log.lock().unwrap().is_empty());
        assert!(context.is_pending(s2));
        assert_eq!(context.queue_len(s2), Some(1));

        context.dispatch_pending();
        assert_eq!(*s2_log.lock().unwrap(), vec![EventKind::Created]);
    }

    #[test]
    fn test_destroy_request_with_continue_policy() {
        let (context, _clock) = context_with(DispatchPolicy::ContinueTick);
        let s1_log = Log::default();
        let s2_log = Log::default();
        let s1 = context.create(destroy_on_created(s1_log.clone())).unwrap();
        let s2 = context.create(counting("s2", s2_log.clone())).unwrap();

        context.dispatch_pending();

        assert!(!context.contains(s1));
        assert_eq!(*s2_log.lock().unwrap(), vec![EventKind::Created]);
        assert!(!context.is_pending(s2));
    }

    // --- Destroy with deadline and queued events ---

    #[test]
    fn test_destroy_releases_everything() {
        init_tracing();
        let (context, _clock) = context_with(DispatchPolicy::StopTick);
        let log = Log::default();
        let s = context.create(counting("s", log.clone())).unwrap();
        context.dispatch_pending();

        context.set_timeout(s, 250_000).unwrap();
        context.queue_event(s, EventKind::User(1), None, None).unwrap();
        context.queue_event(s, EventKind::User(2), None, None).unwrap();

        context.destroy(s).unwrap();

        assert!(!context.contains(s));
        assert_eq!(context.len(), 0);
        assert_eq!(context.pending_len(), 0);
        assert_eq!(context.deadline_len(), 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec![EventKind::Created, EventKind::Destroyed]
        );
        assert_eq!(context.check_timeouts(10_000_000), None);
        assert!(!context.dispatch_pending());
    }

    // --- Pending membership tracks queue occupancy ---

    #[test]
    fn test_pending_iff_queue_non_empty() {
        let (context, clock) = context_with(DispatchPolicy::StopTick);
        let ids: Vec<SequencerId> = (0..5)
            .map(|i| context.create(counting(&format!("s{i}"), Log::default())).unwrap())
            .collect();

        let check = |context: &ThreadContext| {
            for id in &ids {
                assert_eq!(
                    context.is_pending(*id),
                    context.queue_len(*id).unwrap_or(0) > 0
                );
            }
        };

        check(&context);
        for (n, id) in ids.iter().enumerate() {
            for _ in 0..n {
                context.queue_event(*id, EventKind::User(0), None, None).unwrap();
            }
            context.set_timeout(*id, (n as u64 + 1) * 1_000).unwrap();
        }
        check(&context);

        clock.advance(3_000);
        context.check_timeouts(context.now());
        check(&context);

        while context.dispatch_pending() {
            check(&context);
        }
        assert_eq!(context.pending_len(), 0);
        assert_eq!(context.deadline_len(), 2);
    }
}
