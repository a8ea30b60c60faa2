
#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use event_hub::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn registration_order_preserved() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register("change", log.recorder("first"), None).unwrap();
        hub.register("change", log.recorder("second"), None).unwrap();
        hub.register("change", log.recorder("third"), None).unwrap();

        let invoked = hub.trigger("change", unit_payload()).unwrap();

        assert_eq!(invoked, 3);
        assert_eq!(log.entries(), ["first", "second", "third"]);
    }

    #[test]
    fn live_removal_skips_later_handlers() {
        let hub = EventHub::new();
        let log = CallLog::new();
        let remover = {
            let hub = hub.clone();
            let log = log.clone();
            Callback::new(move |_ctx, _payload| {
                log.push("first");
                hub.off(Some("change"), None, None).unwrap();
            })
        };
        hub.register("change", remover, None).unwrap();
        hub.register("change", log.recorder("second"), None).unwrap();

        hub.trigger("change", unit_payload()).unwrap();

        assert_eq!(log.entries(), ["first"], "removed handler must not run in a live pass");
    }

    #[test]
    fn snapshot_dispatch_isolates_in_flight_pass() {
        let hub = EventHub::new();
        let log = CallLog::new();
        let remover = {
            let hub = hub.clone();
            let log = log.clone();
            Callback::new(move |_ctx, _payload| {
                log.push("first");
                hub.off(Some("change"), None, None).unwrap();
            })
        };
        hub.register("change", remover, None).unwrap();
        hub.register("change", log.recorder("second"), None).unwrap();

        let invoked = hub.safe_trigger("change", unit_payload()).unwrap();

        assert_eq!(invoked, 2);
        assert_eq!(log.entries(), ["first", "second"]);
        assert!(!hub.has_handlers("change").unwrap(), "removal still applies to future passes");
    }

    #[test]
    fn live_pass_picks_up_handlers_registered_mid_dispatch() {
        let hub = EventHub::new();
        let log = CallLog::new();
        let appender = {
            let hub = hub.clone();
            let log = log.clone();
            Callback::new(move |_ctx, _payload| {
                log.push("first");
                let late = log.recorder("late");
                hub.register("change", late, None).unwrap();
            })
        };
        hub.register("change", appender, None).unwrap();

        let invoked = hub.trigger("change", unit_payload()).unwrap();

        assert_eq!(invoked, 2);
        assert_eq!(log.entries(), ["first", "late"]);
    }

    #[tokio::test]
    async fn deferred_dispatch_runs_after_call_returns() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register("change", log.recorder("first"), None).unwrap();
        hub.register("change", log.recorder("second"), None).unwrap();

        let scheduled = hub.async_trigger("change", unit_payload()).unwrap();
        assert_eq!(scheduled, 2);
        assert!(log.entries().is_empty(), "handlers must not run synchronously");

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(log.entries(), ["first", "second"]);
    }

    #[tokio::test]
    async fn deferred_snapshot_ignores_concurrent_removal() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register("change", log.recorder("kept"), None).unwrap();

        hub.async_trigger("change", unit_payload()).unwrap();
        hub.off(Some("change"), None, None).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(log.entries(), ["kept"]);
    }

    #[tokio::test]
    async fn handlers_registered_after_deferred_call_are_excluded() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register("change", log.recorder("early"), None).unwrap();

        hub.async_trigger("change", unit_payload()).unwrap();
        hub.register("change", log.recorder("late"), None).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(log.entries(), ["early"]);
    }

    #[tokio::test]
    async fn deferred_batch_survives_destroy() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register("change", log.recorder("kept"), None).unwrap();

        hub.async_trigger("change", unit_payload()).unwrap();
        hub.destroy().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(log.entries(), ["kept"], "delivery is best-effort after destroy");
    }

    #[test]
    fn deferred_dispatch_without_handlers_schedules_nothing() {
        // No runtime here: an empty channel must return before spawning.
        let hub = EventHub::new();
        assert_eq!(hub.async_trigger("missing", unit_payload()).unwrap(), 0);
    }

    #[test]
    fn destroyed_hub_rejects_all_calls() {
        let hub = EventHub::new();
        let callback = Callback::new(|_ctx, _payload| {});
        hub.register("change", callback.clone(), None).unwrap();

        assert_eq!(hub.destroy().unwrap(), 1);

        assert!(matches!(
            hub.register("change", callback.clone(), None),
            Err(EventHubError::InvalidState { .. })
        ));
        assert!(matches!(
            hub.register_any("change", Arc::new(1), None),
            Err(EventHubError::InvalidState { .. })
        ));
        assert!(matches!(
            hub.trigger("change", unit_payload()),
            Err(EventHubError::InvalidState { .. })
        ));
        assert!(matches!(
            hub.safe_trigger("change", unit_payload()),
            Err(EventHubError::InvalidState { .. })
        ));
        assert!(matches!(
            hub.async_trigger("change", unit_payload()),
            Err(EventHubError::InvalidState { .. })
        ));
        assert!(matches!(hub.off(None, None, None), Err(EventHubError::InvalidState { .. })));
        assert!(matches!(hub.has_handlers("change"), Err(EventHubError::InvalidState { .. })));
        assert!(matches!(hub.destroy(), Err(EventHubError::InvalidState { .. })));
    }

    #[test]
    fn removal_matches_callback_and_context() {
        let hub = EventHub::new();
        let log = CallLog::new();
        let callback = log.recorder("shared");
        let ctx1: Context = Arc::new(1u8);
        let ctx2: Context = Arc::new(2u8);
        hub.register("z", callback.clone(), Some(ctx1.clone())).unwrap();
        hub.register("z", callback.clone(), Some(ctx2.clone())).unwrap();

        // Shape 4: callback + context removes only the matching pair.
        hub.off(Some("z"), Some(&callback), Some(&ctx1)).unwrap();
        assert_eq!(hub.trigger("z", unit_payload()).unwrap(), 1);

        // Shape 3: callback without context removes the rest.
        hub.off(Some("z"), Some(&callback), None).unwrap();
        assert_eq!(hub.trigger("z", unit_payload()).unwrap(), 0);
    }

    #[test]
    fn removal_scopes_channel_and_registry() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register("a", log.recorder("a"), None).unwrap();
        hub.register("b", log.recorder("b"), None).unwrap();

        hub.off(Some("a"), None, None).unwrap();
        assert!(!hub.has_handlers("a").unwrap());
        assert!(hub.has_handlers("b").unwrap());

        hub.off(None, None, None).unwrap();
        assert!(!hub.has_handlers("b").unwrap());
    }

    #[test]
    fn duplicate_registration_invokes_twice_and_removes_together() {
        let hub = EventHub::new();
        let log = CallLog::new();
        let callback = log.recorder("dup");
        hub.register("change", callback.clone(), None).unwrap();
        hub.register("change", callback.clone(), None).unwrap();

        assert_eq!(hub.trigger("change", unit_payload()).unwrap(), 2);

        hub.off(Some("change"), Some(&callback), None).unwrap();
        assert!(!hub.has_handlers("change").unwrap());
    }

    #[test]
    fn non_callable_registration_is_ignored() {
        let hub = EventHub::new();
        hub.register_any("q", Arc::new(42), None).unwrap();

        assert!(!hub.has_handlers("q").unwrap());
        assert_eq!(hub.trigger("q", unit_payload()).unwrap(), 0);
    }

    #[test]
    fn callable_value_registers_through_dynamic_surface() {
        let hub = EventHub::new();
        let log = CallLog::new();
        hub.register_any("q", Arc::new(log.recorder("dynamic")), None).unwrap();

        hub.trigger("q", unit_payload()).unwrap();
        assert_eq!(log.entries(), ["dynamic"]);
    }

    #[test]
    fn context_and_payload_reach_the_handler() {
        let hub = EventHub::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = seen.clone();
        let callback = Callback::new(move |ctx, payload| {
            let bound = ctx.and_then(|c| c.downcast_ref::<&str>()).copied();
            assert_eq!(bound, Some("receiver"));
            let value = payload.downcast_ref::<usize>().copied().unwrap_or(0);
            sink.store(value, Ordering::SeqCst);
        });
        let ctx: Context = Arc::new("receiver");
        hub.register("change", callback, Some(ctx)).unwrap();

        hub.trigger("change", Arc::new(7usize)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn panicking_handler_aborts_remainder_of_pass() {
        let hub = EventHub::new();
        let log = CallLog::new();
        let failing = {
            let log = log.clone();
            Callback::new(move |_ctx, _payload| {
                log.push("first");
                panic!("handler failure");
            })
        };
        hub.register("change", failing, None).unwrap();
        hub.register("change", log.recorder("second"), None).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            hub.safe_trigger("change", unit_payload())
        }));

        assert!(result.is_err());
        assert_eq!(log.entries(), ["first"]);
        // The hub itself stays usable after a handler panic.
        assert!(hub.has_handlers("change").unwrap());
    }

    #[test]
    fn dispatch_without_handlers_is_a_noop() {
        let hub = EventHub::new();
        assert_eq!(hub.trigger("missing", unit_payload()).unwrap(), 0);
        assert_eq!(hub.safe_trigger("missing", unit_payload()).unwrap(), 0);
        hub.off(Some("missing"), None, None).unwrap();
    }
}
