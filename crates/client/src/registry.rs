//! Per-session subscription registry.
//!
//! Tracks local handlers per session and, independently, which sessions have
//! an outstanding `subscribe` at the server, so two local handlers never
//! produce two subscribe frames. The active set is deliberately not trusted
//! across a reconnect: the server's subscription state dies with the socket.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::session::SessionEvent;

pub(crate) type Handler = Box<dyn FnMut(&SessionEvent) + Send>;

pub(crate) struct AddOutcome {
    /// This was the session's zero→one handler transition; caches rebuild.
    pub first_handler: bool,
    /// A `subscribe` control message must be sent.
    pub needs_subscribe: bool,
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    handlers: HashMap<String, Vec<(u64, Handler)>>,
    active: HashSet<String>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, session_id: &str, handler_id: u64, handler: Handler) -> AddOutcome {
        let entry = self.handlers.entry(session_id.to_string()).or_default();
        let first_handler = entry.is_empty();
        entry.push((handler_id, handler));
        let needs_subscribe = self.active.insert(session_id.to_string());
        AddOutcome {
            first_handler,
            needs_subscribe,
        }
    }

    /// Remove one handler. Returns true when it was the last one and an
    /// `unsubscribe` must be sent.
    pub(crate) fn remove(&mut self, session_id: &str, handler_id: u64) -> bool {
        let Some(list) = self.handlers.get_mut(session_id) else {
            return false;
        };
        list.retain(|(id, _)| *id != handler_id);
        if list.is_empty() {
            self.handlers.remove(session_id);
            return self.active.remove(session_id);
        }
        false
    }

    pub(crate) fn has_handlers(&self, session_id: &str) -> bool {
        self.handlers.contains_key(session_id)
    }

    /// Fan out to every handler in registration order. A panicking handler
    /// must not starve the rest.
    pub(crate) fn dispatch(&mut self, session_id: &str, event: &SessionEvent) {
        let Some(list) = self.handlers.get_mut(session_id) else {
            return;
        };
        for (handler_id, handler) in list.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(
                    component = "registry",
                    event = "registry.handler.panicked",
                    session_id = session_id,
                    handler_id = *handler_id,
                    "Subscriber handler panicked, continuing fan-out"
                );
            }
        }
    }

    /// Sessions to resubscribe after a reconnect: everything with at least
    /// one handler, regardless of the stale active markers. Rebuilds the
    /// active set to match.
    pub(crate) fn resubscribe_targets(&mut self) -> Vec<String> {
        let targets: Vec<String> = self.handlers.keys().cloned().collect();
        self.active = targets.iter().cloned().collect();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn noop() -> Handler {
        Box::new(|_| {})
    }

    #[test]
    fn second_handler_does_not_resubscribe() {
        let mut registry = SubscriptionRegistry::new();
        let first = registry.add("sess-1", 1, noop());
        assert!(first.first_handler);
        assert!(first.needs_subscribe);

        let second = registry.add("sess-1", 2, noop());
        assert!(!second.first_handler);
        assert!(!second.needs_subscribe);
    }

    #[test]
    fn unsubscribe_fires_only_when_last_handler_leaves() {
        let mut registry = SubscriptionRegistry::new();
        registry.add("sess-1", 1, noop());
        registry.add("sess-1", 2, noop());

        assert!(!registry.remove("sess-1", 1));
        assert!(registry.remove("sess-1", 2));
        assert!(!registry.has_handlers("sess-1"));

        // Removing again is inert.
        assert!(!registry.remove("sess-1", 2));
    }

    #[test]
    fn resubscribing_after_teardown_is_fresh() {
        let mut registry = SubscriptionRegistry::new();
        registry.add("sess-1", 1, noop());
        registry.remove("sess-1", 1);

        let again = registry.add("sess-1", 2, noop());
        assert!(again.first_handler);
        assert!(again.needs_subscribe);
    }

    #[test]
    fn resubscribe_targets_ignore_stale_active_set() {
        let mut registry = SubscriptionRegistry::new();
        registry.add("sess-1", 1, noop());
        registry.add("sess-2", 2, noop());

        // Both are already marked active; a reconnect resends anyway.
        let mut targets = registry.resubscribe_targets();
        targets.sort();
        assert_eq!(targets, vec!["sess-1".to_string(), "sess-2".to_string()]);

        // And the local markers stay coherent: no duplicate subscribe later.
        let outcome = registry.add("sess-1", 3, noop());
        assert!(!outcome.needs_subscribe);
    }

    #[test]
    fn dispatch_reaches_all_handlers_in_order() {
        let mut registry = SubscriptionRegistry::new();
        let seen: Arc<std::sync::Mutex<Vec<u64>>> = Arc::default();
        for id in [1u64, 2, 3] {
            let seen = seen.clone();
            registry.add(
                "sess-1",
                id,
                Box::new(move |_| seen.lock().unwrap().push(id)),
            );
        }
        registry.dispatch(
            "sess-1",
            &SessionEvent::Working(true),
        );
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn panicking_handler_does_not_block_the_rest() {
        let mut registry = SubscriptionRegistry::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        registry.add("sess-1", 1, Box::new(|_| panic!("bad handler")));
        let counter = delivered.clone();
        registry.add(
            "sess-1",
            2,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        registry.dispatch("sess-1", &SessionEvent::Working(false));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }
}
