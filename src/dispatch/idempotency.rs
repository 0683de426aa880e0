//! Opt-in deduplication by event id.
//!
//! The dispatcher itself delivers every event it is given. Applications that
//! need at-most-once handling wrap a handler in [`Deduplicated`].

use crate::dispatch::handler::EventHandler;
use crate::protocol::models::VerifiedEvent;
use crate::WebhookError;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Default number of ids a [`MemoryIdempotencyStore`] remembers.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Records which event ids have been handled.
pub trait IdempotencyStore: Send + Sync {
    /// Whether `event_id` was already handled successfully.
    fn is_processed(&self, event_id: &str) -> bool;

    /// Record `event_id` as handled.
    fn mark_processed(&self, event_id: &str);
}

#[derive(Debug, Default)]
struct Processed {
    ids: HashSet<String>,
    order: VecDeque<String>,
}

/// In-memory store, lost on restart.
///
/// Bounded: once `max_entries` ids are recorded, the oldest is forgotten for
/// each new one. Size the bound above the number of events a sender may
/// redeliver within its retry horizon.
#[derive(Debug)]
pub struct MemoryIdempotencyStore {
    processed: RwLock<Processed>,
    max_entries: usize,
}

impl Default for MemoryIdempotencyStore {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryIdempotencyStore {
    /// Create an empty store holding up to [`DEFAULT_MAX_ENTRIES`] ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store holding up to `max_entries` ids (at least one).
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            processed: RwLock::new(Processed::default()),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of recorded ids.
    pub fn len(&self) -> usize {
        self.processed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .len()
    }

    /// Whether no ids are recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IdempotencyStore for MemoryIdempotencyStore {
    fn is_processed(&self, event_id: &str) -> bool {
        self.processed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ids
            .contains(event_id)
    }

    fn mark_processed(&self, event_id: &str) {
        let mut processed = self
            .processed
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if !processed.ids.insert(event_id.to_string()) {
            return;
        }
        processed.order.push_back(event_id.to_string());

        while processed.order.len() > self.max_entries {
            if let Some(oldest) = processed.order.pop_front() {
                processed.ids.remove(&oldest);
            }
        }
    }
}

/// Releases an in-flight claim, also when the inner handler panics.
struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    event_id: &'a str,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.event_id);
    }
}

/// Handler wrapper that skips events whose id was already handled.
///
/// An id is recorded only after the inner handler succeeds, so a failed
/// event is handled again when the sender retries it.
///
/// While one delivery of an id is running, a concurrent delivery of the same
/// id through this wrapper fails with `HandlerFailed` instead of running the
/// handler a second time; the sender retries it later. The claim is local to
/// the wrapper: separate wrappers or processes sharing one store are not
/// serialized against each other.
pub struct Deduplicated<H> {
    inner: H,
    store: Arc<dyn IdempotencyStore>,
    in_flight: Mutex<HashSet<String>>,
}

impl<H: EventHandler> Deduplicated<H> {
    /// Wrap `inner`, recording handled ids in `store`.
    pub fn new(inner: H, store: Arc<dyn IdempotencyStore>) -> Self {
        Self {
            inner,
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim<'a>(&'a self, event_id: &'a str) -> Option<Claim<'a>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(event_id.to_string()) {
            return None;
        }
        Some(Claim {
            in_flight: &self.in_flight,
            event_id,
        })
    }
}

impl<H: EventHandler> EventHandler for Deduplicated<H> {
    fn handle(&self, event: &VerifiedEvent) -> Result<(), WebhookError> {
        if self.store.is_processed(&event.id) {
            tracing::debug!(
                event_id = %event.id,
                kind = %event.kind,
                "Skipping already processed webhook event"
            );
            return Ok(());
        }

        let Some(_claim) = self.claim(&event.id) else {
            return Err(WebhookError::HandlerFailed(format!(
                "event {} is already being handled",
                event.id
            )));
        };

        // Re-check under the claim: a concurrent delivery may have finished.
        if self.store.is_processed(&event.id) {
            return Ok(());
        }

        self.inner.handle(event)?;
        self.store.mark_processed(&event.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::router::{dispatch, DispatchOutcome, HandlerRegistry};
    use crate::protocol::models::parse_event;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn event(id: &str) -> VerifiedEvent {
        let body = format!(
            r#"{{"id":"{}","event":"payment.completed","data":{{"amount":100}}}}"#,
            id
        );
        parse_event(body.as_bytes()).unwrap()
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryIdempotencyStore::new();
        assert!(store.is_empty());
        assert!(!store.is_processed("evt_1"));

        store.mark_processed("evt_1");
        assert!(store.is_processed("evt_1"));
        assert!(!store.is_processed("evt_2"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_deduplicated_runs_once_per_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let store = Arc::new(MemoryIdempotencyStore::new());
        let handler = Deduplicated::new(
            move |_: &VerifiedEvent| -> Result<(), WebhookError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            store.clone(),
        );
        let registry = HandlerRegistry::new().with("payment.completed", handler);

        assert!(matches!(dispatch(&event("evt_1"), &registry), DispatchOutcome::HandlerOk));
        assert!(matches!(dispatch(&event("evt_1"), &registry), DispatchOutcome::HandlerOk));
        assert!(matches!(dispatch(&event("evt_2"), &registry), DispatchOutcome::HandlerOk));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failed_event_is_not_recorded() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let store = Arc::new(MemoryIdempotencyStore::new());
        let handler = Deduplicated::new(
            move |_: &VerifiedEvent| -> Result<(), WebhookError> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WebhookError::HandlerFailed("transient".into()))
                } else {
                    Ok(())
                }
            },
            store.clone(),
        );

        assert!(handler.handle(&event("evt_9")).is_err());
        assert!(!store.is_processed("evt_9"));

        assert!(handler.handle(&event("evt_9")).is_ok());
        assert!(store.is_processed("evt_9"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_memory_store_evicts_oldest() {
        let store = MemoryIdempotencyStore::with_max_entries(2);
        store.mark_processed("evt_1");
        store.mark_processed("evt_2");
        store.mark_processed("evt_2");
        store.mark_processed("evt_3");

        assert_eq!(store.len(), 2);
        assert!(!store.is_processed("evt_1"));
        assert!(store.is_processed("evt_2"));
        assert!(store.is_processed("evt_3"));
    }

    #[test]
    fn test_concurrent_duplicate_runs_handler_once() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let store = Arc::new(MemoryIdempotencyStore::new());
        let handler = Deduplicated::new(
            move |_: &VerifiedEvent| -> Result<(), WebhookError> {
                counter.fetch_add(1, Ordering::SeqCst);
                entered_tx.lock().unwrap().send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
                Ok(())
            },
            store.clone(),
        );
        let first_event = event("evt_5");
        let second_event = event("evt_5");

        std::thread::scope(|s| {
            let first = s.spawn(|| handler.handle(&first_event));
            entered_rx.recv().unwrap();

            let second = handler.handle(&second_event);
            assert!(matches!(second, Err(WebhookError::HandlerFailed(_))));

            release_tx.send(()).unwrap();
            assert!(first.join().unwrap().is_ok());
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.is_processed("evt_5"));
        assert!(handler.handle(&event("evt_5")).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_claim_released_after_panic() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let handler = Deduplicated::new(
            move |_: &VerifiedEvent| -> Result<(), WebhookError> {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first attempt");
                }
                Ok(())
            },
            Arc::new(MemoryIdempotencyStore::new()),
        );
        let registry = HandlerRegistry::new().with("payment.completed", handler);

        assert!(matches!(
            dispatch(&event("evt_7"), &registry),
            DispatchOutcome::HandlerFailed(_)
        ));
        assert!(matches!(
            dispatch(&event("evt_7"), &registry),
            DispatchOutcome::HandlerOk
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
