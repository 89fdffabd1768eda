// Subscription registry: event name -> handler -> native listener

use crate::config::DuplicatePolicy;
use crate::events::EventName;
use crate::native::{EventTransport, NativeCallback, NativeSubscription, Payload};
use crate::result_code;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Application event handler.
///
/// Identity is the `Arc` allocation: clone the same `Arc` to remove a
/// handler later.
pub type EventHandler = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

struct Entry {
    id: ListenerId,
    handler: EventHandler,
    native: Box<dyn NativeSubscription>,
}

struct RegistryInner {
    transport: Arc<dyn EventTransport>,
    policy: DuplicatePolicy,
    next_id: AtomicU64,
    buckets: Mutex<HashMap<EventName, Vec<Entry>>>,
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl RegistryInner {
    /// Take one entry out of its bucket, dropping the bucket when it empties.
    /// The native listener is returned so it can be unbound without the lock.
    fn take(&self, event: EventName, matches: impl Fn(&Entry) -> bool)
        -> Option<Box<dyn NativeSubscription>> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets.get_mut(&event)?;
        let index = bucket.iter().position(|entry| matches(entry))?;
        let entry = bucket.remove(index);
        if bucket.is_empty() {
            buckets.remove(&event);
        }
        log::debug!("Removed listener {:?} for {}", entry.id, event);
        Some(entry.native)
    }
}

/// Handle returned by [`SubscriptionRegistry::add`].
///
/// Dropping it keeps the listener registered; call [`Subscription::remove`].
#[derive(Clone)]
pub struct Subscription {
    event: EventName,
    id: ListenerId,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    pub fn event(&self) -> EventName {
        self.event
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Unregister this listener. Repeated calls are no-ops.
    pub fn remove(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Some(native) = registry.take(self.event, |entry| entry.id == self.id) {
                native.remove();
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

/// Tracks every listener the bridge has bound on the native transport.
///
/// No lock is held while calling into the transport, so handlers may add or
/// remove listeners while an event is being delivered.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new(transport: Arc<dyn EventTransport>, policy: DuplicatePolicy) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                transport,
                policy,
                next_id: AtomicU64::new(1),
                buckets: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn subscription(&self, event: EventName, id: ListenerId) -> Subscription {
        Subscription {
            event,
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Bind `handler` to `event`. Payloads are decorated with the symbolic
    /// result code before the handler sees them.
    pub fn add(&self, event: EventName, handler: EventHandler) -> Subscription {
        let stale = {
            let mut buckets = self.inner.buckets.lock();
            let existing = buckets.get_mut(&event).and_then(|bucket| {
                let index = bucket
                    .iter()
                    .position(|entry| same_handler(&entry.handler, &handler))?;
                Some((bucket, index))
            });
            match (existing, self.inner.policy) {
                (Some((bucket, index)), DuplicatePolicy::Reject) => {
                    let id = bucket[index].id;
                    log::debug!("Handler already registered for {} as {:?}", event, id);
                    return self.subscription(event, id);
                }
                (Some((bucket, index)), DuplicatePolicy::Replace) => {
                    let entry = bucket.remove(index);
                    log::debug!("Replacing listener {:?} for {}", entry.id, event);
                    Some(entry.native)
                }
                (None, _) => None,
            }
        };
        if let Some(native) = stale {
            native.remove();
        }

        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let target = handler.clone();
        let wrapped: NativeCallback = Arc::new(move |payload: &Payload| {
            let decorated = result_code::decorate(payload.clone());
            target(&decorated);
        });
        let native = self.inner.transport.add_listener(event.wire_id(), wrapped);

        // The same handler may have been added by another caller while the
        // transport was bound without the lock
        let (kept, unbind) = {
            let mut buckets = self.inner.buckets.lock();
            let bucket = buckets.entry(event).or_default();
            let existing = bucket
                .iter()
                .position(|entry| same_handler(&entry.handler, &handler));
            match (existing, self.inner.policy) {
                (Some(index), DuplicatePolicy::Reject) => (bucket[index].id, Some(native)),
                (existing, _) => {
                    let stale = existing.map(|index| bucket.remove(index).native);
                    bucket.push(Entry { id, handler, native });
                    (id, stale)
                }
            }
        };
        if let Some(native) = unbind {
            log::debug!("Concurrent registration for {}, unbinding the extra listener", event);
            native.remove();
        }
        log::debug!("Added listener {:?} for {}", kept, event);

        self.subscription(event, kept)
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.inner.policy
    }

    /// Unbind `handler` from `event`. Unknown events or handlers are ignored.
    pub fn remove(&self, event: EventName, handler: &EventHandler) {
        if let Some(native) = self
            .inner
            .take(event, |entry| same_handler(&entry.handler, handler))
        {
            native.remove();
        }
    }

    pub fn remove_by_id(&self, event: EventName, id: ListenerId) {
        if let Some(native) = self.inner.take(event, |entry| entry.id == id) {
            native.remove();
        }
    }

    /// Unbind every listener and empty the registry
    pub fn remove_all(&self) {
        let drained = std::mem::take(&mut *self.inner.buckets.lock());
        let count: usize = drained.values().map(Vec::len).sum();
        for (_, bucket) in drained {
            for entry in bucket {
                entry.native.remove();
            }
        }
        log::debug!("Removed all {} listeners", count);
    }

    /// Event names that currently have at least one handler
    pub fn event_names(&self) -> Vec<EventName> {
        let mut names: Vec<_> = self.inner.buckets.lock().keys().copied().collect();
        names.sort();
        names
    }

    pub fn handler_count(&self, event: EventName) -> usize {
        self.inner.buckets.lock().get(&event).map_or(0, Vec::len)
    }

    pub fn contains(&self, event: EventName, handler: &EventHandler) -> bool {
        self.inner
            .buckets
            .lock()
            .get(&event)
            .is_some_and(|bucket| bucket.iter().any(|entry| same_handler(&entry.handler, handler)))
    }

    pub fn len(&self) -> usize {
        self.inner.buckets.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.buckets.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result_code::RET_CODE_STR_FIELD;
    use crate::testing::{payload, RecordingTransport};
    use serde_json::json;

    fn counting_handler() -> (EventHandler, Arc<Mutex<Vec<Payload>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: EventHandler = Arc::new(move |payload: &Payload| {
            sink.lock().push(payload.clone());
        });
        (handler, seen)
    }

    fn setup(policy: DuplicatePolicy) -> (Arc<RecordingTransport>, SubscriptionRegistry) {
        let transport = Arc::new(RecordingTransport::new());
        let registry = SubscriptionRegistry::new(transport.clone(), policy);
        (transport, registry)
    }

    #[test]
    fn test_add_then_remove_stops_delivery() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (handler, seen) = counting_handler();

        registry.add(EventName::Started, handler.clone());
        assert!(registry.contains(EventName::Started, &handler));
        transport.emit("onStarted", payload(json!({})));
        assert_eq!(seen.lock().len(), 1);

        registry.remove(EventName::Started, &handler);
        assert!(!registry.contains(EventName::Started, &handler));
        assert!(registry.is_empty());
        assert_eq!(transport.active("onStarted"), 0);

        transport.emit("onStarted", payload(json!({})));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_removing_one_handler_keeps_the_other() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (first, first_seen) = counting_handler();
        let (second, second_seen) = counting_handler();

        registry.add(EventName::Paused, first.clone());
        registry.add(EventName::Paused, second.clone());
        registry.remove(EventName::Paused, &first);

        assert_eq!(registry.handler_count(EventName::Paused), 1);
        assert_eq!(registry.event_names(), vec![EventName::Paused]);

        transport.emit("onPaused", payload(json!({})));
        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);
    }

    #[test]
    fn test_remove_unknown_is_silent() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (registered, _) = counting_handler();
        let (stranger, _) = counting_handler();

        registry.remove(EventName::Idle, &stranger);
        registry.add(EventName::Idle, registered.clone());
        registry.remove(EventName::Idle, &stranger);

        assert_eq!(registry.len(), 1);
        assert_eq!(transport.remove_calls("onIdle"), 0);
    }

    #[test]
    fn test_subscription_remove() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (handler, seen) = counting_handler();

        let subscription = registry.add(EventName::Seeked, handler);
        assert_eq!(subscription.event(), EventName::Seeked);
        subscription.remove();
        subscription.remove();

        assert!(registry.is_empty());
        assert_eq!(transport.remove_calls("onSeeked"), 1);
        transport.emit("onSeeked", payload(json!({})));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_duplicate_replace_unbinds_previous_listener() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (handler, seen) = counting_handler();

        let first = registry.add(EventName::Started, handler.clone());
        let second = registry.add(EventName::Started, handler.clone());

        assert_ne!(first.id(), second.id());
        assert_eq!(registry.handler_count(EventName::Started), 1);
        assert_eq!(transport.active("onStarted"), 1);
        assert_eq!(transport.remove_calls("onStarted"), 1);

        transport.emit("onStarted", payload(json!({})));
        assert_eq!(seen.lock().len(), 1);

        // the stale token no longer matches anything
        first.remove();
        assert_eq!(registry.handler_count(EventName::Started), 1);
    }

    #[test]
    fn test_duplicate_reject_keeps_existing() {
        let (transport, registry) = setup(DuplicatePolicy::Reject);
        let (handler, _) = counting_handler();

        let first = registry.add(EventName::Started, handler.clone());
        let second = registry.add(EventName::Started, handler.clone());

        assert_eq!(first.id(), second.id());
        assert_eq!(transport.add_calls("onStarted"), 1);
        assert_eq!(transport.active("onStarted"), 1);
    }

    #[test]
    fn test_payload_is_decorated() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (handler, seen) = counting_handler();

        registry.add(EventName::ErrorOccurred, handler);
        transport.emit("onErrorOccurred", payload(json!({ "ret_code": 6 })));
        transport.emit("onErrorOccurred", payload(json!({ "message": "boom" })));

        let seen = seen.lock();
        assert_eq!(seen[0][RET_CODE_STR_FIELD], json!("PLAYER_NETWORK_ERROR"));
        assert!(!seen[1].contains_key(RET_CODE_STR_FIELD));
    }

    #[test]
    fn test_remove_all_empties_registry() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        for event in [EventName::Prepared, EventName::Started, EventName::Started] {
            let (handler, _) = counting_handler();
            registry.add(event, handler);
        }
        assert_eq!(registry.len(), 3);

        registry.remove_all();
        assert!(registry.is_empty());
        assert!(registry.event_names().is_empty());
        assert_eq!(transport.total_active(), 0);
    }

    #[test]
    fn test_remove_by_id_drops_empty_bucket() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (first, _) = counting_handler();
        let (second, second_seen) = counting_handler();

        let a = registry.add(EventName::PlaybackComplete, first);
        let b = registry.add(EventName::PlaybackComplete, second);

        registry.remove_by_id(EventName::PlaybackComplete, a.id());
        assert_eq!(registry.handler_count(EventName::PlaybackComplete), 1);
        assert_eq!(registry.event_names(), vec![EventName::PlaybackComplete]);

        // wrong event: nothing happens
        registry.remove_by_id(EventName::PlaybackInterrupted, b.id());
        assert_eq!(registry.len(), 1);

        transport.emit("onPlaybackComplete", payload(json!({})));
        assert_eq!(second_seen.lock().len(), 1);

        registry.remove_by_id(EventName::PlaybackComplete, b.id());
        registry.remove_by_id(EventName::PlaybackComplete, b.id());
        assert!(registry.is_empty());
        assert!(registry.event_names().is_empty());
        assert_eq!(transport.active("onPlaybackComplete"), 0);
        assert_eq!(transport.remove_calls("onPlaybackComplete"), 2);
    }

    #[test]
    fn test_remove_all_from_handler_during_delivery() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (other, other_seen) = counting_handler();

        let reg = registry.clone();
        let teardown: EventHandler = Arc::new(move |_: &Payload| reg.remove_all());
        registry.add(EventName::PlaybackInterrupted, teardown);
        registry.add(EventName::PlaybackInterrupted, other);
        registry.add(EventName::Idle, counting_handler().0);

        assert_eq!(transport.emit("onPlaybackInterrupted", payload(json!({}))), 2);
        assert!(registry.is_empty());
        assert_eq!(transport.total_active(), 0);
        assert_eq!(other_seen.lock().len(), 1);

        assert_eq!(transport.emit("onPlaybackInterrupted", payload(json!({}))), 0);
    }

    /// Runs a one-shot hook inside `add_listener`, before the listener is
    /// bound, to interleave a second registration with the first
    #[derive(Default)]
    struct InterleavingTransport {
        inner: RecordingTransport,
        hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    }

    impl EventTransport for InterleavingTransport {
        fn add_listener(&self, event_id: &'static str, callback: NativeCallback)
            -> Box<dyn NativeSubscription> {
            let hook = self.hook.lock().take();
            if let Some(hook) = hook {
                hook();
            }
            self.inner.add_listener(event_id, callback)
        }
    }

    fn interleaved_add(policy: DuplicatePolicy)
        -> (Arc<InterleavingTransport>, SubscriptionRegistry, Subscription, Subscription) {
        let transport = Arc::new(InterleavingTransport::default());
        let registry = SubscriptionRegistry::new(transport.clone(), policy);
        let (handler, _) = counting_handler();

        let inner_result = Arc::new(Mutex::new(None));
        let slot = inner_result.clone();
        let reg = registry.clone();
        let same = handler.clone();
        *transport.hook.lock() = Some(Box::new(move || {
            *slot.lock() = Some(reg.add(EventName::Seeking, same));
        }));

        let outer = registry.add(EventName::Seeking, handler);
        let inner = inner_result.lock().take().expect("hook ran");
        (transport, registry, outer, inner)
    }

    #[test]
    fn test_interleaved_duplicate_replace_keeps_one_listener() {
        let (transport, registry, outer, inner) = interleaved_add(DuplicatePolicy::Replace);

        assert_ne!(outer.id(), inner.id());
        assert_eq!(registry.handler_count(EventName::Seeking), 1);
        assert_eq!(transport.inner.active("onSeeking"), 1);
        assert_eq!(transport.inner.emit("onSeeking", payload(json!({}))), 1);

        outer.remove();
        assert!(registry.is_empty());
        assert_eq!(transport.inner.total_active(), 0);
    }

    #[test]
    fn test_interleaved_duplicate_reject_keeps_first() {
        let (transport, registry, outer, inner) = interleaved_add(DuplicatePolicy::Reject);

        assert_eq!(outer.id(), inner.id());
        assert_eq!(registry.handler_count(EventName::Seeking), 1);
        assert_eq!(transport.inner.add_calls("onSeeking"), 2);
        assert_eq!(transport.inner.active("onSeeking"), 1);

        inner.remove();
        assert!(registry.is_empty());
        assert_eq!(transport.inner.total_active(), 0);
    }

    #[test]
    fn test_handler_may_remove_another_during_delivery() {
        let (transport, registry) = setup(DuplicatePolicy::Replace);
        let (victim, victim_seen) = counting_handler();

        let reg = registry.clone();
        let target = victim.clone();
        let remover: EventHandler = Arc::new(move |_: &Payload| {
            reg.remove(EventName::UpdatePlayInfo, &target);
        });

        registry.add(EventName::UpdatePlayInfo, remover);
        registry.add(EventName::UpdatePlayInfo, victim.clone());

        transport.emit("onUpdatePlayInfo", payload(json!({})));
        assert!(!registry.contains(EventName::UpdatePlayInfo, &victim));

        transport.emit("onUpdatePlayInfo", payload(json!({})));
        // only the delivery already in flight reached the victim
        assert_eq!(victim_seen.lock().len(), 1);
    }
}
