// Queue-backed event emitter driven by the host's event loop

use mediabridge_core::{
    BridgeError, EventName, EventTransport, NativeCallback, NativeSubscription, Payload, Result,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// Upper bound on deliveries in a single `pump`. Handlers that keep
/// emitting cannot starve the host loop; the rest stays queued.
pub const MAX_EVENTS_PER_PUMP: usize = 1024;

struct Listener {
    id: u64,
    event_id: String,
    callback: NativeCallback,
}

#[derive(Default)]
struct EmitterState {
    next_id: u64,
    listeners: Vec<Listener>,
    queue: VecDeque<(String, Payload)>,
}

/// Event transport living in the same process as the bridge.
///
/// Native code (or the FFI layer acting for it) queues events with `emit`;
/// the host loop calls `pump` to deliver them. Each delivery works on a
/// snapshot of the listeners, so callbacks may add or remove listeners and
/// queue further events freely.
#[derive(Clone, Default)]
pub struct LocalEmitter {
    state: Arc<Mutex<EmitterState>>,
}

struct EmitterSubscription {
    id: u64,
    state: Weak<Mutex<EmitterState>>,
}

impl NativeSubscription for EmitterSubscription {
    fn remove(self: Box<Self>) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.lock();
        state.listeners.retain(|listener| listener.id != self.id);
    }
}

impl LocalEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next `pump`
    pub fn emit(&self, event_id: &str, payload: Payload) {
        if EventName::from_wire_id(event_id).is_none() {
            log::debug!("Queueing event with unknown id: {}", event_id);
        }
        self.state
            .lock()
            .queue
            .push_back((event_id.to_string(), payload));
    }

    pub fn emit_event(&self, event: EventName, payload: Payload) {
        self.emit(event.wire_id(), payload);
    }

    /// Queue an event whose payload is JSON text. Only objects are accepted.
    pub fn emit_json(&self, event_id: &str, json: &str) -> Result<()> {
        let payload = match serde_json::from_str::<serde_json::Value>(json)? {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => Payload::new(),
            other => {
                return Err(BridgeError::InvalidPayload(format!(
                    "expected a JSON object, got {}",
                    other
                )))
            }
        };
        self.emit(event_id, payload);
        Ok(())
    }

    /// Deliver an event right away, bypassing the queue.
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, event_id: &str, payload: &Payload) -> usize {
        let targets: Vec<NativeCallback> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|listener| listener.event_id == event_id)
            .map(|listener| listener.callback.clone())
            .collect();

        for callback in &targets {
            callback(payload);
        }
        targets.len()
    }

    /// Deliver queued events in order, including events queued by callbacks
    /// during this pump. Returns the number of events taken off the queue.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_EVENTS_PER_PUMP {
            let Some((event_id, payload)) = self.state.lock().queue.pop_front() else {
                break;
            };
            let invoked = self.dispatch(&event_id, &payload);
            log::trace!("Delivered {} to {} listener(s)", event_id, invoked);
            delivered += 1;
        }
        if delivered == MAX_EVENTS_PER_PUMP && self.pending() > 0 {
            log::warn!(
                "Event pump limit reached, {} event(s) left for the next pump",
                self.pending()
            );
        }
        delivered
    }

    /// Events waiting for the next `pump`
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Drop queued events without delivering them
    pub fn clear_pending(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.queue.len();
        state.queue.clear();
        dropped
    }

    pub fn listener_count(&self, event_id: &str) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|listener| listener.event_id == event_id)
            .count()
    }

    pub fn total_listeners(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

impl EventTransport for LocalEmitter {
    fn add_listener(&self, event_id: &'static str, callback: NativeCallback)
        -> Box<dyn NativeSubscription> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push(Listener {
            id,
            event_id: event_id.to_string(),
            callback,
        });
        Box::new(EmitterSubscription {
            id,
            state: Arc::downgrade(&self.state),
        })
    }
}
