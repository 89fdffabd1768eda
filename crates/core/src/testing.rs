// Recording doubles for the native collaborators

use crate::error::{BridgeError, Result};
use crate::native::{AssetRef, AssetResolver, EventTransport, NativeCallback, NativePlayer,
    NativeSubscription, Payload};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Command received by a [`RecordingPlayer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCall {
    Init(String),
    Play,
    Pause,
    Stop,
    SeekTo(u64),
    DeInit,
}

/// Native player that records every command
#[derive(Default)]
pub struct RecordingPlayer {
    calls: Mutex<Vec<PlayerCall>>,
    position_ms: AtomicU64,
    failing: AtomicBool,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn set_position(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }

    /// Make every command return an error (commands are still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, call: PlayerCall) -> Result<()> {
        self.calls.lock().push(call.clone());
        if self.failing.load(Ordering::SeqCst) {
            Err(BridgeError::Backend(format!("{:?} refused", call)))
        } else {
            Ok(())
        }
    }
}

impl NativePlayer for RecordingPlayer {
    fn init(&self, uri: &str) -> Result<()> {
        self.record(PlayerCall::Init(uri.to_string()))
    }

    fn play(&self) -> Result<()> {
        self.record(PlayerCall::Play)
    }

    fn pause(&self) -> Result<()> {
        self.record(PlayerCall::Pause)
    }

    fn stop(&self) -> Result<()> {
        self.record(PlayerCall::Stop)
    }

    fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.record(PlayerCall::SeekTo(position_ms))
    }

    fn position(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    fn de_init(&self) -> Result<()> {
        self.record(PlayerCall::DeInit)
    }
}

#[derive(Default)]
struct TransportState {
    next_id: u64,
    listeners: Vec<(u64, &'static str, NativeCallback)>,
    add_calls: Vec<&'static str>,
    remove_calls: Vec<&'static str>,
}

/// Transport that delivers events synchronously and counts add/remove calls
#[derive(Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

struct RecordingSubscription {
    id: u64,
    state: Weak<Mutex<TransportState>>,
}

impl NativeSubscription for RecordingSubscription {
    fn remove(self: Box<Self>) {
        if let Some(state) = self.state.upgrade() {
            let mut state = state.lock();
            if let Some(index) = state.listeners.iter().position(|(id, _, _)| *id == self.id) {
                let (_, event_id, _) = state.listeners.remove(index);
                state.remove_calls.push(event_id);
            }
        }
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every listener bound to `event_id`, returning how
    /// many were invoked
    pub fn emit(&self, event_id: &str, payload: Payload) -> usize {
        let targets: Vec<NativeCallback> = self
            .state
            .lock()
            .listeners
            .iter()
            .filter(|(_, id, _)| *id == event_id)
            .map(|(_, _, callback)| callback.clone())
            .collect();
        for callback in &targets {
            callback(&payload);
        }
        targets.len()
    }

    /// Listeners currently bound to `event_id`
    pub fn active(&self, event_id: &str) -> usize {
        self.state.lock().listeners.iter().filter(|(_, id, _)| *id == event_id).count()
    }

    pub fn total_active(&self) -> usize {
        self.state.lock().listeners.len()
    }

    /// Number of `add_listener` calls seen for `event_id`
    pub fn add_calls(&self, event_id: &str) -> usize {
        self.state.lock().add_calls.iter().filter(|id| **id == event_id).count()
    }

    pub fn remove_calls(&self, event_id: &str) -> usize {
        self.state.lock().remove_calls.iter().filter(|id| **id == event_id).count()
    }
}

impl EventTransport for RecordingTransport {
    fn add_listener(&self, event_id: &'static str, callback: NativeCallback)
        -> Box<dyn NativeSubscription> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, event_id, callback));
        state.add_calls.push(event_id);
        Box::new(RecordingSubscription {
            id,
            state: Arc::downgrade(&self.state),
        })
    }
}

/// Resolver backed by a fixed table
#[derive(Default)]
pub struct StaticAssets {
    uris: HashMap<u32, String>,
}

impl StaticAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, asset: AssetRef, uri: &str) -> Self {
        self.uris.insert(asset.0, uri.to_string());
        self
    }
}

impl AssetResolver for StaticAssets {
    fn resolve(&self, asset: AssetRef) -> Option<String> {
        self.uris.get(&asset.0).cloned()
    }
}

/// Build a payload from a JSON object literal
pub fn payload(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}
