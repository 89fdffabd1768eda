// Media player session: command facade over the native player

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::events::EventName;
use crate::native::{AssetResolver, EventTransport, MediaSource, NativePlayer, NoAssets, Payload};
use crate::registry::{EventHandler, Subscription, SubscriptionRegistry};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Payload field carrying the media duration on `prepared`
pub const DURATION_FIELD: &str = "duration";

#[derive(Debug, Default)]
struct SessionState {
    uri: Option<String>,
    duration_ms: Option<u64>,
    prepared_listener_installed: bool,
}

fn duration_ms(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .map(|ms| ms.round() as u64)
    })
}

/// One playback context bridging application code and the native player.
///
/// Commands are forwarded only while a source URI is set; otherwise they
/// are dropped silently. Nothing here returns an error: backend failures
/// are logged, and native failures arrive as `erroroccurred` /
/// `exceptionhappened` events.
pub struct MediaPlayer {
    player: Arc<dyn NativePlayer>,
    assets: Arc<dyn AssetResolver>,
    registry: SubscriptionRegistry,
    state: Arc<Mutex<SessionState>>,
}

impl MediaPlayer {
    pub fn new(player: Arc<dyn NativePlayer>, transport: Arc<dyn EventTransport>) -> Self {
        Self::with_config(player, transport, BridgeConfig::default())
    }

    pub fn with_config(
        player: Arc<dyn NativePlayer>,
        transport: Arc<dyn EventTransport>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            player,
            assets: Arc::new(NoAssets),
            registry: SubscriptionRegistry::new(transport, config.duplicate_policy),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    pub fn with_asset_resolver(mut self, assets: Arc<dyn AssetResolver>) -> Self {
        self.assets = assets;
        self
    }

    fn forward(&self, command: &str, result: Result<()>) {
        match result {
            Ok(()) => log::debug!("MediaPlayer: {} forwarded", command),
            Err(e) => log::error!("MediaPlayer: {} failed: {}", command, e),
        }
    }

    fn has_source(&self) -> bool {
        self.state.lock().uri.is_some()
    }

    /// Load a new source. Asset references go through the asset resolver.
    pub fn init(&self, source: impl Into<MediaSource>) {
        let source = source.into();
        let uri = match &source {
            MediaSource::Uri(uri) => Some(uri.clone()),
            MediaSource::Asset(asset) => self.assets.resolve(*asset),
        }
        .filter(|uri| !uri.is_empty());

        {
            let mut state = self.state.lock();
            state.duration_ms = None;
            state.uri = uri.clone();
        }

        let Some(uri) = uri else {
            log::warn!("MediaPlayer: init called without a playable source ({})", source);
            return;
        };

        self.install_prepared_listener();
        log::info!("MediaPlayer: init {}", uri);
        self.forward("init", self.player.init(&uri));
    }

    /// Captures the duration reported with `prepared`. Installed once per
    /// session; `destroy` removes it without clearing the flag, so later
    /// `init` calls on the same session no longer track duration.
    fn install_prepared_listener(&self) {
        {
            let mut state = self.state.lock();
            if state.prepared_listener_installed {
                return;
            }
            state.prepared_listener_installed = true;
        }

        let state = Arc::downgrade(&self.state);
        let capture: EventHandler = Arc::new(move |payload: &Payload| {
            let Some(state) = state.upgrade() else {
                return;
            };
            if let Some(duration) = payload.get(DURATION_FIELD).and_then(duration_ms) {
                log::debug!("MediaPlayer: duration {} ms", duration);
                state.lock().duration_ms = Some(duration);
            }
        });
        self.registry.add(EventName::Prepared, capture);
    }

    pub fn play(&self) {
        if self.has_source() {
            self.forward("play", self.player.play());
        }
    }

    pub fn pause(&self) {
        if self.has_source() {
            self.forward("pause", self.player.pause());
        }
    }

    pub fn stop(&self) {
        if self.has_source() {
            self.forward("stop", self.player.stop());
        }
    }

    /// Seek to `time_ms`, clamped to `[0, duration]` once the duration is
    /// known. Negative targets always become 0.
    pub fn seek_to(&self, time_ms: i64) {
        let (has_source, duration) = {
            let state = self.state.lock();
            (state.uri.is_some(), state.duration_ms)
        };
        if !has_source {
            return;
        }

        let mut target = u64::try_from(time_ms).unwrap_or(0);
        if let Some(duration) = duration {
            target = target.min(duration);
        }
        self.forward("seekTo", self.player.seek_to(target));
    }

    /// Current position in milliseconds, `None` without a source
    pub fn position(&self) -> Option<u64> {
        if self.has_source() {
            Some(self.player.position())
        } else {
            None
        }
    }

    /// Unbind every listener, then stop and release the native player.
    /// Source, duration and the prepared-listener flag are left as they are;
    /// only `init` replaces them.
    pub fn destroy(&self) {
        self.registry.remove_all();
        log::info!("MediaPlayer: destroy");
        self.forward("stop", self.player.stop());
        self.forward("deInit", self.player.de_init());
    }

    pub fn add_event_listener(&self, event: EventName, handler: EventHandler) -> Subscription {
        self.registry.add(event, handler)
    }

    pub fn remove_event_listener(&self, event: EventName, handler: &EventHandler) {
        self.registry.remove(event, handler);
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    /// Duration reported by the last `prepared` event
    pub fn duration(&self) -> Option<u64> {
        self.state.lock().duration_ms
    }

    pub fn source_uri(&self) -> Option<String> {
        self.state.lock().uri.clone()
    }

    pub fn is_prepared_listener_installed(&self) -> bool {
        self.state.lock().prepared_listener_installed
    }
}
