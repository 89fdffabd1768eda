// Contracts of the native collaborators the bridge talks to

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Event payload as delivered by the native transport
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Raw callback handed to the native transport
pub type NativeCallback = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Native media player backend.
///
/// Commands are fire-and-forget: the player answers later through events
/// (e.g. `started` after `play`). An `Err` only means the command could not
/// be submitted.
pub trait NativePlayer: Send + Sync {
    fn init(&self, uri: &str) -> Result<()>;

    fn play(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Current playback position in milliseconds
    fn position(&self) -> u64;

    /// Release native resources
    fn de_init(&self) -> Result<()>;
}

/// Listener handle returned by the native transport
pub trait NativeSubscription: Send {
    fn remove(self: Box<Self>);
}

/// Native event-emission transport
pub trait EventTransport: Send + Sync {
    fn add_listener(&self, event_id: &'static str, callback: NativeCallback)
        -> Box<dyn NativeSubscription>;
}

/// Reference to a bundled media asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetRef(pub u32);

/// Resolves bundled assets to playable URIs
pub trait AssetResolver: Send + Sync {
    fn resolve(&self, asset: AssetRef) -> Option<String>;
}

/// Resolver for hosts without bundled assets
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

impl AssetResolver for NoAssets {
    fn resolve(&self, asset: AssetRef) -> Option<String> {
        log::debug!("No asset resolver configured, cannot resolve asset {}", asset.0);
        None
    }
}

/// What `MediaPlayer::init` accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Uri(String),
    Asset(AssetRef),
}

impl From<&str> for MediaSource {
    fn from(uri: &str) -> Self {
        MediaSource::Uri(uri.to_string())
    }
}

impl From<String> for MediaSource {
    fn from(uri: String) -> Self {
        MediaSource::Uri(uri)
    }
}

impl From<AssetRef> for MediaSource {
    fn from(asset: AssetRef) -> Self {
        MediaSource::Asset(asset)
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaSource::Uri(uri) => write!(f, "uri {:?}", uri),
            MediaSource::Asset(asset) => write!(f, "asset #{}", asset.0),
        }
    }
}
