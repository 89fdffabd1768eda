// Core types for the media playback event bridge

pub mod config;
pub mod error;
pub mod events;
pub mod native;
pub mod player;
pub mod registry;
pub mod result_code;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::{BridgeConfig, DuplicatePolicy};
pub use error::{BridgeError, Result};
pub use events::EventName;
pub use native::{
    AssetRef, AssetResolver, EventTransport, MediaSource, NativeCallback, NativePlayer,
    NativeSubscription, NoAssets, Payload,
};
pub use player::MediaPlayer;
pub use registry::{EventHandler, ListenerId, Subscription, SubscriptionRegistry};
pub use result_code::{decorate, ResultCode};
