// Event table shared by the bridge and the native transport

use crate::error::BridgeError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Events emitted by the native media player.
///
/// Every variant maps 1:1 to the wire identifier the native transport uses
/// when delivering the event. The player itself drives the transitions:
///
/// ```text
/// idle -> preparing -> prepared -> started <-> paused
///      -> (seeking -> seeked)* -> playbackcomplete | playbackinterrupted | erroroccurred
/// ```
///
/// `exceptionhappened` can arrive from any state. The bridge only relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventName {
    Idle,
    Preparing,
    Prepared,
    Started,
    Paused,
    UpdatePlayInfo,
    Seeking,
    Seeked,
    PlaybackComplete,
    PlaybackInterrupted,
    ErrorOccurred,
    ExceptionHappened,
}

impl EventName {
    /// Full event table, in native declaration order
    pub const ALL: [EventName; 12] = [
        EventName::Idle,
        EventName::Preparing,
        EventName::Prepared,
        EventName::Started,
        EventName::Paused,
        EventName::UpdatePlayInfo,
        EventName::Seeking,
        EventName::Seeked,
        EventName::PlaybackComplete,
        EventName::PlaybackInterrupted,
        EventName::ErrorOccurred,
        EventName::ExceptionHappened,
    ];

    /// Application-facing name
    pub fn name(self) -> &'static str {
        match self {
            EventName::Idle => "idle",
            EventName::Preparing => "preparing",
            EventName::Prepared => "prepared",
            EventName::Started => "started",
            EventName::Paused => "paused",
            EventName::UpdatePlayInfo => "updateplayinfo",
            EventName::Seeking => "seeking",
            EventName::Seeked => "seeked",
            EventName::PlaybackComplete => "playbackcomplete",
            EventName::PlaybackInterrupted => "playbackinterrupted",
            EventName::ErrorOccurred => "erroroccurred",
            EventName::ExceptionHappened => "exceptionhappened",
        }
    }

    /// Identifier used by the native event transport
    pub fn wire_id(self) -> &'static str {
        match self {
            EventName::Idle => "onIdle",
            EventName::Preparing => "onPreparing",
            EventName::Prepared => "onPrepared",
            EventName::Started => "onStarted",
            EventName::Paused => "onPaused",
            EventName::UpdatePlayInfo => "onUpdatePlayInfo",
            EventName::Seeking => "onSeeking",
            EventName::Seeked => "onSeeked",
            EventName::PlaybackComplete => "onPlaybackComplete",
            EventName::PlaybackInterrupted => "onPlaybackInterrupted",
            EventName::ErrorOccurred => "onErrorOccurred",
            EventName::ExceptionHappened => "onExceptionHappened",
        }
    }

    pub fn from_wire_id(wire_id: &str) -> Option<EventName> {
        Self::ALL.into_iter().find(|event| event.wire_id() == wire_id)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventName {
    type Err = BridgeError;

    /// Accepts the application-facing name (case-insensitive) or the wire id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|event| event.name() == lowered)
            .or_else(|| Self::from_wire_id(s))
            .ok_or_else(|| BridgeError::UnknownEvent(s.to_string()))
    }
}
