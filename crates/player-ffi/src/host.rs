// Native player supplied by the host as a table of C function pointers

use mediabridge_core::{AssetRef, AssetResolver, BridgeError, NativePlayer, Result};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};

/// Capacity of the buffer handed to `resolve_asset`, including the NUL
pub const ASSET_URI_CAPACITY: usize = 2048;

/// Host callbacks driving the platform media player.
///
/// Command callbacks return 0 on success and any other value on failure.
/// `context` is passed back untouched on every call. The host must keep it
/// valid until the session is destroyed, and the callbacks must tolerate
/// being called from whichever thread drives the bridge.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct MediaBridgeBackend {
    pub context: *mut c_void,
    pub init: Option<extern "C" fn(*mut c_void, *const c_char) -> i32>,
    pub play: Option<extern "C" fn(*mut c_void) -> i32>,
    pub pause: Option<extern "C" fn(*mut c_void) -> i32>,
    pub stop: Option<extern "C" fn(*mut c_void) -> i32>,
    pub seek_to: Option<extern "C" fn(*mut c_void, u64) -> i32>,
    pub position: Option<extern "C" fn(*mut c_void) -> u64>,
    pub de_init: Option<extern "C" fn(*mut c_void) -> i32>,
    /// Writes the NUL-terminated URI of an asset into the buffer and returns
    /// its length, or a negative value when the asset is unknown. Optional.
    pub resolve_asset: Option<extern "C" fn(*mut c_void, u32, *mut c_char, usize) -> i32>,
}

/// [`NativePlayer`] and [`AssetResolver`] backed by a [`MediaBridgeBackend`]
pub struct HostPlayer {
    backend: MediaBridgeBackend,
}

// SAFETY: the host guarantees `context` and the callbacks stay valid and are
// safe to call from the bridge's thread for the lifetime of the session.
unsafe impl Send for HostPlayer {}
unsafe impl Sync for HostPlayer {}

fn status(command: &str, code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(BridgeError::Backend(format!("{} returned {}", command, code)))
    }
}

fn missing(command: &str) -> BridgeError {
    BridgeError::Backend(format!("host does not provide {}", command))
}

impl HostPlayer {
    pub fn new(backend: MediaBridgeBackend) -> Self {
        Self { backend }
    }

    fn command(&self, name: &str, callback: Option<extern "C" fn(*mut c_void) -> i32>) -> Result<()> {
        let callback = callback.ok_or_else(|| missing(name))?;
        status(name, callback(self.backend.context))
    }
}

impl NativePlayer for HostPlayer {
    fn init(&self, uri: &str) -> Result<()> {
        let callback = self.backend.init.ok_or_else(|| missing("init"))?;
        let uri = CString::new(uri)
            .map_err(|e| BridgeError::InvalidSource(format!("URI contains NUL: {}", e)))?;
        status("init", callback(self.backend.context, uri.as_ptr()))
    }

    fn play(&self) -> Result<()> {
        self.command("play", self.backend.play)
    }

    fn pause(&self) -> Result<()> {
        self.command("pause", self.backend.pause)
    }

    fn stop(&self) -> Result<()> {
        self.command("stop", self.backend.stop)
    }

    fn seek_to(&self, position_ms: u64) -> Result<()> {
        let callback = self.backend.seek_to.ok_or_else(|| missing("seekTo"))?;
        status("seekTo", callback(self.backend.context, position_ms))
    }

    fn position(&self) -> u64 {
        match self.backend.position {
            Some(callback) => callback(self.backend.context),
            None => 0,
        }
    }

    fn de_init(&self) -> Result<()> {
        self.command("deInit", self.backend.de_init)
    }
}

impl AssetResolver for HostPlayer {
    fn resolve(&self, asset: AssetRef) -> Option<String> {
        let callback = self.backend.resolve_asset?;
        let mut buffer = vec![0 as c_char; ASSET_URI_CAPACITY];
        let written = callback(self.backend.context, asset.0, buffer.as_mut_ptr(), buffer.len());
        if written < 0 {
            log::warn!("Host could not resolve asset {}", asset.0);
            return None;
        }
        // Force termination in case the host filled the whole buffer
        if let Some(last) = buffer.last_mut() {
            *last = 0;
        }
        // SAFETY: the buffer is NUL-terminated and outlives the borrow
        let uri = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        match uri.to_str() {
            Ok(uri) => Some(uri.to_string()),
            Err(e) => {
                log::error!("Asset {} resolved to invalid UTF-8: {}", asset.0, e);
                None
            }
        }
    }
}
