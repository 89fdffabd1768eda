// FFI bridge for the media player session
// Provides a C ABI for native hosts: the host supplies the player as a
// callback table, pushes native events as JSON, and pumps delivery from its
// own event loop.

pub mod host;

pub use host::{HostPlayer, MediaBridgeBackend, ASSET_URI_CAPACITY};

use mediabridge_core::{
    BridgeConfig, BridgeError, DuplicatePolicy, EventHandler, EventName, MediaPlayer, Payload,
    ResultCode, Result, Subscription,
};
use mediabridge_emitter::LocalEmitter;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::sync::{Arc, Once};

/// Application listener: receives the user data, the event name and the
/// decorated payload as JSON text. Both strings are only valid during the call.
pub type MediaBridgeListener = extern "C" fn(*mut c_void, *const c_char, *const c_char);

struct FfiSession {
    player: MediaPlayer,
    emitter: Arc<LocalEmitter>,
    listeners: Mutex<HashMap<i64, Subscription>>,
}

static SESSION_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<FfiSession>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_SESSION_ID: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();

fn init_logging(level: log::LevelFilter) {
    INIT_LOGGER.call_once(|| {
        #[cfg(feature = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(level)
                    .with_tag("MediaBridge"),
            );
        }

        #[cfg(all(feature = "desktop", not(feature = "android")))]
        {
            let _ = env_logger::builder()
                .is_test(false)
                .filter_level(level)
                .try_init();
        }

        #[cfg(not(any(feature = "android", feature = "desktop")))]
        {
            let _ = level;
        }
    });
}

fn register_session(session: FfiSession) -> i64 {
    let mut next = NEXT_SESSION_ID.lock();
    let id = *next;
    *next += 1;
    drop(next);

    SESSION_REGISTRY.lock().insert(id, Arc::new(session));
    id
}

/// Runs `f` without holding the registry lock, so listeners invoked from
/// `f` may call back into the C API.
fn with_session<R>(id: i64, f: impl FnOnce(&FfiSession) -> Result<R>) -> Result<R> {
    let session = SESSION_REGISTRY
        .lock()
        .get(&id)
        .cloned()
        .ok_or(BridgeError::InvalidSession(id))?;
    f(&session)
}

fn to_code(result: Result<()>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => {
            log::error!("FFI error: {}", err);
            -1
        }
    }
}

fn read_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(BridgeError::Other(format!("null {}", what)));
    }
    // SAFETY: non-null, and the caller passes a NUL-terminated string that
    // outlives this call
    Ok(unsafe { CStr::from_ptr(ptr) }.to_str()?)
}

struct UserData(*mut c_void);

impl UserData {
    fn get(&self) -> *mut c_void {
        self.0
    }
}

// SAFETY: the pointer is never dereferenced on the Rust side, only handed
// back to the host's listener.
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

fn c_listener(event: EventName, callback: MediaBridgeListener, user_data: *mut c_void) -> EventHandler {
    let user_data = UserData(user_data);
    let event_name = CString::new(event.name()).unwrap_or_default();
    Arc::new(move |payload: &Payload| {
        let json = match serde_json::to_string(payload).map(CString::new) {
            Ok(Ok(json)) => json,
            Ok(Err(e)) => {
                log::error!("Payload for {} contains NUL: {}", event, e);
                return;
            }
            Err(e) => {
                log::error!("Failed to serialize payload for {}: {}", event, e);
                return;
            }
        };
        callback(user_data.get(), event_name.as_ptr(), json.as_ptr());
    })
}

/// JSON description of the event table and the result-code table
pub fn constants_json() -> serde_json::Value {
    let events: Vec<_> = EventName::ALL
        .iter()
        .map(|event| serde_json::json!({ "name": event, "wire_id": event.wire_id() }))
        .collect();
    let result_codes: Vec<_> = ResultCode::ALL
        .iter()
        .map(|code| serde_json::json!({ "code": code.code(), "name": code.name() }))
        .collect();
    serde_json::json!({ "events": events, "result_codes": result_codes })
}

// -----------------------------------------------------------------------------
// C ABI
// -----------------------------------------------------------------------------

/// 0 = off, 1 = error .. 5 = trace; anything else keeps the default level
fn level_filter(level: i32) -> log::LevelFilter {
    match level {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        5 => log::LevelFilter::Trace,
        _ => BridgeConfig::default().log_level,
    }
}

/// Create a session around the host's player with the default settings.
/// Returns: session ID (>0)
#[no_mangle]
pub extern "C" fn mediabridge_session_create(backend: MediaBridgeBackend) -> i64 {
    mediabridge_session_create_with_config(backend, 0, -1)
}

/// Create a session with explicit settings.
///
/// `reject_duplicates` != 0 keeps the first registration when the same
/// handler is added twice instead of replacing it. `log_level` only takes
/// effect for the first session created in the process.
/// Returns: session ID (>0)
#[no_mangle]
pub extern "C" fn mediabridge_session_create_with_config(
    backend: MediaBridgeBackend,
    reject_duplicates: i32,
    log_level: i32,
) -> i64 {
    let policy = if reject_duplicates != 0 {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::Replace
    };
    let config = BridgeConfig::default()
        .with_duplicate_policy(policy)
        .with_log_level(level_filter(log_level));
    init_logging(config.log_level);

    let host = Arc::new(HostPlayer::new(backend));
    let emitter = Arc::new(LocalEmitter::new());
    let player = MediaPlayer::with_config(host.clone(), emitter.clone(), config)
        .with_asset_resolver(host);

    let id = register_session(FfiSession {
        player,
        emitter,
        listeners: Mutex::new(HashMap::new()),
    });
    log::info!("Created media session with ID: {}", id);
    id
}

/// Returns: 0 on success, -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_init_uri(session_id: i64, uri: *const c_char) -> i32 {
    to_code(with_session(session_id, |s| {
        let uri = read_str(uri, "URI")?;
        s.player.init(uri);
        Ok(())
    }))
}

/// Returns: 0 on success, -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_init_asset(session_id: i64, asset_id: u32) -> i32 {
    to_code(with_session(session_id, |s| {
        s.player.init(mediabridge_core::AssetRef(asset_id));
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn mediabridge_session_play(session_id: i64) -> i32 {
    to_code(with_session(session_id, |s| {
        s.player.play();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn mediabridge_session_pause(session_id: i64) -> i32 {
    to_code(with_session(session_id, |s| {
        s.player.pause();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn mediabridge_session_stop(session_id: i64) -> i32 {
    to_code(with_session(session_id, |s| {
        s.player.stop();
        Ok(())
    }))
}

#[no_mangle]
pub extern "C" fn mediabridge_session_seek_to(session_id: i64, time_ms: i64) -> i32 {
    to_code(with_session(session_id, |s| {
        s.player.seek_to(time_ms);
        Ok(())
    }))
}

/// Returns: position in ms, or -1 without a source or on error
#[no_mangle]
pub extern "C" fn mediabridge_session_position(session_id: i64) -> i64 {
    match with_session(session_id, |s| Ok(s.player.position())) {
        Ok(Some(position)) => i64::try_from(position).unwrap_or(i64::MAX),
        Ok(None) => -1,
        Err(e) => {
            log::error!("FFI error: {}", e);
            -1
        }
    }
}

/// Register a listener for an event name (e.g. "prepared") or wire id.
/// Returns: listener ID (>0), or -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_add_listener(
    session_id: i64,
    event_name: *const c_char,
    callback: Option<MediaBridgeListener>,
    user_data: *mut c_void,
) -> i64 {
    let result = with_session(session_id, |s| {
        let event: EventName = read_str(event_name, "event name")?.parse()?;
        let callback = callback.ok_or_else(|| BridgeError::Other("null listener".into()))?;
        let subscription = s
            .player
            .add_event_listener(event, c_listener(event, callback, user_data));
        let listener_id = subscription.id().as_u64() as i64;
        s.listeners.lock().insert(listener_id, subscription);
        Ok(listener_id)
    });
    match result {
        Ok(id) => id,
        Err(e) => {
            log::error!("FFI error: {}", e);
            -1
        }
    }
}

/// Returns: 0 on success (also for unknown listener IDs), -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_remove_listener(session_id: i64, listener_id: i64) -> i32 {
    to_code(with_session(session_id, |s| {
        let subscription = s.listeners.lock().remove(&listener_id);
        if let Some(subscription) = subscription {
            subscription.remove();
        }
        Ok(())
    }))
}

/// Queue a native event. `event` is a wire id or event name, `payload_json`
/// a JSON object (or null). Delivery happens on the next pump.
/// Returns: 0 on success, -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_emit(
    session_id: i64,
    event: *const c_char,
    payload_json: *const c_char,
) -> i32 {
    to_code(with_session(session_id, |s| {
        let event: EventName = read_str(event, "event")?.parse()?;
        let json = if payload_json.is_null() {
            "null"
        } else {
            read_str(payload_json, "payload")?
        };
        s.emitter.emit_json(event.wire_id(), json)
    }))
}

/// Deliver queued events to listeners.
/// Returns: number of events delivered, or -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_pump(session_id: i64) -> i32 {
    match with_session(session_id, |s| Ok(s.emitter.pump())) {
        Ok(delivered) => i32::try_from(delivered).unwrap_or(i32::MAX),
        Err(e) => {
            log::error!("FFI error: {}", e);
            -1
        }
    }
}

/// Destroy the session: unbind listeners, stop and release the host player.
/// Returns: 0 on success, -1 on error
#[no_mangle]
pub extern "C" fn mediabridge_session_destroy(session_id: i64) -> i32 {
    let session = SESSION_REGISTRY.lock().remove(&session_id);
    match session {
        Some(session) => {
            session.player.destroy();
            session.listeners.lock().clear();
            let dropped = session.emitter.clear_pending();
            log::info!(
                "Destroyed media session {} ({} undelivered event(s) dropped)",
                session_id,
                dropped
            );
            0
        }
        None => {
            log::error!("Invalid session ID: {}", session_id);
            -1
        }
    }
}

/// Event and result-code tables as JSON.
/// Release the string with `mediabridge_string_free`.
#[no_mangle]
pub extern "C" fn mediabridge_constants_json() -> *mut c_char {
    match CString::new(constants_json().to_string()) {
        Ok(json) => json.into_raw(),
        Err(e) => {
            log::error!("Failed to export constants: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// # Safety
///
/// `s` must come from this library and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn mediabridge_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediabridge_core::result_code::RET_CODE_STR_FIELD;
    use std::ptr;

    /// Host-side state reachable through the backend context
    #[derive(Default)]
    struct FakeHost {
        calls: Mutex<Vec<String>>,
        events: Mutex<Vec<(String, serde_json::Value)>>,
    }

    fn host(context: *mut c_void) -> &'static FakeHost {
        unsafe { &*(context as *const FakeHost) }
    }

    extern "C" fn fake_init(context: *mut c_void, uri: *const c_char) -> i32 {
        let uri = unsafe { CStr::from_ptr(uri) }.to_string_lossy().into_owned();
        host(context).calls.lock().push(format!("init {}", uri));
        0
    }

    extern "C" fn fake_play(context: *mut c_void) -> i32 {
        host(context).calls.lock().push("play".into());
        0
    }

    extern "C" fn fake_stop(context: *mut c_void) -> i32 {
        host(context).calls.lock().push("stop".into());
        0
    }

    extern "C" fn fake_seek(context: *mut c_void, position_ms: u64) -> i32 {
        host(context).calls.lock().push(format!("seek {}", position_ms));
        0
    }

    extern "C" fn fake_position(_context: *mut c_void) -> u64 {
        1_500
    }

    extern "C" fn fake_de_init(context: *mut c_void) -> i32 {
        host(context).calls.lock().push("deInit".into());
        0
    }

    extern "C" fn fake_resolve(_context: *mut c_void, asset: u32, out: *mut c_char, len: usize) -> i32 {
        if asset != 3 {
            return -1;
        }
        let uri = b"asset:///raw/theme.mp3\0";
        assert!(uri.len() <= len);
        unsafe { ptr::copy_nonoverlapping(uri.as_ptr() as *const c_char, out, uri.len()) };
        (uri.len() - 1) as i32
    }

    extern "C" fn record_event(user_data: *mut c_void, event: *const c_char, json: *const c_char) {
        let event = unsafe { CStr::from_ptr(event) }.to_string_lossy().into_owned();
        let json = unsafe { CStr::from_ptr(json) }.to_str().unwrap();
        let payload = serde_json::from_str(json).unwrap();
        host(user_data).events.lock().push((event, payload));
    }

    fn backend(fake: &FakeHost) -> MediaBridgeBackend {
        MediaBridgeBackend {
            context: fake as *const FakeHost as *mut c_void,
            init: Some(fake_init),
            play: Some(fake_play),
            pause: None,
            stop: Some(fake_stop),
            seek_to: Some(fake_seek),
            position: Some(fake_position),
            de_init: Some(fake_de_init),
            resolve_asset: Some(fake_resolve),
        }
    }

    fn cs(s: &str) -> &'static CStr {
        Box::leak(CString::new(s).unwrap().into_boxed_c_str())
    }

    fn leaked_host() -> &'static FakeHost {
        Box::leak(Box::new(FakeHost::default()))
    }

    #[test]
    fn test_session_lifecycle() {
        let fake = leaked_host();
        let id = mediabridge_session_create(backend(fake));
        let context = fake as *const FakeHost as *mut c_void;

        assert_eq!(mediabridge_session_play(id), 0);
        assert_eq!(mediabridge_session_position(id), -1);

        let listener = mediabridge_session_add_listener(
            id,
            cs("erroroccurred").as_ptr(),
            Some(record_event),
            context,
        );
        assert!(listener > 0);

        assert_eq!(mediabridge_session_init_uri(id, cs("https://cdn.example.com/a.mp4").as_ptr()), 0);
        assert_eq!(
            mediabridge_session_emit(id, cs("onPrepared").as_ptr(), cs("{\"duration\": 100}").as_ptr()),
            0
        );
        assert_eq!(
            mediabridge_session_emit(id, cs("erroroccurred").as_ptr(), cs("{\"ret_code\": 1}").as_ptr()),
            0
        );
        assert_eq!(mediabridge_session_pump(id), 2);

        assert_eq!(mediabridge_session_seek_to(id, 150), 0);
        assert_eq!(mediabridge_session_position(id), 1_500);

        {
            let events = fake.events.lock();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].0, "erroroccurred");
            assert_eq!(events[0].1[RET_CODE_STR_FIELD], "PLAYER_INVALID_URI");
        }

        assert_eq!(mediabridge_session_remove_listener(id, listener), 0);
        mediabridge_session_emit(id, cs("onErrorOccurred").as_ptr(), ptr::null());
        mediabridge_session_pump(id);
        assert_eq!(fake.events.lock().len(), 1);

        assert_eq!(mediabridge_session_destroy(id), 0);
        assert_eq!(mediabridge_session_destroy(id), -1);
        assert_eq!(mediabridge_session_play(id), -1);

        assert_eq!(
            *fake.calls.lock(),
            vec![
                "init https://cdn.example.com/a.mp4".to_string(),
                "seek 100".to_string(),
                "stop".to_string(),
                "deInit".to_string(),
            ]
        );
    }

    #[test]
    fn test_init_asset_uses_host_resolver() {
        let fake = leaked_host();
        let id = mediabridge_session_create(backend(fake));

        assert_eq!(mediabridge_session_init_asset(id, 3), 0);
        assert_eq!(mediabridge_session_init_asset(id, 4), 0);
        assert_eq!(mediabridge_session_destroy(id), 0);

        assert_eq!(
            *fake.calls.lock(),
            vec![
                "init asset:///raw/theme.mp3".to_string(),
                "stop".to_string(),
                "deInit".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_host_callback_is_not_fatal() {
        let fake = leaked_host();
        let id = mediabridge_session_create(backend(fake));
        mediabridge_session_init_uri(id, cs("movie.mp4").as_ptr());

        // pause is not provided by the fake host
        assert_eq!(mediabridge_session_pause(id), 0);
        mediabridge_session_destroy(id);
    }

    #[test]
    fn test_invalid_arguments() {
        let fake = leaked_host();
        let id = mediabridge_session_create(backend(fake));

        assert_eq!(mediabridge_session_init_uri(id, ptr::null()), -1);
        assert_eq!(
            mediabridge_session_add_listener(id, cs("rewinding").as_ptr(), Some(record_event), ptr::null_mut()),
            -1
        );
        assert_eq!(
            mediabridge_session_add_listener(id, cs("started").as_ptr(), None, ptr::null_mut()),
            -1
        );
        assert_eq!(mediabridge_session_emit(id, cs("onStarted").as_ptr(), cs("[1]").as_ptr()), -1);
        assert_eq!(mediabridge_session_remove_listener(id, 9_999), 0);
        assert_eq!(mediabridge_session_pump(-7), -1);
        mediabridge_session_destroy(id);
    }

    #[test]
    fn test_create_with_config() {
        let fake = leaked_host();
        let strict = mediabridge_session_create_with_config(backend(fake), 1, 4);
        let lenient = mediabridge_session_create(backend(fake));
        assert!(strict > 0 && lenient > strict);

        let policy = |id| with_session(id, |s| Ok(s.player.registry().policy())).unwrap();
        assert_eq!(policy(strict), DuplicatePolicy::Reject);
        assert_eq!(policy(lenient), DuplicatePolicy::Replace);

        mediabridge_session_destroy(strict);
        mediabridge_session_destroy(lenient);
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(0), log::LevelFilter::Off);
        assert_eq!(level_filter(2), log::LevelFilter::Warn);
        assert_eq!(level_filter(5), log::LevelFilter::Trace);
        assert_eq!(level_filter(-1), log::LevelFilter::Info);
        assert_eq!(level_filter(42), log::LevelFilter::Info);
    }

    #[test]
    fn test_constants_json() {
        let raw = mediabridge_constants_json();
        assert!(!raw.is_null());
        let json = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_string();
        unsafe { mediabridge_string_free(raw) };

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["events"].as_array().unwrap().len(), 12);
        assert_eq!(value["events"][2]["wire_id"], "onPrepared");
        assert_eq!(value["events"][5]["name"], "updateplayinfo");
        assert_eq!(value["result_codes"][0]["name"], "PLAYER_OK");
        assert_eq!(value["result_codes"][17]["name"], "PLAYER_TO_BE_EXTENDED");
    }
}
