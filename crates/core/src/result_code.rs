// Result codes reported by the native player and the payload decorator

use crate::native::Payload;
use serde_json::Value;
use std::fmt;

/// Payload field carrying the numeric result code
pub const RET_CODE_FIELD: &str = "ret_code";

/// Payload field the decorator fills with the symbolic result
pub const RET_CODE_STR_FIELD: &str = "ret_code_str";

/// Result of a native player operation, as carried in event payloads.
///
/// Codes 0..=17 form the native table; anything else decodes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    InvalidUri,
    InvalidState,
    InvalidParam,
    NoMemory,
    NotSupported,
    NetworkError,
    Timeout,
    FileNotFound,
    PermissionDenied,
    DecodeError,
    RenderError,
    SeekFailed,
    DrmError,
    SourceError,
    DeviceError,
    UnknownError,
    ToBeExtended,
    Unknown(i64),
}

impl ResultCode {
    /// Known codes, indexed by their numeric value
    pub const ALL: [ResultCode; 18] = [
        ResultCode::Ok,
        ResultCode::InvalidUri,
        ResultCode::InvalidState,
        ResultCode::InvalidParam,
        ResultCode::NoMemory,
        ResultCode::NotSupported,
        ResultCode::NetworkError,
        ResultCode::Timeout,
        ResultCode::FileNotFound,
        ResultCode::PermissionDenied,
        ResultCode::DecodeError,
        ResultCode::RenderError,
        ResultCode::SeekFailed,
        ResultCode::DrmError,
        ResultCode::SourceError,
        ResultCode::DeviceError,
        ResultCode::UnknownError,
        ResultCode::ToBeExtended,
    ];

    pub fn from_code(code: i64) -> ResultCode {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .unwrap_or(ResultCode::Unknown(code))
    }

    pub fn code(self) -> i64 {
        match self {
            ResultCode::Unknown(code) => code,
            known => Self::ALL
                .iter()
                .position(|candidate| *candidate == known)
                .map(|index| index as i64)
                .unwrap_or(-1),
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, ResultCode::Unknown(_))
    }

    /// Symbolic name, `None` for codes outside the native table
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            ResultCode::Ok => "PLAYER_OK",
            ResultCode::InvalidUri => "PLAYER_INVALID_URI",
            ResultCode::InvalidState => "PLAYER_INVALID_STATE",
            ResultCode::InvalidParam => "PLAYER_INVALID_PARAM",
            ResultCode::NoMemory => "PLAYER_NO_MEMORY",
            ResultCode::NotSupported => "PLAYER_NOT_SUPPORTED",
            ResultCode::NetworkError => "PLAYER_NETWORK_ERROR",
            ResultCode::Timeout => "PLAYER_TIMEOUT",
            ResultCode::FileNotFound => "PLAYER_FILE_NOT_FOUND",
            ResultCode::PermissionDenied => "PLAYER_PERMISSION_DENIED",
            ResultCode::DecodeError => "PLAYER_DECODE_ERROR",
            ResultCode::RenderError => "PLAYER_RENDER_ERROR",
            ResultCode::SeekFailed => "PLAYER_SEEK_FAILED",
            ResultCode::DrmError => "PLAYER_DRM_ERROR",
            ResultCode::SourceError => "PLAYER_SOURCE_ERROR",
            ResultCode::DeviceError => "PLAYER_DEVICE_ERROR",
            ResultCode::UnknownError => "PLAYER_UNKNOWN_ERROR",
            ResultCode::ToBeExtended => "PLAYER_TO_BE_EXTENDED",
            ResultCode::Unknown(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "UNKNOWN({})", self.code()),
        }
    }
}

/// Reads `ret_code` as an integer. Floats count only when they have no
/// fractional part.
fn integer_ret_code(payload: &Payload) -> Option<i64> {
    match payload.get(RET_CODE_FIELD)? {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

/// Decoded result carried by a payload, if any
pub fn result_of(payload: &Payload) -> Option<ResultCode> {
    integer_ret_code(payload).map(ResultCode::from_code)
}

/// Adds the symbolic result next to `ret_code`.
///
/// Payloads without an integer `ret_code`, or with a code outside the table,
/// pass through unchanged.
pub fn decorate(mut payload: Payload) -> Payload {
    if let Some(name) = result_of(&payload).and_then(ResultCode::name) {
        payload.insert(RET_CODE_STR_FIELD.to_string(), Value::from(name));
    }
    payload
}
