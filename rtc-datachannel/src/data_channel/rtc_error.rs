use std::fmt;

/// Classification attached to an error raised by the native engine.
///
/// Codes follow the engine's declaration order starting at zero. Unknown
/// codes decode to [`RTCErrorType::None`].
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCErrorType {
    #[default]
    None,
    UnsupportedOperation,
    UnsupportedParameter,
    InvalidParameter,
    InvalidRange,
    SyntaxError,
    InvalidState,
    InvalidModification,
    NetworkError,
    ResourceExhausted,
    InternalError,
    OperationErrorWithData,
}

impl From<i32> for RTCErrorType {
    fn from(v: i32) -> Self {
        match v {
            1 => RTCErrorType::UnsupportedOperation,
            2 => RTCErrorType::UnsupportedParameter,
            3 => RTCErrorType::InvalidParameter,
            4 => RTCErrorType::InvalidRange,
            5 => RTCErrorType::SyntaxError,
            6 => RTCErrorType::InvalidState,
            7 => RTCErrorType::InvalidModification,
            8 => RTCErrorType::NetworkError,
            9 => RTCErrorType::ResourceExhausted,
            10 => RTCErrorType::InternalError,
            11 => RTCErrorType::OperationErrorWithData,
            _ => RTCErrorType::None,
        }
    }
}

impl From<RTCErrorType> for i32 {
    fn from(t: RTCErrorType) -> Self {
        match t {
            RTCErrorType::None => 0,
            RTCErrorType::UnsupportedOperation => 1,
            RTCErrorType::UnsupportedParameter => 2,
            RTCErrorType::InvalidParameter => 3,
            RTCErrorType::InvalidRange => 4,
            RTCErrorType::SyntaxError => 5,
            RTCErrorType::InvalidState => 6,
            RTCErrorType::InvalidModification => 7,
            RTCErrorType::NetworkError => 8,
            RTCErrorType::ResourceExhausted => 9,
            RTCErrorType::InternalError => 10,
            RTCErrorType::OperationErrorWithData => 11,
        }
    }
}

impl fmt::Display for RTCErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// RTCError is the payload of an `on_error` notification.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCError {
    pub error_type: RTCErrorType,
    pub message: String,
}

impl RTCError {
    /// Builds an error from the engine's raw message bytes. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn from_native(error_type: i32, message: &[u8]) -> Self {
        RTCError {
            error_type: RTCErrorType::from(error_type),
            message: String::from_utf8_lossy(message).into_owned(),
        }
    }
}

impl fmt::Display for RTCError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type, self.message)
    }
}
