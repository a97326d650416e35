
use std::fmt;

/// RTCDataChannelState indicates the state of a data channel.
///
/// The state is owned by the native engine. A wrapper only observes it, and
/// only [`Open`](RTCDataChannelState::Open) allows sending.
///
/// ```text
/// Connecting → Open → Closing → Closed
/// ```
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCDataChannel/readyState
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-datachannel-readystate
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCDataChannelState {
    /// The engine reported a value that does not map to a known state.
    #[default]
    Unspecified,

    /// The underlying transport is still being established.
    Connecting,

    /// The transport is established and data can be sent.
    Open,

    /// The transport is being shut down. Sends are rejected.
    Closing,

    /// The transport is closed or could not be established.
    Closed,
}

const DATA_CHANNEL_STATE_CONNECTING_STR: &str = "connecting";
const DATA_CHANNEL_STATE_OPEN_STR: &str = "open";
const DATA_CHANNEL_STATE_CLOSING_STR: &str = "closing";
const DATA_CHANNEL_STATE_CLOSED_STR: &str = "closed";
const DATA_CHANNEL_STATE_UNSPECIFIED_STR: &str = "Unspecified";

impl From<&str> for RTCDataChannelState {
    fn from(raw: &str) -> Self {
        match raw {
            DATA_CHANNEL_STATE_CONNECTING_STR => RTCDataChannelState::Connecting,
            DATA_CHANNEL_STATE_OPEN_STR => RTCDataChannelState::Open,
            DATA_CHANNEL_STATE_CLOSING_STR => RTCDataChannelState::Closing,
            DATA_CHANNEL_STATE_CLOSED_STR => RTCDataChannelState::Closed,
            _ => RTCDataChannelState::Unspecified,
        }
    }
}

/// Native engine codes, in declaration order starting at zero.
impl From<i32> for RTCDataChannelState {
    fn from(v: i32) -> Self {
        match v {
            0 => RTCDataChannelState::Connecting,
            1 => RTCDataChannelState::Open,
            2 => RTCDataChannelState::Closing,
            3 => RTCDataChannelState::Closed,
            _ => RTCDataChannelState::Unspecified,
        }
    }
}

impl fmt::Display for RTCDataChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCDataChannelState::Connecting => DATA_CHANNEL_STATE_CONNECTING_STR,
            RTCDataChannelState::Open => DATA_CHANNEL_STATE_OPEN_STR,
            RTCDataChannelState::Closing => DATA_CHANNEL_STATE_CLOSING_STR,
            RTCDataChannelState::Closed => DATA_CHANNEL_STATE_CLOSED_STR,
            RTCDataChannelState::Unspecified => DATA_CHANNEL_STATE_UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCDataChannelState {
    /// Whether a send may be attempted in this state.
    pub fn can_send(self) -> bool {
        self == RTCDataChannelState::Open
    }
}
