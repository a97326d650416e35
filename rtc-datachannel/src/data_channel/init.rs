use shared::error::{Error, Result};

/// Longest label or protocol accepted, in bytes.
pub const MAX_LABEL_LEN: usize = 65535;

/// RTCDataChannelInit can be used to configure properties of the underlying
/// channel such as data reliability.
///
/// Every field is optional. An unset field leaves the choice to the engine.
///
/// ## Specifications
///
/// * [W3C]
///
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannelinit
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCDataChannelInit {
    /// ordered indicates if data is allowed to be delivered out of order. The
    /// engine default guarantees in-order delivery.
    pub ordered: Option<bool>,

    /// max_packet_life_time limits the time (in milliseconds) during which the
    /// channel will transmit or retransmit data if not acknowledged.
    pub max_packet_life_time: Option<u16>,

    /// max_retransmits limits the number of times a channel will retransmit data
    /// if not successfully delivered.
    pub max_retransmits: Option<u16>,

    /// protocol describes the subprotocol name used for this channel.
    pub protocol: Option<String>,

    /// negotiated tells whether the application negotiates the channel out of
    /// band. When true, both peers must create the channel with the same id.
    pub negotiated: Option<bool>,

    /// id sets the channel ID when negotiated is true.
    pub id: Option<u16>,
}

impl RTCDataChannelInit {
    /// Rejects option combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_life_time.is_some() && self.max_retransmits.is_some() {
            return Err(Error::ErrInvalidDataChannelInit(
                "max_packet_life_time and max_retransmits are mutually exclusive".to_owned(),
            ));
        }
        if self
            .protocol
            .as_ref()
            .is_some_and(|p| p.len() > MAX_LABEL_LEN)
        {
            return Err(Error::ErrInvalidDataChannelInit(format!(
                "protocol longer than {MAX_LABEL_LEN} bytes"
            )));
        }
        if self.negotiated == Some(true) && self.id.is_none() {
            return Err(Error::ErrInvalidDataChannelInit(
                "negotiated channel requires an id".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Engine-facing form of [`RTCDataChannelInit`].
///
/// The packet lifetime is named `max_retransmit_time` on the native side.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCDataChannelInitInternal {
    pub ordered: Option<bool>,
    pub max_retransmit_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    pub protocol: Option<String>,
    pub negotiated: Option<bool>,
    pub id: Option<u16>,
}

impl From<&RTCDataChannelInit> for RTCDataChannelInitInternal {
    fn from(init: &RTCDataChannelInit) -> Self {
        RTCDataChannelInitInternal {
            ordered: init.ordered,
            max_retransmit_time: init.max_packet_life_time,
            max_retransmits: init.max_retransmits,
            protocol: init.protocol.clone(),
            negotiated: init.negotiated,
            id: init.id,
        }
    }
}
