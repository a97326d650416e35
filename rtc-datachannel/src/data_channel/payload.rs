use crate::native::{NativeContext, NativeRef};
use log::trace;

/// One outbound message, as accepted by the public send entry points.
///
/// Every variant reaches the engine through exactly one native primitive.
pub(crate) enum DataChannelPayload<'a> {
    /// UTF-8 text, sent as a text message.
    Text(&'a str),
    /// An owned buffer, sent through the binary primitive with its length.
    Binary(&'a [u8]),
    /// A borrowed span, sent through the pointer primitive even when empty.
    Span(&'a [u8]),
    /// Caller-supplied memory. Null or empty is not forwarded.
    Raw { ptr: *const u8, len: usize },
}

impl DataChannelPayload<'_> {
    pub(crate) fn len(&self) -> usize {
        match self {
            DataChannelPayload::Text(s) => s.len(),
            DataChannelPayload::Binary(b) | DataChannelPayload::Span(b) => b.len(),
            DataChannelPayload::Raw { len, .. } => *len,
        }
    }

    /// Hands the payload to the engine.
    ///
    /// # Safety
    ///
    /// A `Raw` payload must point to `len` readable bytes.
    pub(crate) unsafe fn forward(self, context: &dyn NativeContext, channel: NativeRef) {
        match self {
            DataChannelPayload::Text(s) => context.data_channel_send(channel, s),
            DataChannelPayload::Binary(b) => context.data_channel_send_binary(channel, b),
            DataChannelPayload::Span(s) => unsafe {
                context.data_channel_send_ptr(channel, s.as_ptr(), s.len())
            },
            DataChannelPayload::Raw { ptr, len } => {
                if ptr.is_null() || len == 0 {
                    trace!("data channel {channel}: empty raw send skipped");
                    return;
                }
                unsafe { context.data_channel_send_ptr(channel, ptr, len) }
            }
        }
    }
}
