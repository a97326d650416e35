
pub mod loopback;

use crate::data_channel::init::RTCDataChannelInitInternal;
use crate::state::RTCDataChannelState;
use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;

/// Opaque identity of a resource owned by the native engine.
///
/// A `NativeRef` never owns what it points at. It is only ever handed back to
/// the engine that produced it, or used as a lookup key when that engine
/// raises a notification. Null pointers are not representable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeRef(NonZeroUsize);

impl NativeRef {
    /// Wraps a pointer received from the engine. Returns `None` for null.
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(NativeRef)
    }

    pub fn from_addr(addr: usize) -> Option<Self> {
        NonZeroUsize::new(addr).map(NativeRef)
    }

    pub fn addr(self) -> usize {
        self.0.get()
    }

    /// Pointer form, as passed to the engine and to registered callbacks.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }
}

impl fmt::Display for NativeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.get())
    }
}

/// Raised by the engine when a message arrives. `msg` is valid for `size`
/// bytes only for the duration of the call.
pub type DelegateNativeOnMessage =
    unsafe extern "C" fn(channel: *mut c_void, msg: *const u8, size: i32);

pub type DelegateNativeOnOpen = unsafe extern "C" fn(channel: *mut c_void);

pub type DelegateNativeOnClose = unsafe extern "C" fn(channel: *mut c_void);

/// Raised by the engine on a channel error. `error_type` carries an
/// [`RTCErrorType`](crate::data_channel::rtc_error::RTCErrorType) code and
/// `message` is valid for `size` bytes only for the duration of the call.
pub type DelegateNativeOnError = unsafe extern "C" fn(
    channel: *mut c_void,
    error_type: i32,
    message: *const u8,
    size: i32,
);

/// Raised by the engine when the remote peer announces a new data channel.
pub type DelegateNativeOnDataChannel =
    unsafe extern "C" fn(peer_connection: *mut c_void, channel: *mut c_void);

/// NativeContext is the boundary to the native WebRTC engine.
///
/// An implementation forwards each call to the engine verbatim. Callbacks
/// registered here may be invoked from any engine thread, at any time, until
/// the corresponding resource is deleted.
pub trait NativeContext: Send + Sync {
    /// Whether the engine is still running. Once this returns false no other
    /// method may be called.
    fn is_live(&self) -> bool;

    fn create_peer_connection(&self) -> Option<NativeRef>;
    fn close_peer_connection(&self, peer_connection: NativeRef);
    fn delete_peer_connection(&self, peer_connection: NativeRef);
    fn create_data_channel(
        &self,
        peer_connection: NativeRef,
        label: &str,
        init: &RTCDataChannelInitInternal,
    ) -> Option<NativeRef>;
    fn register_on_data_channel(
        &self,
        peer_connection: NativeRef,
        callback: DelegateNativeOnDataChannel,
    );

    fn register_on_message(&self, channel: NativeRef, callback: DelegateNativeOnMessage);
    fn register_on_open(&self, channel: NativeRef, callback: DelegateNativeOnOpen);
    fn register_on_close(&self, channel: NativeRef, callback: DelegateNativeOnClose);
    fn register_on_error(&self, channel: NativeRef, callback: DelegateNativeOnError);

    fn data_channel_id(&self, channel: NativeRef) -> i32;
    fn data_channel_label(&self, channel: NativeRef) -> String;
    fn data_channel_protocol(&self, channel: NativeRef) -> String;
    fn data_channel_max_retransmits(&self, channel: NativeRef) -> u16;
    fn data_channel_max_retransmit_time(&self, channel: NativeRef) -> u16;
    fn data_channel_ordered(&self, channel: NativeRef) -> bool;
    fn data_channel_buffered_amount(&self, channel: NativeRef) -> u64;
    fn data_channel_negotiated(&self, channel: NativeRef) -> bool;
    fn data_channel_ready_state(&self, channel: NativeRef) -> RTCDataChannelState;

    /// Requests the close transition. Closing an already closed channel is a
    /// no-op on the engine side.
    fn data_channel_close(&self, channel: NativeRef);
    /// Releases the native channel. `channel` must not be used afterwards.
    fn delete_data_channel(&self, channel: NativeRef);

    fn data_channel_send(&self, channel: NativeRef, msg: &str);
    fn data_channel_send_binary(&self, channel: NativeRef, msg: &[u8]);

    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes for the duration of the
    /// call. The engine copies the data before returning.
    unsafe fn data_channel_send_ptr(&self, channel: NativeRef, ptr: *const u8, len: usize);
}
