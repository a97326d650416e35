#[cfg(test)]
mod data_channel_test;

pub mod init;
pub(crate) mod payload;
pub mod rtc_error;
pub(crate) mod trampoline;

use crate::native::{NativeContext, NativeRef};
use crate::registry::HandleRegistry;
use crate::state::RTCDataChannelState;
use arc_swap::ArcSwapOption;
use bytes::Bytes;
use log::{debug, trace};
use payload::DataChannelPayload;
use rtc_error::RTCError;
use shared::error::{Error, Result};
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type OnMessageHdlrFn = Box<dyn Fn(Bytes) + Send + Sync>;
pub type OnOpenHdlrFn = Box<dyn Fn() + Send + Sync>;
pub type OnCloseHdlrFn = Box<dyn Fn() + Send + Sync>;
pub type OnErrorHdlrFn = Box<dyn Fn(RTCError) + Send + Sync>;

lazy_static! {
    // Native reference -> live data channel, consulted when the engine raises
    // a notification.
    pub(crate) static ref DATA_CHANNELS: HandleRegistry<NativeRef, DataChannelInner> =
        HandleRegistry::new();
}

pub(crate) struct DataChannelInner {
    native: NativeRef,
    context: Arc<dyn NativeContext>,
    disposed: AtomicBool,

    on_message_handler: ArcSwapOption<OnMessageHdlrFn>,
    on_open_handler: ArcSwapOption<OnOpenHdlrFn>,
    on_close_handler: ArcSwapOption<OnCloseHdlrFn>,
    on_error_handler: ArcSwapOption<OnErrorHdlrFn>,
}

impl DataChannelInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::ErrDataChannelDisposed)
        } else {
            Ok(())
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if self.context.is_live() {
            self.context.data_channel_close(self.native);
            DATA_CHANNELS.remove_if(self.native, self);
            self.context.delete_data_channel(self.native);
        } else {
            DATA_CHANNELS.remove_if(self.native, self);
        }

        self.on_message_handler.store(None);
        self.on_open_handler.store(None);
        self.on_close_handler.store(None);
        self.on_error_handler.store(None);

        debug!("data channel {} disposed", self.native);
    }

    pub(crate) fn deliver_message(&self, msg: Bytes) {
        if let Some(handler) = &*self.on_message_handler.load() {
            trace!("data channel {}: on_message ({} bytes)", self.native, msg.len());
            handler(msg);
        }
    }

    pub(crate) fn deliver_open(&self) {
        if let Some(handler) = &*self.on_open_handler.load() {
            trace!("data channel {}: on_open", self.native);
            handler();
        }
    }

    pub(crate) fn deliver_close(&self) {
        if let Some(handler) = &*self.on_close_handler.load() {
            trace!("data channel {}: on_close", self.native);
            handler();
        }
    }

    pub(crate) fn deliver_error(&self, err: RTCError) {
        if let Some(handler) = &*self.on_error_handler.load() {
            trace!("data channel {}: on_error {err}", self.native);
            handler(err);
        }
    }
}

impl Drop for DataChannelInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// RTCDataChannel represents a WebRTC DataChannel backed by the native engine.
///
/// The handle is cheap to clone; clones share one native channel. The engine
/// is released once, either by [`dispose`](RTCDataChannel::dispose) or when
/// the last clone is dropped. Attribute queries are answered by the engine on
/// every call and fail with [`Error::ErrDataChannelDisposed`] after disposal.
///
/// Listeners run on the dispatch thread (see [`crate::dispatch`]), one at a
/// time, in the order the engine raised the notifications.
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCDataChannel
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannel
#[derive(Clone)]
pub struct RTCDataChannel {
    inner: Arc<DataChannelInner>,
}

impl fmt::Debug for RTCDataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTCDataChannel")
            .field("native", &self.inner.native)
            .field("disposed", &self.inner.is_disposed())
            .finish()
    }
}

impl RTCDataChannel {
    /// Wraps the native channel `native` and subscribes to its notifications.
    ///
    /// Fails with [`Error::ErrNativeHandleInUse`] if another live handle
    /// already wraps `native`.
    pub fn new(native: NativeRef, context: Arc<dyn NativeContext>) -> Result<Self> {
        let inner = Arc::new(DataChannelInner {
            native,
            context,
            disposed: AtomicBool::new(false),
            on_message_handler: ArcSwapOption::empty(),
            on_open_handler: ArcSwapOption::empty(),
            on_close_handler: ArcSwapOption::empty(),
            on_error_handler: ArcSwapOption::empty(),
        });

        if let Err(err) = DATA_CHANNELS.insert(native, &inner) {
            // The native channel belongs to the live handle; dropping this
            // one must not tear it down.
            inner.disposed.store(true, Ordering::Release);
            return Err(err);
        }

        let context = &inner.context;
        context.register_on_message(native, trampoline::data_channel_native_on_message);
        context.register_on_open(native, trampoline::data_channel_native_on_open);
        context.register_on_close(native, trampoline::data_channel_native_on_close);
        context.register_on_error(native, trampoline::data_channel_native_on_error);

        debug!("data channel {native} created");
        Ok(RTCDataChannel { inner })
    }

    /// Like [`new`](RTCDataChannel::new), for a pointer received from the
    /// engine. Fails with [`Error::ErrNullNativeHandle`] if `ptr` is null.
    pub fn from_raw(ptr: *mut c_void, context: Arc<dyn NativeContext>) -> Result<Self> {
        let native = NativeRef::from_raw(ptr).ok_or(Error::ErrNullNativeHandle)?;
        Self::new(native, context)
    }

    /// Returns the live handle for `native` if there is one, otherwise wraps
    /// it.
    pub fn find_or_create(native: NativeRef, context: Arc<dyn NativeContext>) -> Result<Self> {
        match DATA_CHANNELS.lookup(native) {
            Some(inner) if !inner.is_disposed() => Ok(RTCDataChannel { inner }),
            _ => Self::new(native, context),
        }
    }

    pub fn native_ref(&self) -> NativeRef {
        self.inner.native
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn query<R>(&self, f: impl FnOnce(&dyn NativeContext, NativeRef) -> R) -> Result<R> {
        self.inner.ensure_alive()?;
        Ok(f(self.inner.context.as_ref(), self.inner.native))
    }

    /// id represents the ID for this DataChannel, as assigned by the engine.
    pub fn id(&self) -> Result<i32> {
        self.query(|ctx, ch| ctx.data_channel_id(ch))
    }

    /// label represents a label that can be used to distinguish this
    /// DataChannel object from other DataChannel objects.
    pub fn label(&self) -> Result<String> {
        self.query(|ctx, ch| ctx.data_channel_label(ch))
    }

    /// protocol represents the name of the sub-protocol used with this
    /// DataChannel.
    pub fn protocol(&self) -> Result<String> {
        self.query(|ctx, ch| ctx.data_channel_protocol(ch))
    }

    /// max_retransmits represents the maximum number of retransmissions that are
    /// attempted in unreliable mode.
    pub fn max_retransmits(&self) -> Result<u16> {
        self.query(|ctx, ch| ctx.data_channel_max_retransmits(ch))
    }

    /// max_retransmit_time represents the length of the time window (msec)
    /// during which transmissions and retransmissions may occur in unreliable
    /// mode.
    pub fn max_retransmit_time(&self) -> Result<u16> {
        self.query(|ctx, ch| ctx.data_channel_max_retransmit_time(ch))
    }

    /// ordered returns true if the DataChannel is ordered, and false if
    /// out-of-order delivery is allowed.
    pub fn ordered(&self) -> Result<bool> {
        self.query(|ctx, ch| ctx.data_channel_ordered(ch))
    }

    /// buffered_amount represents the number of bytes of application data
    /// queued by the engine and not yet transmitted. Advisory only.
    pub fn buffered_amount(&self) -> Result<u64> {
        self.query(|ctx, ch| ctx.data_channel_buffered_amount(ch))
    }

    /// negotiated represents whether this DataChannel was negotiated by the
    /// application (true), or not (false).
    pub fn negotiated(&self) -> Result<bool> {
        self.query(|ctx, ch| ctx.data_channel_negotiated(ch))
    }

    /// ready_state represents the state of the DataChannel object.
    pub fn ready_state(&self) -> Result<RTCDataChannelState> {
        self.query(|ctx, ch| ctx.data_channel_ready_state(ch))
    }

    /// on_message sets an event handler which is invoked on a message
    /// arrival over the sctp transport from a remote peer.
    pub fn on_message(&self, f: OnMessageHdlrFn) {
        self.inner.on_message_handler.store(Some(Arc::new(f)));
    }

    /// on_open sets an event handler which is invoked when
    /// the underlying data transport has been established (or re-established).
    pub fn on_open(&self, f: OnOpenHdlrFn) {
        self.inner.on_open_handler.store(Some(Arc::new(f)));
    }

    /// on_close sets an event handler which is invoked when
    /// the underlying data transport has been closed.
    pub fn on_close(&self, f: OnCloseHdlrFn) {
        self.inner.on_close_handler.store(Some(Arc::new(f)));
    }

    /// on_error sets an event handler which is invoked when
    /// the engine reports an error on this channel.
    pub fn on_error(&self, f: OnErrorHdlrFn) {
        self.inner.on_error_handler.store(Some(Arc::new(f)));
    }

    fn send_payload(&self, payload: DataChannelPayload<'_>) -> Result<()> {
        let state = self.ready_state()?;
        if !state.can_send() {
            trace!(
                "data channel {}: send of {} bytes rejected in state {state}",
                self.inner.native,
                payload.len()
            );
            return Err(Error::ErrDataChannelNotOpen);
        }
        // SAFETY: raw payloads are only built by `send_ptr`, whose caller
        // guarantees the memory is readable.
        unsafe { payload.forward(self.inner.context.as_ref(), self.inner.native) };
        Ok(())
    }

    /// send_text sends the text message to the DataChannel peer.
    pub fn send_text(&self, msg: &str) -> Result<()> {
        self.send_payload(DataChannelPayload::Text(msg))
    }

    /// send sends the binary message to the DataChannel peer.
    pub fn send(&self, data: Bytes) -> Result<()> {
        self.send_payload(DataChannelPayload::Binary(&data))
    }

    /// send_slice sends a borrowed span to the DataChannel peer. An empty span
    /// is still handed to the engine.
    pub fn send_slice(&self, data: &[u8]) -> Result<()> {
        self.send_payload(DataChannelPayload::Span(data))
    }

    /// send_ptr sends `len` bytes starting at `ptr`. A null pointer or zero
    /// length sends nothing, once the state check has passed.
    ///
    /// # Safety
    ///
    /// Unless null, `ptr` must be valid for reads of `len` bytes for the
    /// duration of the call.
    pub unsafe fn send_ptr(&self, ptr: *const u8, len: usize) -> Result<()> {
        self.send_payload(DataChannelPayload::Raw { ptr, len })
    }

    /// close requests the native close transition. `on_close` fires once
    /// the engine reports the channel closed.
    pub fn close(&self) -> Result<()> {
        self.query(|ctx, ch| ctx.data_channel_close(ch))
    }

    /// dispose releases the native channel. Only the first call has an
    /// effect; later calls, and later queries, see a disposed handle.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}
