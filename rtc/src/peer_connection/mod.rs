
use arc_swap::ArcSwapOption;
use datachannel::data_channel::RTCDataChannel;
use datachannel::data_channel::init::{MAX_LABEL_LEN, RTCDataChannelInit, RTCDataChannelInitInternal};
use datachannel::dispatch;
use datachannel::native::{NativeContext, NativeRef};
use datachannel::registry::HandleRegistry;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use shared::error::{Error, Result};
use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type OnDataChannelHdlrFn = Box<dyn Fn(RTCDataChannel) + Send + Sync>;

lazy_static! {
    static ref PEER_CONNECTIONS: HandleRegistry<NativeRef, PeerConnectionInner> =
        HandleRegistry::new();
}

struct PeerConnectionInner {
    native: NativeRef,
    context: Arc<dyn NativeContext>,
    closed: AtomicBool,
    on_data_channel_handler: ArcSwapOption<OnDataChannelHdlrFn>,
    // Channels created or surfaced by this peer connection, kept alive until
    // it closes.
    data_channels: Mutex<Vec<RTCDataChannel>>,
}

impl PeerConnectionInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn retain(&self, dc: &RTCDataChannel) {
        let mut data_channels = self.data_channels.lock();
        data_channels.retain(|c| !c.is_disposed());
        if !data_channels
            .iter()
            .any(|c| c.native_ref() == dc.native_ref())
        {
            data_channels.push(dc.clone());
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let data_channels: Vec<RTCDataChannel> = self.data_channels.lock().drain(..).collect();
        for dc in &data_channels {
            dc.dispose();
        }
        if self.context.is_live() {
            self.context.close_peer_connection(self.native);
        }
        self.on_data_channel_handler.store(None);
        debug!("peer connection {} closed", self.native);
    }

    fn deliver_data_channel(&self, channel: NativeRef) {
        if self.is_closed() {
            trace!("peer connection {}: data channel {channel} after close", self.native);
            return;
        }
        match RTCDataChannel::find_or_create(channel, Arc::clone(&self.context)) {
            Ok(dc) => {
                self.retain(&dc);
                if let Some(handler) = &*self.on_data_channel_handler.load() {
                    handler(dc);
                }
            }
            Err(err) => warn!(
                "peer connection {}: failed to wrap data channel {channel}: {err}",
                self.native
            ),
        }
    }
}

impl Drop for PeerConnectionInner {
    fn drop(&mut self) {
        self.close();
        PEER_CONNECTIONS.remove_if(self.native, self);
        if self.context.is_live() {
            self.context.delete_peer_connection(self.native);
        }
    }
}

unsafe extern "C" fn peer_connection_native_on_data_channel(
    peer_connection: *mut c_void,
    channel: *mut c_void,
) {
    let (Some(pc), Some(channel)) = (
        NativeRef::from_raw(peer_connection),
        NativeRef::from_raw(channel),
    ) else {
        return;
    };
    dispatch::sync(pc, move || match PEER_CONNECTIONS.lookup(pc) {
        Some(inner) => inner.deliver_data_channel(channel),
        None => trace!("peer connection {pc}: data channel {channel} dropped, no live handle"),
    });
}

/// RTCPeerConnection owns a native peer connection and creates the data
/// channels that run over it.
///
/// Clones share the same native peer connection. It is closed by
/// [`close`](RTCPeerConnection::close) and released when the last clone is
/// dropped.
#[derive(Clone)]
pub struct RTCPeerConnection {
    inner: Arc<PeerConnectionInner>,
}

impl fmt::Debug for RTCPeerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTCPeerConnection")
            .field("native", &self.inner.native)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl RTCPeerConnection {
    /// Creates a native peer connection on `context`.
    pub fn new(context: Arc<dyn NativeContext>) -> Result<Self> {
        let native = context
            .create_peer_connection()
            .ok_or(Error::ErrNullNativeHandle)?;

        let inner = Arc::new(PeerConnectionInner {
            native,
            context,
            closed: AtomicBool::new(false),
            on_data_channel_handler: ArcSwapOption::empty(),
            data_channels: Mutex::new(vec![]),
        });
        PEER_CONNECTIONS.insert(native, &inner)?;
        inner
            .context
            .register_on_data_channel(native, peer_connection_native_on_data_channel);

        debug!("peer connection {native} created");
        Ok(RTCPeerConnection { inner })
    }

    pub fn native_ref(&self) -> NativeRef {
        self.inner.native
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// create_data_channel creates a new DataChannel object with the given label
    /// and optional DataChannelInit used to configure properties of the
    /// underlying channel such as data reliability.
    pub fn create_data_channel(
        &self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<RTCDataChannel> {
        if self.inner.is_closed() || !self.inner.context.is_live() {
            return Err(Error::ErrPeerConnectionClosed);
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(Error::ErrInvalidDataChannelInit(format!(
                "label longer than {MAX_LABEL_LEN} bytes"
            )));
        }

        let options = options.unwrap_or_default();
        options.validate()?;
        let init = RTCDataChannelInitInternal::from(&options);

        let native = self
            .inner
            .context
            .create_data_channel(self.inner.native, label, &init)
            .ok_or(Error::ErrNullNativeHandle)?;
        let dc = RTCDataChannel::new(native, Arc::clone(&self.inner.context))?;
        self.inner.retain(&dc);
        Ok(dc)
    }

    /// on_data_channel sets an event handler which is invoked when a data
    /// channel message arrives from a remote peer.
    pub fn on_data_channel(&self, f: OnDataChannelHdlrFn) {
        self.inner.on_data_channel_handler.store(Some(Arc::new(f)));
    }

    /// close ends the peer connection and disposes every data channel it
    /// created or surfaced. Calling it again has no effect.
    pub fn close(&self) -> Result<()> {
        self.inner.close();
        Ok(())
    }
}
