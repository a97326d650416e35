//! In-memory engine that implements [`NativeContext`] without a native
//! library.
//!
//! Two peer connections created by the same `LoopbackContext` can be linked
//! with [`LoopbackContext::link`]. A channel created on one of them is then
//! announced to the other through its `on_data_channel` callback, and
//! everything sent on one side arrives at the other side's `on_message`.
//! Readiness never changes on its own: drive it with
//! [`LoopbackContext::set_ready_state`].

use super::{
    DelegateNativeOnClose, DelegateNativeOnDataChannel, DelegateNativeOnError,
    DelegateNativeOnMessage, DelegateNativeOnOpen, NativeContext, NativeRef,
};
use crate::data_channel::init::RTCDataChannelInitInternal;
use crate::data_channel::rtc_error::RTCErrorType;
use crate::state::RTCDataChannelState;
use bytes::Bytes;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

// Shared by every context so that a handle address is never handed out twice
// within the process.
static NEXT_ADDR: AtomicUsize = AtomicUsize::new(0x1000);
const ADDR_STRIDE: usize = 0x10;

fn next_native_ref() -> NativeRef {
    loop {
        let addr = NEXT_ADDR.fetch_add(ADDR_STRIDE, Ordering::Relaxed);
        if let Some(native) = NativeRef::from_addr(addr) {
            return native;
        }
    }
}

/// An outbound message as recorded by the loopback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Text(String),
    Binary(Bytes),
}

impl SentMessage {
    fn payload(&self) -> Bytes {
        match self {
            SentMessage::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            SentMessage::Binary(b) => b.clone(),
        }
    }
}

#[derive(Default)]
struct ChannelCallbacks {
    on_message: Option<DelegateNativeOnMessage>,
    on_open: Option<DelegateNativeOnOpen>,
    on_close: Option<DelegateNativeOnClose>,
    on_error: Option<DelegateNativeOnError>,
}

impl ChannelCallbacks {
    fn count(&self) -> usize {
        [
            self.on_message.is_some(),
            self.on_open.is_some(),
            self.on_close.is_some(),
            self.on_error.is_some(),
        ]
        .into_iter()
        .filter(|registered| *registered)
        .count()
    }
}

struct LoopbackChannel {
    peer_connection: NativeRef,
    label: String,
    protocol: String,
    id: i32,
    ordered: bool,
    max_retransmits: u16,
    max_retransmit_time: u16,
    negotiated: bool,
    ready_state: RTCDataChannelState,
    buffered_amount: u64,
    remote: Option<NativeRef>,
    sent: Vec<SentMessage>,
    close_count: usize,
    deleted: bool,
    callbacks: ChannelCallbacks,
}

impl LoopbackChannel {
    fn twin(&self, peer_connection: NativeRef, local: NativeRef) -> Self {
        LoopbackChannel {
            peer_connection,
            label: self.label.clone(),
            protocol: self.protocol.clone(),
            id: self.id,
            ordered: self.ordered,
            max_retransmits: self.max_retransmits,
            max_retransmit_time: self.max_retransmit_time,
            negotiated: self.negotiated,
            ready_state: RTCDataChannelState::Connecting,
            buffered_amount: 0,
            remote: Some(local),
            sent: vec![],
            close_count: 0,
            deleted: false,
            callbacks: ChannelCallbacks::default(),
        }
    }
}

#[derive(Default)]
struct LoopbackPeerConnection {
    on_data_channel: Option<DelegateNativeOnDataChannel>,
    remote: Option<NativeRef>,
    next_stream_id: u16,
    closed: bool,
    deleted: bool,
}

#[derive(Default)]
struct Engine {
    peer_connections: HashMap<NativeRef, LoopbackPeerConnection>,
    channels: HashMap<NativeRef, LoopbackChannel>,
}

impl Engine {
    fn channel(&self, channel: NativeRef) -> Option<&LoopbackChannel> {
        self.channels.get(&channel).filter(|c| !c.deleted)
    }

    fn channel_mut(&mut self, channel: NativeRef) -> Option<&mut LoopbackChannel> {
        self.channels.get_mut(&channel).filter(|c| !c.deleted)
    }

    fn transition(
        &mut self,
        channel: NativeRef,
        state: RTCDataChannelState,
        pending: &mut Vec<Notification>,
    ) {
        let Some(c) = self.channel_mut(channel) else {
            return;
        };
        if c.ready_state == state {
            return;
        }
        trace!("loopback channel {channel}: {} -> {state}", c.ready_state);
        c.ready_state = state;
        match state {
            RTCDataChannelState::Open => {
                if let Some(cb) = c.callbacks.on_open {
                    pending.push(Notification::Open(cb, channel));
                }
            }
            RTCDataChannelState::Closed => {
                if let Some(cb) = c.callbacks.on_close {
                    pending.push(Notification::Close(cb, channel));
                }
            }
            _ => {}
        }
    }

    fn record_send(&mut self, channel: NativeRef, msg: SentMessage) -> Option<Notification> {
        let c = self.channel_mut(channel)?;
        let payload = msg.payload();
        c.sent.push(msg);
        let remote = c.remote?;
        let cb = self.channel(remote)?.callbacks.on_message?;
        Some(Notification::Message(cb, remote, payload))
    }
}

/// A native callback captured under the engine lock and raised after it is
/// released.
enum Notification {
    Open(DelegateNativeOnOpen, NativeRef),
    Close(DelegateNativeOnClose, NativeRef),
    Message(DelegateNativeOnMessage, NativeRef, Bytes),
    Error(DelegateNativeOnError, NativeRef, RTCErrorType, String),
    DataChannel(DelegateNativeOnDataChannel, NativeRef, NativeRef),
}

fn clamp_len(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

impl Notification {
    fn raise(self) {
        // SAFETY: the callbacks were registered through NativeContext and the
        // payload buffers outlive the call.
        unsafe {
            match self {
                Notification::Open(cb, channel) => cb(channel.as_ptr()),
                Notification::Close(cb, channel) => cb(channel.as_ptr()),
                Notification::Message(cb, channel, data) => {
                    cb(channel.as_ptr(), data.as_ptr(), clamp_len(data.len()))
                }
                Notification::Error(cb, channel, error_type, message) => cb(
                    channel.as_ptr(),
                    error_type.into(),
                    message.as_ptr(),
                    clamp_len(message.len()),
                ),
                Notification::DataChannel(cb, peer_connection, channel) => {
                    cb(peer_connection.as_ptr(), channel.as_ptr())
                }
            }
        }
    }
}

fn raise_all(pending: Vec<Notification>) {
    for n in pending {
        n.raise();
    }
}

/// LoopbackContext is an in-process [`NativeContext`].
pub struct LoopbackContext {
    live: AtomicBool,
    engine: Mutex<Engine>,
}

impl Default for LoopbackContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackContext {
    pub fn new() -> Self {
        LoopbackContext {
            live: AtomicBool::new(true),
            engine: Mutex::new(Engine::default()),
        }
    }

    /// Links two peer connections so that channels created on one are
    /// announced to, and carry messages to, the other.
    pub fn link(&self, a: NativeRef, b: NativeRef) {
        let mut engine = self.engine.lock();
        if let Some(pc) = engine.peer_connections.get_mut(&a) {
            pc.remote = Some(b);
        }
        if let Some(pc) = engine.peer_connections.get_mut(&b) {
            pc.remote = Some(a);
        }
    }

    /// Moves a channel to `state`, raising `on_open` on entry to `Open` and
    /// `on_close` on entry to `Closed`.
    pub fn set_ready_state(&self, channel: NativeRef, state: RTCDataChannelState) {
        let mut pending = vec![];
        self.engine.lock().transition(channel, state, &mut pending);
        raise_all(pending);
    }

    pub fn set_buffered_amount(&self, channel: NativeRef, amount: u64) {
        if let Some(c) = self.engine.lock().channel_mut(channel) {
            c.buffered_amount = amount;
        }
    }

    /// Raises `on_message` on `channel` as if `data` had arrived from the
    /// network.
    pub fn deliver_message(&self, channel: NativeRef, data: &[u8]) {
        let cb = self
            .engine
            .lock()
            .channel(channel)
            .and_then(|c| c.callbacks.on_message);
        if let Some(cb) = cb {
            Notification::Message(cb, channel, Bytes::copy_from_slice(data)).raise();
        }
    }

    /// Raises `on_error` on `channel`.
    pub fn raise_error(&self, channel: NativeRef, error_type: RTCErrorType, message: &str) {
        let cb = self
            .engine
            .lock()
            .channel(channel)
            .and_then(|c| c.callbacks.on_error);
        if let Some(cb) = cb {
            Notification::Error(cb, channel, error_type, message.to_owned()).raise();
        }
    }

    pub fn sent_messages(&self, channel: NativeRef) -> Vec<SentMessage> {
        self.engine
            .lock()
            .channels
            .get(&channel)
            .map(|c| c.sent.clone())
            .unwrap_or_default()
    }

    /// Number of close requests received for `channel`, including redundant
    /// ones.
    pub fn close_count(&self, channel: NativeRef) -> usize {
        self.engine
            .lock()
            .channels
            .get(&channel)
            .map_or(0, |c| c.close_count)
    }

    pub fn is_deleted(&self, channel: NativeRef) -> bool {
        self.engine
            .lock()
            .channels
            .get(&channel)
            .is_some_and(|c| c.deleted)
    }

    pub fn is_peer_connection_deleted(&self, peer_connection: NativeRef) -> bool {
        self.engine
            .lock()
            .peer_connections
            .get(&peer_connection)
            .is_some_and(|pc| pc.deleted)
    }

    /// Number of the four channel callbacks currently registered.
    pub fn registered_callbacks(&self, channel: NativeRef) -> usize {
        self.engine
            .lock()
            .channel(channel)
            .map_or(0, |c| c.callbacks.count())
    }

    /// The twin of `channel` on the linked peer connection, if any.
    pub fn remote_channel(&self, channel: NativeRef) -> Option<NativeRef> {
        self.engine.lock().channel(channel).and_then(|c| c.remote)
    }

    /// Stops the engine. `is_live` returns false from now on.
    pub fn shutdown(&self) {
        debug!("loopback engine shut down");
        self.live.store(false, Ordering::SeqCst);
    }
}

impl NativeContext for LoopbackContext {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn create_peer_connection(&self) -> Option<NativeRef> {
        if !self.is_live() {
            return None;
        }
        let native = next_native_ref();
        self.engine
            .lock()
            .peer_connections
            .insert(native, LoopbackPeerConnection::default());
        debug!("loopback peer connection {native} created");
        Some(native)
    }

    fn close_peer_connection(&self, peer_connection: NativeRef) {
        let mut pending = vec![];
        {
            let mut engine = self.engine.lock();
            let Some(pc) = engine.peer_connections.get_mut(&peer_connection) else {
                return;
            };
            if pc.closed {
                return;
            }
            pc.closed = true;
            let owned: Vec<NativeRef> = engine
                .channels
                .iter()
                .filter(|(_, c)| c.peer_connection == peer_connection && !c.deleted)
                .map(|(native, _)| *native)
                .collect();
            for channel in owned {
                engine.transition(channel, RTCDataChannelState::Closed, &mut pending);
            }
        }
        raise_all(pending);
    }

    fn delete_peer_connection(&self, peer_connection: NativeRef) {
        let mut engine = self.engine.lock();
        if let Some(pc) = engine.peer_connections.get_mut(&peer_connection) {
            pc.deleted = true;
            pc.on_data_channel = None;
        }
    }

    fn create_data_channel(
        &self,
        peer_connection: NativeRef,
        label: &str,
        init: &RTCDataChannelInitInternal,
    ) -> Option<NativeRef> {
        let mut pending = vec![];
        let native = {
            let mut engine = self.engine.lock();
            let pc = engine
                .peer_connections
                .get_mut(&peer_connection)
                .filter(|pc| !pc.closed && !pc.deleted)?;

            let id = match init.id {
                Some(id) => id,
                None => {
                    let id = pc.next_stream_id;
                    pc.next_stream_id = pc.next_stream_id.wrapping_add(1);
                    id
                }
            };
            let remote_pc = pc.remote;

            let native = next_native_ref();
            let mut channel = LoopbackChannel {
                peer_connection,
                label: label.to_owned(),
                protocol: init.protocol.clone().unwrap_or_default(),
                id: i32::from(id),
                ordered: init.ordered.unwrap_or(true),
                max_retransmits: init.max_retransmits.unwrap_or(u16::MAX),
                max_retransmit_time: init.max_retransmit_time.unwrap_or(u16::MAX),
                negotiated: init.negotiated.unwrap_or(false),
                ready_state: RTCDataChannelState::Connecting,
                buffered_amount: 0,
                remote: None,
                sent: vec![],
                close_count: 0,
                deleted: false,
                callbacks: ChannelCallbacks::default(),
            };

            // Negotiated channels are created by both sides explicitly.
            if let Some(remote_pc) = remote_pc.filter(|_| !channel.negotiated) {
                if let Some(announce) = engine
                    .peer_connections
                    .get(&remote_pc)
                    .filter(|pc| !pc.closed && !pc.deleted)
                    .map(|pc| pc.on_data_channel)
                {
                    let twin_ref = next_native_ref();
                    engine
                        .channels
                        .insert(twin_ref, channel.twin(remote_pc, native));
                    channel.remote = Some(twin_ref);
                    if let Some(cb) = announce {
                        pending.push(Notification::DataChannel(cb, remote_pc, twin_ref));
                    }
                }
            }

            engine.channels.insert(native, channel);
            native
        };
        debug!("loopback data channel {native} ({label}) created on {peer_connection}");
        raise_all(pending);
        Some(native)
    }

    fn register_on_data_channel(
        &self,
        peer_connection: NativeRef,
        callback: DelegateNativeOnDataChannel,
    ) {
        if let Some(pc) = self.engine.lock().peer_connections.get_mut(&peer_connection) {
            pc.on_data_channel = Some(callback);
        }
    }

    fn register_on_message(&self, channel: NativeRef, callback: DelegateNativeOnMessage) {
        if let Some(c) = self.engine.lock().channel_mut(channel) {
            c.callbacks.on_message = Some(callback);
        }
    }

    fn register_on_open(&self, channel: NativeRef, callback: DelegateNativeOnOpen) {
        if let Some(c) = self.engine.lock().channel_mut(channel) {
            c.callbacks.on_open = Some(callback);
        }
    }

    fn register_on_close(&self, channel: NativeRef, callback: DelegateNativeOnClose) {
        if let Some(c) = self.engine.lock().channel_mut(channel) {
            c.callbacks.on_close = Some(callback);
        }
    }

    fn register_on_error(&self, channel: NativeRef, callback: DelegateNativeOnError) {
        if let Some(c) = self.engine.lock().channel_mut(channel) {
            c.callbacks.on_error = Some(callback);
        }
    }

    fn data_channel_id(&self, channel: NativeRef) -> i32 {
        self.engine.lock().channel(channel).map_or(-1, |c| c.id)
    }

    fn data_channel_label(&self, channel: NativeRef) -> String {
        self.engine
            .lock()
            .channel(channel)
            .map(|c| c.label.clone())
            .unwrap_or_default()
    }

    fn data_channel_protocol(&self, channel: NativeRef) -> String {
        self.engine
            .lock()
            .channel(channel)
            .map(|c| c.protocol.clone())
            .unwrap_or_default()
    }

    fn data_channel_max_retransmits(&self, channel: NativeRef) -> u16 {
        self.engine
            .lock()
            .channel(channel)
            .map_or(u16::MAX, |c| c.max_retransmits)
    }

    fn data_channel_max_retransmit_time(&self, channel: NativeRef) -> u16 {
        self.engine
            .lock()
            .channel(channel)
            .map_or(u16::MAX, |c| c.max_retransmit_time)
    }

    fn data_channel_ordered(&self, channel: NativeRef) -> bool {
        self.engine.lock().channel(channel).is_some_and(|c| c.ordered)
    }

    fn data_channel_buffered_amount(&self, channel: NativeRef) -> u64 {
        self.engine
            .lock()
            .channel(channel)
            .map_or(0, |c| c.buffered_amount)
    }

    fn data_channel_negotiated(&self, channel: NativeRef) -> bool {
        self.engine
            .lock()
            .channel(channel)
            .is_some_and(|c| c.negotiated)
    }

    fn data_channel_ready_state(&self, channel: NativeRef) -> RTCDataChannelState {
        self.engine
            .lock()
            .channel(channel)
            .map_or(RTCDataChannelState::Closed, |c| c.ready_state)
    }

    fn data_channel_close(&self, channel: NativeRef) {
        let mut pending = vec![];
        {
            let mut engine = self.engine.lock();
            let Some(c) = engine.channel_mut(channel) else {
                return;
            };
            c.close_count += 1;
            if c.ready_state == RTCDataChannelState::Closed {
                return;
            }
            let remote = c.remote;
            engine.transition(channel, RTCDataChannelState::Closing, &mut pending);
            engine.transition(channel, RTCDataChannelState::Closed, &mut pending);
            if let Some(remote) = remote {
                engine.transition(remote, RTCDataChannelState::Closed, &mut pending);
            }
        }
        raise_all(pending);
    }

    fn delete_data_channel(&self, channel: NativeRef) {
        let mut engine = self.engine.lock();
        let remote = match engine.channel_mut(channel) {
            Some(c) => {
                c.deleted = true;
                c.callbacks = ChannelCallbacks::default();
                c.remote.take()
            }
            None => return,
        };
        if let Some(remote) = remote.and_then(|r| engine.channels.get_mut(&r)) {
            remote.remote = None;
        }
        trace!("loopback data channel {channel} deleted");
    }

    fn data_channel_send(&self, channel: NativeRef, msg: &str) {
        trace!("loopback data channel {channel}: send text ({} bytes)", msg.len());
        let delivery = self
            .engine
            .lock()
            .record_send(channel, SentMessage::Text(msg.to_owned()));
        if let Some(n) = delivery {
            n.raise();
        }
    }

    fn data_channel_send_binary(&self, channel: NativeRef, msg: &[u8]) {
        trace!("loopback data channel {channel}: send binary ({} bytes)", msg.len());
        let delivery = self
            .engine
            .lock()
            .record_send(channel, SentMessage::Binary(Bytes::copy_from_slice(msg)));
        if let Some(n) = delivery {
            n.raise();
        }
    }

    unsafe fn data_channel_send_ptr(&self, channel: NativeRef, ptr: *const u8, len: usize) {
        let data = if ptr.is_null() || len == 0 {
            Bytes::new()
        } else {
            // SAFETY: the caller guarantees `ptr` is valid for `len` bytes.
            Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(ptr, len) })
        };
        trace!("loopback data channel {channel}: send ptr ({len} bytes)");
        let delivery = self
            .engine
            .lock()
            .record_send(channel, SentMessage::Binary(data));
        if let Some(n) = delivery {
            n.raise();
        }
    }
}
