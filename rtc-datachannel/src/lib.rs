//! # RTC DataChannel over a native engine
//!
//! This crate wraps data channels that live inside a native WebRTC engine. The
//! engine owns the transport (SCTP over DTLS), drives the ready state and
//! raises notifications from its own threads. The wrapper side provides:
//!
//! - **[`RTCDataChannel`](data_channel::RTCDataChannel)**: a handle over one
//!   native channel, with read-only attribute queries, gated sends and
//!   exactly-once teardown.
//! - **[`dispatch`]**: the single execution context on which every native
//!   notification is delivered to user listeners.
//! - **[`registry`]**: the concurrent map that resolves a native reference
//!   back to its live wrapper when a notification arrives.
//! - **[`native`]**: the [`NativeContext`](native::NativeContext) trait that
//!   an engine binding implements, plus an in-memory
//!   [`LoopbackContext`](native::loopback::LoopbackContext).
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use rtc_datachannel::data_channel::RTCDataChannel;
//! use rtc_datachannel::data_channel::init::RTCDataChannelInit;
//! use rtc_datachannel::dispatch;
//! use rtc_datachannel::native::NativeContext;
//! use rtc_datachannel::native::loopback::LoopbackContext;
//! use rtc_datachannel::state::RTCDataChannelState;
//!
//! # fn example() -> shared::error::Result<()> {
//! let ctx = Arc::new(LoopbackContext::new());
//! let pc = ctx.create_peer_connection().expect("peer connection");
//! let native = ctx
//!     .create_data_channel(pc, "chat", &(&RTCDataChannelInit::default()).into())
//!     .expect("data channel");
//!
//! let dc = RTCDataChannel::new(native, ctx.clone())?;
//! dc.on_message(Box::new(|msg: Bytes| println!("received {} bytes", msg.len())));
//!
//! ctx.set_ready_state(native, RTCDataChannelState::Open);
//! dc.send_text("hello")?;
//!
//! dispatch::flush();
//! dc.dispose();
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod data_channel;
pub mod dispatch;
pub mod native;
pub mod registry;
pub mod state;
