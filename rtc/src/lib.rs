//! # RTC - WebRTC data channels over a native engine
//!
//! This crate is the application-facing entry point. An
//! [`RTCPeerConnection`](peer_connection::RTCPeerConnection) owns one native
//! peer connection, creates data channels on it and surfaces the channels the
//! remote peer opens. The channel handle itself, the dispatch thread and the
//! native boundary live in the re-exported `datachannel` crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rtc::datachannel::data_channel::RTCDataChannel;
//! use rtc::datachannel::native::loopback::LoopbackContext;
//! use rtc::datachannel::state::RTCDataChannelState;
//! use rtc::peer_connection::RTCPeerConnection;
//!
//! # fn example() -> rtc::shared::error::Result<()> {
//! let ctx = Arc::new(LoopbackContext::new());
//! let offerer = RTCPeerConnection::new(ctx.clone())?;
//! let answerer = RTCPeerConnection::new(ctx.clone())?;
//! ctx.link(offerer.native_ref(), answerer.native_ref());
//!
//! answerer.on_data_channel(Box::new(|dc: RTCDataChannel| {
//!     dc.on_message(Box::new(|msg: bytes::Bytes| println!("got {} bytes", msg.len())));
//! }));
//!
//! let dc = offerer.create_data_channel("chat", None)?;
//! ctx.set_ready_state(dc.native_ref(), RTCDataChannelState::Open);
//! dc.send_text("hello")?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub use {datachannel, shared};

pub mod peer_connection;
