//! data-channels-loopback connects two peer connections through the in-memory
//! loopback engine and echoes messages over a data channel.
//!
//! This example demonstrates:
//! - Creating a data channel and receiving the remote side via on_data_channel
//! - Driving the ready state and observing on_open/on_close
//! - Sending text and binary messages only while the channel is open
//! - Releasing everything through close and drop

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use crossbeam_channel::unbounded;
use log::{info, warn};
use rtc::datachannel::data_channel::RTCDataChannel;
use rtc::datachannel::data_channel::init::RTCDataChannelInit;
use rtc::datachannel::dispatch::{self, DispatcherConfig};
use rtc::datachannel::native::loopback::LoopbackContext;
use rtc::datachannel::state::RTCDataChannelState;
use rtc::peer_connection::RTCPeerConnection;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "Data Channels Loopback")]
#[command(author = "Rain Liu <yliu@webrtc.rs>")]
#[command(version = "0.1.0")]
#[command(about = "An example of data channels over the loopback engine", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(long, default_value_t = format!("data"))]
    label: String,
    #[arg(long, default_value_t = 5)]
    messages: usize,
    #[arg(long)]
    queue_capacity: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    dispatch::init(DispatcherConfig {
        queue_capacity: cli.queue_capacity,
        ..Default::default()
    })?;

    let ctx = Arc::new(LoopbackContext::new());
    let offerer = RTCPeerConnection::new(ctx.clone())?;
    let answerer = RTCPeerConnection::new(ctx.clone())?;
    ctx.link(offerer.native_ref(), answerer.native_ref());

    let (remote_tx, remote_rx) = unbounded();
    answerer.on_data_channel(Box::new(move |dc: RTCDataChannel| {
        let label = dc.label().unwrap_or_default();
        info!("New DataChannel {label} {}", dc.native_ref());

        dc.on_open(Box::new(move || {
            info!("Data channel '{label}' open on the answering side");
        }));
        let echo = dc.clone();
        dc.on_message(Box::new(move |msg: Bytes| {
            info!("Answerer received {} bytes, echoing", msg.len());
            if let Err(err) = echo.send(msg) {
                warn!("echo failed: {err}");
            }
        }));

        let _ = remote_tx.send(dc);
    }));

    let dc = offerer.create_data_channel(
        &cli.label,
        Some(RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        }),
    )?;

    let (echo_tx, echo_rx) = unbounded();
    dc.on_message(Box::new(move |msg: Bytes| {
        let _ = echo_tx.send(msg);
    }));
    let (closed_tx, closed_rx) = unbounded();
    dc.on_close(Box::new(move || {
        let _ = closed_tx.send(());
    }));

    let remote = remote_rx.recv_timeout(DEFAULT_TIMEOUT_DURATION)?;

    if let Err(err) = dc.send_text("before open") {
        info!("send before open rejected: {err}");
    }

    ctx.set_ready_state(dc.native_ref(), RTCDataChannelState::Open);
    ctx.set_ready_state(remote.native_ref(), RTCDataChannelState::Open);
    info!("ready state: {}", dc.ready_state()?);

    for i in 0..cli.messages {
        let message = format!("message {i}");
        info!("Sending '{message}'");
        dc.send_text(&message)?;

        let echoed = echo_rx.recv_timeout(DEFAULT_TIMEOUT_DURATION)?;
        info!("Echo: '{}'", String::from_utf8_lossy(&echoed));
    }
    dc.send(Bytes::from_static(&[0x00, 0x01, 0x02]))?;
    let echoed = echo_rx.recv_timeout(DEFAULT_TIMEOUT_DURATION)?;
    info!("Echo: {echoed:?}");

    dc.close()?;
    closed_rx.recv_timeout(DEFAULT_TIMEOUT_DURATION)?;
    info!("ready state: {}", dc.ready_state()?);

    offerer.close()?;
    answerer.close()?;
    dispatch::flush();
    info!(
        "disposed: local={} remote={}",
        dc.is_disposed(),
        remote.is_disposed()
    );

    Ok(())
}
