use super::*;
use crate::data_channel::init::RTCDataChannelInit;
use crate::data_channel::rtc_error::RTCErrorType;
use crate::dispatch;
use crate::native::loopback::{LoopbackContext, SentMessage};
use crossbeam_channel::unbounded;
use shared::error::ErrorKind;
use std::io::Write;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_log() {
    let _ = env_logger::Builder::new()
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
        .filter(None, log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

fn create_native(ctx: &LoopbackContext, init: &RTCDataChannelInit) -> NativeRef {
    let pc = ctx.create_peer_connection().expect("peer connection");
    ctx.create_data_channel(pc, "chat", &init.into()).expect("data channel")
}

fn new_channel() -> Result<(Arc<LoopbackContext>, NativeRef, RTCDataChannel)> {
    init_log();
    let ctx = Arc::new(LoopbackContext::new());
    let native = create_native(&ctx, &RTCDataChannelInit::default());
    let dc = RTCDataChannel::new(native, ctx.clone())?;
    Ok((ctx, native, dc))
}

#[test]
fn test_data_channel_new_registers_callbacks() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;

    assert_eq!(dc.native_ref(), native);
    assert!(!dc.is_disposed());
    assert!(DATA_CHANNELS.contains(native));
    assert_eq!(ctx.registered_callbacks(native), 4);

    Ok(())
}

#[test]
fn test_data_channel_from_null_pointer() {
    let ctx = Arc::new(LoopbackContext::new());
    let err = RTCDataChannel::from_raw(std::ptr::null_mut(), ctx).unwrap_err();
    assert_eq!(err, Error::ErrNullNativeHandle);
    assert_eq!(err.kind(), ErrorKind::Construction);
}

#[test]
fn test_data_channel_rejects_second_live_handle() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;

    let err = RTCDataChannel::new(native, ctx.clone()).unwrap_err();
    assert_eq!(err, Error::ErrNativeHandleInUse);
    assert_eq!(err.kind(), ErrorKind::Construction);

    // the rejected handle must not have torn down the native channel
    assert_eq!(ctx.close_count(native), 0);
    assert!(!ctx.is_deleted(native));
    assert!(!dc.is_disposed());
    assert_eq!(dc.label()?, "chat");

    Ok(())
}

#[test]
fn test_data_channel_find_or_create_returns_live_handle() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;

    let found = RTCDataChannel::find_or_create(native, ctx.clone())?;
    assert!(Arc::ptr_eq(&found.inner, &dc.inner));

    found.dispose();
    assert!(dc.is_disposed());

    Ok(())
}

#[test]
fn test_data_channel_queries_forward_to_engine() -> Result<()> {
    init_log();
    let ctx = Arc::new(LoopbackContext::new());
    let native = create_native(
        &ctx,
        &RTCDataChannelInit {
            ordered: Some(false),
            max_retransmits: Some(3),
            protocol: Some("proto".to_owned()),
            negotiated: Some(true),
            id: Some(5),
            ..Default::default()
        },
    );
    let dc = RTCDataChannel::new(native, ctx.clone())?;

    assert_eq!(dc.id()?, 5);
    assert_eq!(dc.label()?, "chat");
    assert_eq!(dc.protocol()?, "proto");
    assert_eq!(dc.max_retransmits()?, 3);
    assert_eq!(dc.max_retransmit_time()?, u16::MAX);
    assert!(!dc.ordered()?);
    assert!(dc.negotiated()?);
    assert_eq!(dc.ready_state()?, RTCDataChannelState::Connecting);
    assert_eq!(dc.buffered_amount()?, 0);

    // nothing is cached on the wrapper side
    ctx.set_buffered_amount(native, 42);
    assert_eq!(dc.buffered_amount()?, 42);
    ctx.set_ready_state(native, RTCDataChannelState::Open);
    assert_eq!(dc.ready_state()?, RTCDataChannelState::Open);

    Ok(())
}

#[test]
fn test_data_channel_packet_life_time_is_retransmit_time() -> Result<()> {
    let ctx = Arc::new(LoopbackContext::new());
    let native = create_native(
        &ctx,
        &RTCDataChannelInit {
            max_packet_life_time: Some(500),
            ..Default::default()
        },
    );
    let dc = RTCDataChannel::new(native, ctx.clone())?;

    assert_eq!(dc.max_retransmit_time()?, 500);
    assert_eq!(dc.max_retransmits()?, u16::MAX);
    assert!(dc.ordered()?);

    Ok(())
}

#[test]
fn test_data_channel_use_after_dispose() -> Result<()> {
    let (_ctx, _native, dc) = new_channel()?;
    dc.dispose();

    assert!(dc.is_disposed());
    assert_eq!(dc.id(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.label(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.protocol(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.max_retransmits(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.max_retransmit_time(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.ordered(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.buffered_amount(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.negotiated(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.ready_state(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.close(), Err(Error::ErrDataChannelDisposed));
    assert_eq!(dc.send_text("x"), Err(Error::ErrDataChannelDisposed));
    assert_eq!(
        Error::ErrDataChannelDisposed.kind(),
        ErrorKind::UseAfterDispose
    );

    Ok(())
}

#[test]
fn test_data_channel_dispose_is_idempotent() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;

    dc.dispose();
    assert_eq!(ctx.close_count(native), 1);
    assert!(ctx.is_deleted(native));
    assert!(!DATA_CHANNELS.contains(native));

    dc.dispose();
    dc.clone().dispose();
    assert_eq!(ctx.close_count(native), 1);

    Ok(())
}

#[test]
fn test_data_channel_drop_releases_native_once() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let dc2 = dc.clone();

    drop(dc);
    assert!(!ctx.is_deleted(native), "a clone is still alive");

    drop(dc2);
    assert!(ctx.is_deleted(native));
    assert_eq!(ctx.close_count(native), 1);
    assert!(!DATA_CHANNELS.contains(native));

    Ok(())
}

#[test]
fn test_data_channel_dispose_after_shutdown() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;

    ctx.shutdown();
    dc.dispose();

    assert_eq!(ctx.close_count(native), 0);
    assert!(!ctx.is_deleted(native));
    assert!(!DATA_CHANNELS.contains(native));

    Ok(())
}

#[test]
fn test_data_channel_send_requires_open() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;

    for state in [
        RTCDataChannelState::Connecting,
        RTCDataChannelState::Closing,
        RTCDataChannelState::Closed,
    ] {
        ctx.set_ready_state(native, state);
        assert_eq!(dc.send_text("x"), Err(Error::ErrDataChannelNotOpen));
        assert_eq!(
            dc.send(Bytes::from_static(b"x")),
            Err(Error::ErrDataChannelNotOpen)
        );
        assert_eq!(dc.send_slice(b"x"), Err(Error::ErrDataChannelNotOpen));
        assert_eq!(
            unsafe { dc.send_ptr(b"x".as_ptr(), 1) },
            Err(Error::ErrDataChannelNotOpen)
        );
        // the state check comes before the empty raw send shortcut
        assert_eq!(
            unsafe { dc.send_ptr(std::ptr::null(), 0) },
            Err(Error::ErrDataChannelNotOpen)
        );
    }

    assert!(ctx.sent_messages(native).is_empty());
    assert_eq!(
        Error::ErrDataChannelNotOpen.to_string(),
        "DataChannel is not open"
    );
    assert_eq!(Error::ErrDataChannelNotOpen.kind(), ErrorKind::InvalidState);

    Ok(())
}

#[test]
fn test_data_channel_send_when_open() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    ctx.set_ready_state(native, RTCDataChannelState::Open);

    dc.send_text("hello")?;
    dc.send(Bytes::from_static(&[1, 2]))?;
    dc.send_slice(&[])?;
    dc.send_slice(b"abc")?;
    unsafe {
        dc.send_ptr(std::ptr::null(), 4)?;
        dc.send_ptr(b"xyz".as_ptr(), 0)?;
        dc.send_ptr(b"xyz".as_ptr(), 3)?;
    }

    assert_eq!(
        ctx.sent_messages(native),
        vec![
            SentMessage::Text("hello".to_owned()),
            SentMessage::Binary(Bytes::from_static(&[1, 2])),
            SentMessage::Binary(Bytes::new()),
            SentMessage::Binary(Bytes::from_static(b"abc")),
            SentMessage::Binary(Bytes::from_static(b"xyz")),
        ]
    );

    Ok(())
}

#[test]
fn test_data_channel_on_message_runs_on_dispatch_thread() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    dc.on_message(Box::new(move |msg: Bytes| {
        let _ = tx.send((msg, dispatch::is_dispatch_thread()));
    }));
    ctx.deliver_message(native, b"ping");

    let (msg, on_dispatch_thread) = rx.recv_timeout(TIMEOUT).expect("message delivered");
    assert_eq!(&msg[..], b"ping");
    assert!(on_dispatch_thread);

    Ok(())
}

#[test]
fn test_data_channel_message_trampoline_delivers_once() -> Result<()> {
    let (_ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    dc.on_message(Box::new(move |msg: Bytes| {
        let _ = tx.send((msg, dispatch::is_dispatch_thread()));
    }));

    let raw = [0x01u8, 0x02];
    unsafe {
        trampoline::data_channel_native_on_message(native.as_ptr(), raw.as_ptr(), raw.len() as i32)
    };
    dispatch::flush();

    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![(Bytes::from_static(&[1, 2]), true)]
    );

    Ok(())
}

#[test]
fn test_data_channel_listener_last_write_wins() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    let first = tx.clone();
    dc.on_message(Box::new(move |_: Bytes| {
        let _ = first.send("first");
    }));
    dc.on_message(Box::new(move |_: Bytes| {
        let _ = tx.send("second");
    }));

    ctx.deliver_message(native, b"x");
    dispatch::flush();

    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["second"]);

    Ok(())
}

#[test]
fn test_data_channel_unset_listener_drops_notification() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    dc.on_open(Box::new(move || {
        let _ = tx.send(());
    }));
    ctx.deliver_message(native, b"nobody listens");
    ctx.raise_error(native, RTCErrorType::NetworkError, "nobody listens");
    dispatch::flush();

    assert!(rx.try_recv().is_err());
    assert!(!dc.is_disposed());

    Ok(())
}

#[test]
fn test_data_channel_on_open_and_on_close() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    let open_tx = tx.clone();
    dc.on_open(Box::new(move || {
        let _ = open_tx.send("open");
    }));
    dc.on_close(Box::new(move || {
        let _ = tx.send("close");
    }));

    ctx.set_ready_state(native, RTCDataChannelState::Open);
    assert_eq!(rx.recv_timeout(TIMEOUT), Ok("open"));

    dc.close()?;
    assert_eq!(rx.recv_timeout(TIMEOUT), Ok("close"));
    assert_eq!(dc.ready_state()?, RTCDataChannelState::Closed);
    assert_eq!(ctx.close_count(native), 1);

    Ok(())
}

#[test]
fn test_data_channel_on_error_decodes_message() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    dc.on_error(Box::new(move |err: RTCError| {
        let _ = tx.send(err);
    }));

    ctx.raise_error(native, RTCErrorType::NetworkError, "sctp failure");
    let err = rx.recv_timeout(TIMEOUT).expect("error delivered");
    assert_eq!(err.error_type, RTCErrorType::NetworkError);
    assert_eq!(err.message, "sctp failure");

    let raw = b"bad \xff byte";
    unsafe {
        trampoline::data_channel_native_on_error(native.as_ptr(), 99, raw.as_ptr(), raw.len() as i32)
    };
    let err = rx.recv_timeout(TIMEOUT).expect("error delivered");
    assert_eq!(err.error_type, RTCErrorType::None);
    assert_eq!(err.message, "bad \u{FFFD} byte");

    Ok(())
}

#[test]
fn test_data_channel_messages_keep_order() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    dc.on_message(Box::new(move |msg: Bytes| {
        let _ = tx.send(msg);
    }));
    for i in 0..50 {
        ctx.deliver_message(native, i.to_string().as_bytes());
    }

    let mut received = vec![];
    for _ in 0..50 {
        received.push(rx.recv_timeout(TIMEOUT).expect("message delivered"));
    }
    let expected: Vec<Bytes> = (0..50).map(|i: i32| Bytes::from(i.to_string())).collect();
    assert_eq!(received, expected);

    Ok(())
}

#[test]
fn test_data_channel_panicking_listener_does_not_stop_dispatch() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    dc.on_message(Box::new(move |msg: Bytes| {
        if &msg[..] == b"boom" {
            panic!("listener failure");
        }
        let _ = tx.send(msg);
    }));
    ctx.deliver_message(native, b"boom");
    ctx.deliver_message(native, b"after");

    let msg = rx.recv_timeout(TIMEOUT).expect("dispatch survived");
    assert_eq!(&msg[..], b"after");

    Ok(())
}

#[test]
fn test_data_channel_notification_after_dispose_is_dropped() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();
    dc.on_message(Box::new(move |msg: Bytes| {
        let _ = tx.send(msg);
    }));
    let (close_tx, close_rx) = unbounded();
    dc.on_close(Box::new(move || {
        let _ = close_tx.send(());
    }));

    // hold the dispatch thread so the notification is still queued when the
    // handle goes away
    let (started_tx, started_rx) = unbounded();
    let (gate_tx, gate_rx) = unbounded::<()>();
    dispatch::sync(native, move || {
        let _ = started_tx.send(());
        let _ = gate_rx.recv();
    });
    started_rx.recv_timeout(TIMEOUT).expect("dispatch thread held");

    ctx.deliver_message(native, b"late");
    dc.dispose();
    drop(gate_tx);
    dispatch::flush();

    assert!(rx.try_recv().is_err());

    // the engine may still raise for a reference nobody owns any more
    unsafe { trampoline::data_channel_native_on_open(native.as_ptr()) };
    unsafe { trampoline::data_channel_native_on_close(native.as_ptr()) };
    unsafe { trampoline::data_channel_native_on_open(std::ptr::null_mut()) };
    dispatch::flush();

    assert!(close_rx.try_recv().is_err());

    Ok(())
}

#[test]
fn test_data_channel_listener_may_dispose() -> Result<()> {
    let (ctx, native, dc) = new_channel()?;
    let (tx, rx) = unbounded();

    let handle = dc.clone();
    dc.on_message(Box::new(move |_: Bytes| {
        handle.dispose();
        let _ = tx.send(handle.is_disposed());
    }));
    ctx.deliver_message(native, b"bye");

    assert_eq!(rx.recv_timeout(TIMEOUT), Ok(true));
    assert!(dc.is_disposed());
    assert!(ctx.is_deleted(native));

    Ok(())
}
