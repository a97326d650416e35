//! Entry points handed to the native engine.
//!
//! These run on engine threads. They copy whatever the engine lent them,
//! post to the dispatcher and return. The channel is resolved again on the
//! dispatch thread, so a handle disposed in the meantime simply misses the
//! notification.

use super::{DATA_CHANNELS, DataChannelInner};
use crate::data_channel::rtc_error::RTCError;
use crate::dispatch;
use crate::native::NativeRef;
use bytes::Bytes;
use log::trace;
use std::ffi::c_void;

/// Copies `size` bytes starting at `ptr`.
///
/// # Safety
///
/// `ptr` must be null or valid for reads of `size` bytes.
unsafe fn copy_native_bytes(ptr: *const u8, size: i32) -> Bytes {
    match usize::try_from(size) {
        Ok(len) if len > 0 && !ptr.is_null() => {
            Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(ptr, len) })
        }
        _ => Bytes::new(),
    }
}

fn post<F>(native: NativeRef, event: &'static str, deliver: F)
where
    F: FnOnce(&DataChannelInner) + Send + 'static,
{
    dispatch::sync(native, move || match DATA_CHANNELS.lookup(native) {
        Some(dc) if !dc.is_disposed() => deliver(&*dc),
        _ => trace!("data channel {native}: {event} dropped, no live handle"),
    });
}

pub(crate) unsafe extern "C" fn data_channel_native_on_message(
    ptr: *mut c_void,
    msg: *const u8,
    size: i32,
) {
    let Some(native) = NativeRef::from_raw(ptr) else {
        return;
    };
    let payload = unsafe { copy_native_bytes(msg, size) };
    post(native, "message", move |dc| dc.deliver_message(payload));
}

pub(crate) unsafe extern "C" fn data_channel_native_on_open(ptr: *mut c_void) {
    let Some(native) = NativeRef::from_raw(ptr) else {
        return;
    };
    post(native, "open", DataChannelInner::deliver_open);
}

pub(crate) unsafe extern "C" fn data_channel_native_on_close(ptr: *mut c_void) {
    let Some(native) = NativeRef::from_raw(ptr) else {
        return;
    };
    post(native, "close", DataChannelInner::deliver_close);
}

pub(crate) unsafe extern "C" fn data_channel_native_on_error(
    ptr: *mut c_void,
    error_type: i32,
    message: *const u8,
    size: i32,
) {
    let Some(native) = NativeRef::from_raw(ptr) else {
        return;
    };
    let message = unsafe { copy_native_bytes(message, size) };
    let err = RTCError::from_native(error_type, &message);
    post(native, "error", move |dc| dc.deliver_error(err));
}
