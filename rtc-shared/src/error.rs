#[cfg(test)]
mod error_test;

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    //Construction
    /// ErrNullNativeHandle indicates a wrapper was requested for a null
    /// native resource reference.
    #[error("native handle is null")]
    ErrNullNativeHandle,

    /// ErrNativeHandleInUse indicates a live wrapper is already registered
    /// for the native resource reference.
    #[error("native handle is already owned by a live wrapper")]
    ErrNativeHandleInUse,

    /// ErrInvalidDataChannelInit indicates the channel options were rejected
    /// before reaching the native engine.
    #[error("invalid data channel init: {0}")]
    ErrInvalidDataChannelInit(String),

    //Use after dispose
    /// ErrDataChannelDisposed indicates an operation executed after the data
    /// channel has been disposed.
    #[error("data channel has been disposed")]
    ErrDataChannelDisposed,

    /// ErrPeerConnectionClosed indicates an operation executed after the peer
    /// connection has been closed.
    #[error("peer connection closed")]
    ErrPeerConnectionClosed,

    //Invalid state
    /// ErrDataChannelNotOpen indicates a send attempted while the ready state
    /// is anything but open.
    #[error("DataChannel is not open")]
    ErrDataChannelNotOpen,

    //Configuration
    #[error("dispatcher already started")]
    ErrDispatcherAlreadyStarted,
}

/// Coarse classification of [`Error`] values, used by callers that only care
/// about how to recover rather than about the exact variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The wrapper could not be created; nothing was registered.
    Construction,
    /// The wrapper was already disposed; do not reuse it.
    UseAfterDispose,
    /// The operation is not allowed in the current ready state; retry later.
    InvalidState,
    /// Process-wide configuration was applied too late.
    Configuration,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ErrNullNativeHandle
            | Error::ErrNativeHandleInUse
            | Error::ErrInvalidDataChannelInit(_) => ErrorKind::Construction,
            Error::ErrDataChannelDisposed | Error::ErrPeerConnectionClosed => {
                ErrorKind::UseAfterDispose
            }
            Error::ErrDataChannelNotOpen => ErrorKind::InvalidState,
            Error::ErrDispatcherAlreadyStarted => ErrorKind::Configuration,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            ErrorKind::Construction => "construction",
            ErrorKind::UseAfterDispose => "use after dispose",
            ErrorKind::InvalidState => "invalid state",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{s}")
    }
}
