use super::*;

#[test]
fn test_error_kind_classification() {
    let tests = vec![
        (Error::ErrNullNativeHandle, ErrorKind::Construction),
        (Error::ErrNativeHandleInUse, ErrorKind::Construction),
        (
            Error::ErrInvalidDataChannelInit("both set".to_owned()),
            ErrorKind::Construction,
        ),
        (Error::ErrDataChannelDisposed, ErrorKind::UseAfterDispose),
        (Error::ErrPeerConnectionClosed, ErrorKind::UseAfterDispose),
        (Error::ErrDataChannelNotOpen, ErrorKind::InvalidState),
        (Error::ErrDispatcherAlreadyStarted, ErrorKind::Configuration),
    ];

    for (err, expected) in tests {
        assert_eq!(err.kind(), expected, "{err}");
    }
}

#[test]
fn test_not_open_message() {
    assert_eq!(
        Error::ErrDataChannelNotOpen.to_string(),
        "DataChannel is not open"
    );
}

#[test]
fn test_error_kind_display() {
    assert_eq!(ErrorKind::UseAfterDispose.to_string(), "use after dispose");
    assert_eq!(
        Error::ErrDataChannelDisposed.kind().to_string(),
        "use after dispose"
    );
}
