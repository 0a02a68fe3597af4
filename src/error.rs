use std::fmt;

use crate::capabilities::Capabilities;
use crate::transport::SurfaceId;

/// Kind of a fatal [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The compositor violated the protocol, or is missing something
    /// the library needs (e.g. `xdg_wm_base`).
    CompositorError,
    /// The connection to the display server failed.
    WaylandError,
    /// The transport reported an event for a surface the context does
    /// not know about.
    Desynchronized,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::CompositorError => f.write_str("compositor error"),
            ErrorKind::WaylandError => f.write_str("wayland error"),
            ErrorKind::Desynchronized => f.write_str("desynchronized"),
        }
    }
}

/// A compositor or transport failure.
///
/// These are fatal for the [`Context`](crate::Context) they occur in,
/// with the exception of transport failures returned by
/// [`Context::flush`](crate::Context::flush).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn compositor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompositorError, message)
    }

    pub fn wayland(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WaylandError, message)
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Misuse of a [`Frame`](crate::Frame) or [`Context`](crate::Context).
///
/// Protocol errors never leave a frame in a corrupted state: the call
/// that failed had no effect, and the caller can correct its usage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("serial {got} does not match the pending configuration ({expected:?})")]
    UnknownSerial { expected: Option<u32>, got: u32 },

    #[error("no configuration has been acknowledged yet")]
    NotConfigured,

    #[error("the compositor does not allow {0:?}")]
    CapabilityDenied(Capabilities),

    /// Min exceeds max, or a size does not fit the protocol (`i32::MAX`).
    #[error("invalid size constraint: min {min:?}, max {max:?}")]
    InvalidConstraint { min: (u32, u32), max: (u32, u32) },

    #[error("the frame has been destroyed")]
    FrameDestroyed,

    #[error("no frame is registered for surface {0}")]
    UnknownIdentity(SurfaceId),

    #[error("configure serial {got} does not follow serial {last}")]
    StaleConfigure { last: u32, got: u32 },
}
