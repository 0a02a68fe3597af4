//! The boundary with the display-server connection.

use std::fmt;

use crate::capabilities::Capabilities;
use crate::configuration::Configuration;
use crate::error::Error;
use crate::request::SurfaceRequest;

/// Protocol identity of a toplevel surface.
///
/// Identities may be reused by the transport once the surface is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(u32);

impl SurfaceId {
    pub fn new(raw: u32) -> Self {
        SurfaceId(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An event the compositor sent about one surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositorEvent {
    Configure(Configuration),
    CapabilitiesChanged(Capabilities),
    CloseRequested,
}

/// An event read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Frame {
        surface: SurfaceId,
        event: CompositorEvent,
    },
    ConnectionError(String),
}

/// The connection to the display server.
///
/// The [`Context`](crate::Context) owns its transport exclusively and is
/// the only one calling into it.
pub trait Transport {
    /// Create a toplevel surface and return its identity.
    fn create_surface(&mut self, title: &str, parent: Option<SurfaceId>)
        -> Result<SurfaceId, Error>;

    /// Queue a request for the given surface.
    fn send(&mut self, surface: SurfaceId, request: &SurfaceRequest) -> Result<(), Error>;

    /// Write queued requests to the display server.
    fn flush(&mut self) -> Result<(), Error>;

    /// Read available events without blocking, in the order the
    /// compositor emitted them.
    fn poll_events(&mut self, sink: &mut Vec<TransportEvent>) -> Result<(), Error>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn create_surface(
        &mut self,
        title: &str,
        parent: Option<SurfaceId>,
    ) -> Result<SurfaceId, Error> {
        (**self).create_surface(title, parent)
    }

    fn send(&mut self, surface: SurfaceId, request: &SurfaceRequest) -> Result<(), Error> {
        (**self).send(surface, request)
    }

    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }

    fn poll_events(&mut self, sink: &mut Vec<TransportEvent>) -> Result<(), Error> {
        (**self).poll_events(sink)
    }
}
