//! Wayland Decor, client-side window-decoration negotiation for
//! wayland applications.
//!
//! This crate keeps track of what the compositor and the application
//! agreed on for each decorated toplevel: the configuration in effect,
//! the one waiting to be acknowledged, the operations the compositor
//! allows and the size of the borders drawn around the content. It does
//! not draw anything itself.
//!
//! ## Creating a decorated window
//!
//! Everything goes through a `Context`, which owns the connection to the
//! display server through a [`Transport`]. With the default `xdg_shell`
//! feature, [`XdgTransport`] talks to a real compositor:
//!
//! ```ignore
//! use wayland_decor::{Context, XdgTransport};
//!
//! let mut context = Context::new(XdgTransport::connect()?);
//! let frame = context.create_frame("My window", None)?;
//! frame.set_app_id("org.example.window")?;
//! frame.map()?;
//! context.flush()?;
//! ```
//!
//! The `Frame` is your handle on the window. Dropping it destroys the
//! window, and dropping the context destroys all of its windows.
//!
//! ## Processing the events
//!
//! The context does not call you back. Once `dispatch()` has read what
//! the compositor sent, the resulting events are queued on the context:
//!
//! ```ignore
//! loop {
//!     context.dispatch()?;
//!     while let Some(event) = context.next_event() {
//!         match event {
//!             Event::Configure { configuration, .. } => {
//!                 let size = frame.content_size(&configuration)?;
//!                 // draw your content at `size`, then
//!                 frame.acknowledge(configuration.serial())?;
//!                 frame.commit()?;
//!             }
//!             Event::Close { .. } => return Ok(()),
//!             Event::Redraw { .. } => { /* paint the borders again */ }
//!             Event::Error(err) => return Err(err.into()),
//!             _ => {}
//!         }
//!     }
//!     context.flush()?;
//! }
//! ```
//!
//! ## Configure events
//!
//! During an interactive resize the compositor can send a lot of
//! configure events in a row. Only the most recent one is kept pending,
//! it replaces the previous ones, and only its serial can be
//! acknowledged.
//!
//! A commit always refers to the last *acknowledged* configuration: it
//! remains valid while a newer one is pending, so you can keep drawing
//! at the old size until you are ready to handle the new one.
//!
//! ## Sizes and borders
//!
//! The size hint of a configuration includes the decorations. Use
//! `Frame::content_size` to get the size left for your content, and
//! `Borders::add` and `Borders::subtract` if you need to do the
//! computation yourself. Size limits set with `set_min_size` and
//! `set_max_size` are about the content; the borders are added before
//! they reach the compositor.
//!
//! ## Errors
//!
//! Calls that break the protocol for a single window (acknowledging an
//! unknown serial, committing before the first configuration, asking for
//! an operation the compositor does not allow) fail with a
//! [`ProtocolError`] and leave everything as it was. Failures of the
//! connection itself are fatal: the context is torn down, an
//! `Event::Error` is queued and every later call fails.

mod capabilities;
mod config;
mod configuration;
mod context;
mod error;
mod frame;
mod request;
#[cfg(feature = "xdg_shell")]
mod shell;
mod theme;
mod transport;

pub use capabilities::{Capabilities, ResizeEdge};
pub use config::Config;
pub use configuration::{Configuration, WindowState};
pub use context::Context;
pub use error::{Error, ErrorKind, ProtocolError};
pub use frame::{Frame, Lifecycle};
pub use request::{Event, FrameRequest, SurfaceRequest};
#[cfg(feature = "xdg_shell")]
pub use shell::{XdgState, XdgTransport};
pub use theme::{Borders, Location};
pub use transport::{CompositorEvent, SurfaceId, Transport, TransportEvent};
