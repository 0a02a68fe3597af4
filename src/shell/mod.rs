//! Transports for actual display servers.

mod xdg;

pub use self::xdg::{XdgState, XdgTransport};
