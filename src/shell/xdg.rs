use std::cmp::max;
use std::collections::HashMap;
use std::io;

use tracing::{debug, trace, warn};
use wayland_client::backend::WaylandError;
use wayland_client::globals::{registry_queue_init, GlobalListContents};
use wayland_client::protocol::{wl_compositor, wl_pointer, wl_registry, wl_seat, wl_surface};
use wayland_client::{delegate_noop, Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::capabilities::{Capabilities, ResizeEdge};
use crate::configuration::{Configuration, WindowState};
use crate::error::Error;
use crate::request::SurfaceRequest;
use crate::transport::{CompositorEvent, SurfaceId, Transport, TransportEvent};

struct Window {
    surface: wl_surface::WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
    // toplevel configure data, applied on the next xdg_surface.configure
    size: (u32, u32),
    states: WindowState,
    bounds: (u32, u32),
}

/// Dispatch state of the [`XdgTransport`].
pub struct XdgState {
    compositor: wl_compositor::WlCompositor,
    wm_base: xdg_wm_base::XdgWmBase,
    seat: Option<wl_seat::WlSeat>,
    pointer: Option<wl_pointer::WlPointer>,
    last_serial: Option<u32>,
    windows: HashMap<SurfaceId, Window>,
    events: Vec<TransportEvent>,
}

impl XdgState {
    fn push(&mut self, surface: SurfaceId, event: CompositorEvent) {
        trace!(%surface, ?event, "compositor event");
        self.events.push(TransportEvent::Frame { surface, event });
    }

    /// Seat and serial of the last pointer interaction, needed to start
    /// a move, a resize or to show the window menu.
    fn grab(&self) -> Option<(&wl_seat::WlSeat, u32)> {
        Some((self.seat.as_ref()?, self.last_serial?))
    }
}

/// A [`Transport`] speaking xdg-shell over a wayland connection.
pub struct XdgTransport {
    connection: Connection,
    queue: EventQueue<XdgState>,
    state: XdgState,
}

fn wayland_error(err: impl std::fmt::Display) -> Error {
    Error::wayland(err.to_string())
}

/// Sizes are signed on the wire.
fn wire_size(width: u32, height: u32) -> Result<(i32, i32), Error> {
    match (i32::try_from(width), i32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(Error::wayland(format!(
            "size {width}x{height} does not fit the protocol"
        ))),
    }
}

impl XdgTransport {
    /// Connect to the compositor named by the environment.
    ///
    /// Fails if the compositor does not advertise `wl_compositor` and
    /// `xdg_wm_base`. A seat is optional, without it interactive moves
    /// and resizes are ignored.
    pub fn connect() -> Result<XdgTransport, Error> {
        let connection = Connection::connect_to_env().map_err(wayland_error)?;
        let (globals, queue) = registry_queue_init::<XdgState>(&connection).map_err(wayland_error)?;
        let qh = queue.handle();

        let compositor = globals
            .bind::<wl_compositor::WlCompositor, _, _>(&qh, 1..=5, ())
            .map_err(|e| Error::compositor(format!("wl_compositor: {e}")))?;
        let wm_base = globals
            .bind::<xdg_wm_base::XdgWmBase, _, _>(&qh, 1..=6, ())
            .map_err(|e| Error::compositor(format!("xdg_wm_base: {e}")))?;
        let seat = globals.bind::<wl_seat::WlSeat, _, _>(&qh, 1..=7, ()).ok();
        if seat.is_none() {
            warn!("no seat advertised, interactive requests will be ignored");
        }

        debug!(
            xdg_wm_base = wm_base.version(),
            "connected to the compositor"
        );
        Ok(XdgTransport {
            connection,
            queue,
            state: XdgState {
                compositor,
                wm_base,
                seat,
                pointer: None,
                last_serial: None,
                windows: HashMap::new(),
                events: Vec::new(),
            },
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The content surface of a frame, to attach buffers to.
    pub fn surface(&self, id: SurfaceId) -> Option<&wl_surface::WlSurface> {
        self.state.windows.get(&id).map(|w| &w.surface)
    }

    fn window(&self, id: SurfaceId) -> Result<&Window, Error> {
        self.state
            .windows
            .get(&id)
            .ok_or_else(|| Error::wayland(format!("no surface {id} on this connection")))
    }
}

impl Transport for XdgTransport {
    fn create_surface(
        &mut self,
        title: &str,
        parent: Option<SurfaceId>,
    ) -> Result<SurfaceId, Error> {
        let parent = match parent {
            Some(parent) => Some(self.window(parent)?.toplevel.clone()),
            None => None,
        };
        let qh = self.queue.handle();
        let surface = self.state.compositor.create_surface(&qh, ());
        let id = SurfaceId::new(surface.id().protocol_id());
        let xdg_surface = self.state.wm_base.get_xdg_surface(&surface, &qh, id);
        let toplevel = xdg_surface.get_toplevel(&qh, id);
        toplevel.set_title(title.to_owned());
        if let Some(ref parent) = parent {
            toplevel.set_parent(Some(parent));
        }
        self.state.windows.insert(
            id,
            Window {
                surface,
                xdg_surface,
                toplevel,
                size: (0, 0),
                states: WindowState::empty(),
                bounds: (0, 0),
            },
        );
        Ok(id)
    }

    fn send(&mut self, id: SurfaceId, request: &SurfaceRequest) -> Result<(), Error> {
        if let SurfaceRequest::DestroySurface = *request {
            if let Some(window) = self.state.windows.remove(&id) {
                window.toplevel.destroy();
                window.xdg_surface.destroy();
                window.surface.destroy();
            }
            return Ok(());
        }

        let window = self.window(id)?;
        match *request {
            SurfaceRequest::DestroySurface => {}
            SurfaceRequest::Map | SurfaceRequest::CommitSurface => window.surface.commit(),
            SurfaceRequest::AckConfigure(serial) => window.xdg_surface.ack_configure(serial),
            SurfaceRequest::SetMinSize(w, h) => {
                let (w, h) = wire_size(w, h)?;
                window.toplevel.set_min_size(w, h)
            }
            SurfaceRequest::SetMaxSize(w, h) => {
                let (w, h) = wire_size(w, h)?;
                window.toplevel.set_max_size(w, h)
            }
            SurfaceRequest::SetTitle(ref title) => window.toplevel.set_title(title.clone()),
            SurfaceRequest::SetAppId(ref app_id) => window.toplevel.set_app_id(app_id.clone()),
            SurfaceRequest::SetParent(parent) => {
                let parent = match parent {
                    Some(parent) => Some(&self.window(parent)?.toplevel),
                    None => None,
                };
                window.toplevel.set_parent(parent);
            }
            SurfaceRequest::SetMinimized => window.toplevel.set_minimized(),
            SurfaceRequest::SetMaximized(true) => window.toplevel.set_maximized(),
            SurfaceRequest::SetMaximized(false) => window.toplevel.unset_maximized(),
            SurfaceRequest::SetFullscreen(true) => window.toplevel.set_fullscreen(None),
            SurfaceRequest::SetFullscreen(false) => window.toplevel.unset_fullscreen(),
            SurfaceRequest::BeginInteractiveMove => match self.state.grab() {
                Some((seat, serial)) => window.toplevel._move(seat, serial),
                None => warn!(surface = %id, "no pointer serial, ignoring move"),
            },
            SurfaceRequest::BeginInteractiveResize(edge) => match self.state.grab() {
                Some((seat, serial)) => window.toplevel.resize(seat, serial, edge.into()),
                None => warn!(surface = %id, "no pointer serial, ignoring resize"),
            },
            SurfaceRequest::ShowWindowMenu { x, y } => match self.state.grab() {
                Some((seat, serial)) => window.toplevel.show_window_menu(seat, serial, x, y),
                None => warn!(surface = %id, "no pointer serial, ignoring window menu"),
            },
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.connection.flush().map_err(wayland_error)
    }

    fn poll_events(&mut self, sink: &mut Vec<TransportEvent>) -> Result<(), Error> {
        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(ref err)) if err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    sink.push(TransportEvent::ConnectionError(err.to_string()));
                    return Ok(());
                }
            }
        }
        if let Err(err) = self.queue.dispatch_pending(&mut self.state) {
            sink.push(TransportEvent::ConnectionError(err.to_string()));
            return Ok(());
        }
        sink.append(&mut self.state.events);
        Ok(())
    }
}

impl From<ResizeEdge> for xdg_toplevel::ResizeEdge {
    fn from(edge: ResizeEdge) -> xdg_toplevel::ResizeEdge {
        match edge {
            ResizeEdge::None => xdg_toplevel::ResizeEdge::None,
            ResizeEdge::Top => xdg_toplevel::ResizeEdge::Top,
            ResizeEdge::Bottom => xdg_toplevel::ResizeEdge::Bottom,
            ResizeEdge::Left => xdg_toplevel::ResizeEdge::Left,
            ResizeEdge::Right => xdg_toplevel::ResizeEdge::Right,
            ResizeEdge::TopLeft => xdg_toplevel::ResizeEdge::TopLeft,
            ResizeEdge::TopRight => xdg_toplevel::ResizeEdge::TopRight,
            ResizeEdge::BottomLeft => xdg_toplevel::ResizeEdge::BottomLeft,
            ResizeEdge::BottomRight => xdg_toplevel::ResizeEdge::BottomRight,
        }
    }
}

fn raw_values(array: &[u8]) -> impl Iterator<Item = u32> + '_ {
    array
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
}

/// Decode the `states` array of a toplevel configure. Unknown values
/// are ignored.
fn decode_states(array: &[u8]) -> WindowState {
    use xdg_toplevel::State;

    raw_values(array)
        .filter_map(|raw| State::try_from(raw).ok())
        .fold(WindowState::empty(), |acc, state| {
            acc | match state {
                State::Maximized => WindowState::MAXIMIZED,
                State::Fullscreen => WindowState::FULLSCREEN,
                State::Resizing => WindowState::RESIZING,
                State::Activated => WindowState::ACTIVATED,
                State::TiledLeft => WindowState::TILED_LEFT,
                State::TiledRight => WindowState::TILED_RIGHT,
                State::TiledTop => WindowState::TILED_TOP,
                State::TiledBottom => WindowState::TILED_BOTTOM,
                State::Suspended => WindowState::SUSPENDED,
                _ => WindowState::empty(),
            }
        })
}

/// Decode the `wm_capabilities` array. Moving, resizing and closing are
/// always available on xdg-shell.
fn decode_capabilities(array: &[u8]) -> Capabilities {
    use xdg_toplevel::WmCapabilities;

    raw_values(array)
        .filter_map(|raw| WmCapabilities::try_from(raw).ok())
        .fold(
            Capabilities::MOVE | Capabilities::RESIZE | Capabilities::CLOSE,
            |acc, cap| {
                acc | match cap {
                    WmCapabilities::WindowMenu => Capabilities::WINDOW_MENU,
                    WmCapabilities::Maximize => Capabilities::MAXIMIZE,
                    WmCapabilities::Fullscreen => Capabilities::FULLSCREEN,
                    WmCapabilities::Minimize => Capabilities::MINIMIZE,
                    _ => Capabilities::empty(),
                }
            },
        )
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for XdgState {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        _: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

delegate_noop!(XdgState: ignore wl_compositor::WlCompositor);
delegate_noop!(XdgState: ignore wl_surface::WlSurface);

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for XdgState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, SurfaceId> for XdgState {
    fn event(
        state: &mut Self,
        _: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        id: &SurfaceId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            let Some(window) = state.windows.get(id) else {
                return;
            };
            let (w, h) = window.size;
            let configuration = Configuration::new(serial, w, h, window.states)
                .with_bounds(window.bounds.0, window.bounds.1);
            state.push(*id, CompositorEvent::Configure(configuration));
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, SurfaceId> for XdgState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        id: &SurfaceId,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure {
                width,
                height,
                states,
            } => {
                if let Some(window) = state.windows.get_mut(id) {
                    window.size = (max(width, 0) as u32, max(height, 0) as u32);
                    window.states = decode_states(&states);
                }
            }
            xdg_toplevel::Event::ConfigureBounds { width, height } => {
                if let Some(window) = state.windows.get_mut(id) {
                    window.bounds = (max(width, 0) as u32, max(height, 0) as u32);
                }
            }
            xdg_toplevel::Event::Close => state.push(*id, CompositorEvent::CloseRequested),
            xdg_toplevel::Event::WmCapabilities { capabilities } => {
                let capabilities = decode_capabilities(&capabilities);
                state.push(*id, CompositorEvent::CapabilitiesChanged(capabilities));
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for XdgState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        {
            let has_pointer = capabilities.contains(wl_seat::Capability::Pointer);
            if has_pointer && state.pointer.is_none() {
                state.pointer = Some(seat.get_pointer(qh, ()));
            } else if !has_pointer {
                if let Some(pointer) = state.pointer.take() {
                    pointer.release();
                }
            }
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for XdgState {
    fn event(
        state: &mut Self,
        _: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_pointer::Event::Enter { serial, .. } | wl_pointer::Event::Button { serial, .. } => {
                state.last_serial = Some(serial);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn states_are_decoded() {
        let states = decode_states(&array(&[1, 4, 5]));
        assert_eq!(
            states,
            WindowState::MAXIMIZED | WindowState::ACTIVATED | WindowState::TILED_LEFT
        );
    }

    #[test]
    fn unknown_states_are_ignored() {
        assert_eq!(decode_states(&array(&[2, 1000])), WindowState::FULLSCREEN);
        // trailing garbage is not a full value
        assert_eq!(decode_states(&[4, 0, 0, 0, 1]), WindowState::ACTIVATED);
    }

    #[test]
    fn capabilities_are_decoded() {
        let base = Capabilities::MOVE | Capabilities::RESIZE | Capabilities::CLOSE;
        assert_eq!(decode_capabilities(&[]), base);
        assert_eq!(
            decode_capabilities(&array(&[1, 4])),
            base | Capabilities::WINDOW_MENU | Capabilities::MINIMIZE
        );
    }

    #[test]
    fn oversized_hints_are_refused() {
        assert_eq!(wire_size(800, 0).unwrap(), (800, 0));
        assert_eq!(wire_size(i32::MAX as u32, 1).unwrap(), (i32::MAX, 1));
        let err = wire_size(u32::MAX, 10).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::WaylandError);
    }

    #[test]
    fn resize_edges_map_to_protocol() {
        assert_eq!(
            xdg_toplevel::ResizeEdge::from(ResizeEdge::BottomRight),
            xdg_toplevel::ResizeEdge::BottomRight
        );
        assert_eq!(
            xdg_toplevel::ResizeEdge::from(ResizeEdge::None),
            xdg_toplevel::ResizeEdge::None
        );
    }
}
