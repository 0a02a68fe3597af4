use std::cell::RefCell;
use std::cmp::{max, min};
use std::rc::Weak;

use tracing::{debug, trace};

use crate::capabilities::{Capabilities, ResizeEdge};
use crate::config::Config;
use crate::configuration::{Configuration, WindowState};
use crate::context::Shared;
use crate::error::ProtocolError;
use crate::request::{Event, FrameRequest, SurfaceRequest};
use crate::theme::{Borders, Location};
use crate::transport::SurfaceId;

const MAX_SIZE: u32 = i32::MAX as u32;

/// Where a frame is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No configuration has been acknowledged yet.
    Created,
    /// At least one configuration has been acknowledged.
    Configured,
    /// A close was requested, the application has not destroyed the frame yet.
    Closing,
    /// Terminal.
    Destroyed,
}

/// Identity of a frame inside its context.
///
/// Surface identities can be reused by the transport, the generation
/// tells two frames that got the same identity apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameKey {
    pub(crate) surface: SurfaceId,
    pub(crate) generation: u64,
}

/// State machine of one decorated surface.
#[derive(Debug)]
pub(crate) struct FrameState {
    key: FrameKey,
    lifecycle: Lifecycle,
    current: Option<Configuration>,
    pending: Option<Configuration>,
    last_serial: Option<u32>,
    capabilities: Capabilities,
    title: String,
    app_id: Option<String>,
    parent: Option<SurfaceId>,
    min_size: (u32, u32),
    max_size: (u32, u32),
    decorate: bool,
    visible: bool,
    borders: Borders,
    dimensions: (u32, u32),
    popup_grabs: Vec<String>,
    notices: Vec<Event>,
}

impl FrameState {
    pub(crate) fn new(
        key: FrameKey,
        title: &str,
        parent: Option<SurfaceId>,
        config: &Config,
    ) -> FrameState {
        FrameState {
            key,
            lifecycle: Lifecycle::Created,
            current: None,
            pending: None,
            last_serial: None,
            capabilities: Capabilities::default(),
            title: title.to_owned(),
            app_id: None,
            parent,
            min_size: (0, 0),
            max_size: (0, 0),
            decorate: config.decorate,
            visible: true,
            borders: config.borders,
            dimensions: (1, 1),
            popup_grabs: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub(crate) fn key(&self) -> FrameKey {
        self.key
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub(crate) fn drain_notices(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.notices)
    }

    fn surface(&self) -> SurfaceId {
        self.key.surface
    }

    fn notify(&mut self, event: Event) {
        self.notices.push(event);
    }

    fn redraw(&mut self) {
        let surface = self.surface();
        self.notify(Event::Redraw { surface });
    }

    fn ensure_alive(&self) -> Result<(), ProtocolError> {
        if self.lifecycle == Lifecycle::Destroyed {
            Err(ProtocolError::FrameDestroyed)
        } else {
            Ok(())
        }
    }

    fn dismiss_popups(&mut self) {
        let surface = self.surface();
        for seat_name in self.popup_grabs.clone() {
            self.notify(Event::DismissPopup { surface, seat_name });
        }
    }

    /// Store a new configuration from the compositor, replacing any that
    /// is still pending.
    pub(crate) fn on_configure(&mut self, proposed: Configuration) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        if let Some(last) = self.last_serial {
            if proposed.serial() <= last {
                return Err(ProtocolError::StaleConfigure {
                    last,
                    got: proposed.serial(),
                });
            }
        }
        if let Some(ref superseded) = self.pending {
            trace!(surface = %self.surface(), serial = superseded.serial(), "configuration superseded");
        }
        self.last_serial = Some(proposed.serial());
        let surface = self.surface();
        self.pending = Some(proposed.clone());
        self.notify(Event::Configure {
            surface,
            configuration: proposed,
        });
        Ok(())
    }

    /// Promote the pending configuration to current.
    pub(crate) fn acknowledge(&mut self, serial: u32) -> Result<SurfaceRequest, ProtocolError> {
        self.ensure_alive()?;
        let acked = match self.pending.take() {
            Some(pending) if pending.serial() == serial => pending,
            other => {
                let expected = other.as_ref().map(Configuration::serial);
                self.pending = other;
                return Err(ProtocolError::UnknownSerial {
                    expected,
                    got: serial,
                });
            }
        };
        let size = self.content_size(&acked);
        let previous = self.current.replace(acked);
        if self.lifecycle == Lifecycle::Created {
            self.lifecycle = Lifecycle::Configured;
        }

        let old_state = previous.map(|c| c.window_state()).unwrap_or_default();
        let new_state = self.window_state();
        let resized = match size {
            Some(size) if size != self.dimensions => {
                self.dimensions = size;
                true
            }
            _ => false,
        };
        if old_state != new_state || resized {
            if old_state.contains(WindowState::ACTIVATED) && !new_state.contains(WindowState::ACTIVATED) {
                self.dismiss_popups();
            }
            self.redraw();
        }
        Ok(SurfaceRequest::AckConfigure(serial))
    }

    /// Validate that the application may commit, against the last
    /// acknowledged configuration.
    pub(crate) fn commit(&mut self) -> Result<FrameRequest, ProtocolError> {
        self.ensure_alive()?;
        if self.current.is_none() {
            return Err(ProtocolError::NotConfigured);
        }
        Ok(FrameRequest::Commit)
    }

    /// Replace the capabilities as a whole.
    pub(crate) fn set_capabilities(&mut self, capabilities: Capabilities) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        self.capabilities = capabilities;
        let surface = self.surface();
        self.notify(Event::Capabilities {
            surface,
            capabilities,
        });
        // buttons depend on the capabilities
        self.redraw();
        Ok(())
    }

    pub(crate) fn close_requested(&mut self) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        self.lifecycle = Lifecycle::Closing;
        let surface = self.surface();
        self.notify(Event::Close { surface });
        Ok(())
    }

    /// Check a window-management request against the capabilities.
    pub(crate) fn request(&mut self, request: FrameRequest) -> Result<FrameRequest, ProtocolError> {
        self.ensure_alive()?;
        if request == FrameRequest::Commit {
            return self.commit();
        }
        if let Some(required) = request.required_capability() {
            if !self.capabilities.contains(required) {
                debug!(surface = %self.surface(), ?request, "request denied");
                return Err(ProtocolError::CapabilityDenied(required));
            }
        }
        if request.is_decoration_interaction() {
            self.dismiss_popups();
        }
        if request == FrameRequest::Close {
            self.close_requested()?;
        }
        Ok(request)
    }

    /// Size limits travel as `int` on the wire, anything above
    /// `i32::MAX` is rejected along with min > max.
    fn check_constraint(min_size: (u32, u32), max_size: (u32, u32)) -> Result<(), ProtocolError> {
        let (minw, minh) = min_size;
        let (maxw, maxh) = max_size;
        let too_large = [minw, minh, maxw, maxh].iter().any(|&v| v > MAX_SIZE);
        if too_large || (maxw != 0 && minw > maxw) || (maxh != 0 && minh > maxh) {
            return Err(ProtocolError::InvalidConstraint {
                min: min_size,
                max: max_size,
            });
        }
        Ok(())
    }

    fn size_hint(&self, (w, h): (u32, u32)) -> (u32, u32) {
        if !self.is_decorated() {
            return (w, h);
        }
        let (full_w, full_h) = self.borders.add(w, h);
        (
            if w == 0 { 0 } else { min(full_w, MAX_SIZE) },
            if h == 0 { 0 } else { min(full_h, MAX_SIZE) },
        )
    }

    pub(crate) fn set_min_size(&mut self, width: u32, height: u32) -> Result<SurfaceRequest, ProtocolError> {
        self.ensure_alive()?;
        Self::check_constraint((width, height), self.max_size)?;
        self.min_size = (width, height);
        let (w, h) = self.size_hint(self.min_size);
        Ok(SurfaceRequest::SetMinSize(w, h))
    }

    pub(crate) fn set_max_size(&mut self, width: u32, height: u32) -> Result<SurfaceRequest, ProtocolError> {
        self.ensure_alive()?;
        Self::check_constraint(self.min_size, (width, height))?;
        self.max_size = (width, height);
        let (w, h) = self.size_hint(self.max_size);
        Ok(SurfaceRequest::SetMaxSize(w, h))
    }

    pub(crate) fn set_title(&mut self, title: &str) -> Result<SurfaceRequest, ProtocolError> {
        self.ensure_alive()?;
        if self.title != title {
            self.title = title.to_owned();
            self.redraw();
        }
        Ok(SurfaceRequest::SetTitle(self.title.clone()))
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }

    pub(crate) fn set_app_id(&mut self, app_id: &str) -> Result<SurfaceRequest, ProtocolError> {
        self.ensure_alive()?;
        self.app_id = Some(app_id.to_owned());
        Ok(SurfaceRequest::SetAppId(app_id.to_owned()))
    }

    pub(crate) fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<SurfaceId>) -> Result<SurfaceRequest, ProtocolError> {
        self.ensure_alive()?;
        self.parent = parent;
        Ok(SurfaceRequest::SetParent(parent))
    }

    pub(crate) fn parent(&self) -> Option<SurfaceId> {
        self.parent
    }

    /// Show or hide the decorations. The size hints have to be sent
    /// again since they include the borders.
    pub(crate) fn set_visibility(&mut self, visible: bool) -> Result<Vec<SurfaceRequest>, ProtocolError> {
        self.ensure_alive()?;
        if self.visible == visible {
            return Ok(Vec::new());
        }
        self.visible = visible;
        let surface = self.surface();
        self.notify(Event::Commit { surface });
        self.redraw();
        let mut requests = Vec::new();
        if self.min_size != (0, 0) {
            let (w, h) = self.size_hint(self.min_size);
            requests.push(SurfaceRequest::SetMinSize(w, h));
        }
        if self.max_size != (0, 0) {
            let (w, h) = self.size_hint(self.max_size);
            requests.push(SurfaceRequest::SetMaxSize(w, h));
        }
        Ok(requests)
    }

    pub(crate) fn is_visible(&self) -> bool {
        self.visible
    }

    fn window_state(&self) -> WindowState {
        self.current
            .as_ref()
            .map(Configuration::window_state)
            .unwrap_or_default()
    }

    /// Whether borders are currently drawn around the content.
    pub(crate) fn is_decorated(&self) -> bool {
        self.decorate && self.visible && !self.window_state().contains(WindowState::FULLSCREEN)
    }

    pub(crate) fn is_floating(&self) -> bool {
        self.current.as_ref().map_or(true, Configuration::is_floating)
    }

    pub(crate) fn current(&self) -> Option<&Configuration> {
        self.current.as_ref()
    }

    pub(crate) fn pending(&self) -> Option<&Configuration> {
        self.pending.as_ref()
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Content size for the given configuration: the proposed size minus
    /// the decorations, clamped to the size limits.
    pub(crate) fn content_size(&self, configuration: &Configuration) -> Option<(u32, u32)> {
        let (mut w, mut h) = configuration.size()?;
        let fullscreen = configuration.window_state().contains(WindowState::FULLSCREEN);
        if self.decorate && self.visible && !fullscreen {
            let (ww, hh) = self.borders.subtract(w, h);
            w = ww;
            h = hh;
        }
        let (minw, minh) = self.min_size;
        w = max(minw, w);
        h = max(minh, h);
        let (maxw, maxh) = self.max_size;
        if maxw != 0 {
            w = min(maxw, w);
        }
        if maxh != 0 {
            h = min(maxh, h);
        }
        Some((max(w, 1), max(h, 1)))
    }

    /// Record an application-driven change of the content size.
    pub(crate) fn resize(&mut self, width: u32, height: u32) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        let dimensions = (max(width, 1), max(height, 1));
        if dimensions != self.dimensions {
            self.dimensions = dimensions;
            self.redraw();
        }
        Ok(())
    }

    pub(crate) fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub(crate) fn translate_coordinate(&self, x: i32, y: i32) -> (i32, i32) {
        if self.is_decorated() {
            let (dx, dy) = self.borders.offset();
            let dx = i32::try_from(dx).unwrap_or(i32::MAX);
            let dy = i32::try_from(dy).unwrap_or(i32::MAX);
            (x.saturating_add(dx), y.saturating_add(dy))
        } else {
            (x, y)
        }
    }

    /// Which part of the frame the point `(x, y)`, in frame coordinates,
    /// falls on.
    pub(crate) fn location_at(&self, x: f64, y: f64) -> Location {
        if self.is_decorated() {
            return self.borders.locate((x, y), self.dimensions);
        }
        let (w, h) = self.dimensions;
        if x >= 0.0 && y >= 0.0 && x <= w as f64 && y <= h as f64 {
            Location::Inside
        } else {
            Location::None
        }
    }

    pub(crate) fn popup_grab(&mut self, seat_name: &str) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        if !self.popup_grabs.iter().any(|s| s == seat_name) {
            self.popup_grabs.push(seat_name.to_owned());
        }
        Ok(())
    }

    pub(crate) fn popup_ungrab(&mut self, seat_name: &str) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        self.popup_grabs.retain(|s| s != seat_name);
        Ok(())
    }

    pub(crate) fn destroy(&mut self) -> Result<(), ProtocolError> {
        self.ensure_alive()?;
        self.lifecycle = Lifecycle::Destroyed;
        self.pending = None;
        self.popup_grabs.clear();
        Ok(())
    }
}

/// A decorated toplevel window.
///
/// This object is the application's handle on the frame: it validates
/// requests against the state negotiated with the compositor and queues
/// them on its [`Context`](crate::Context).
///
/// Dropping it destroys the frame. Once the frame is destroyed, either
/// explicitly or because its context was torn down, every call fails
/// with [`ProtocolError::FrameDestroyed`].
#[derive(Debug)]
pub struct Frame {
    key: FrameKey,
    shared: Weak<RefCell<Shared>>,
}

impl Frame {
    pub(crate) fn new(key: FrameKey, shared: Weak<RefCell<Shared>>) -> Frame {
        Frame { key, shared }
    }

    fn with_shared<R>(
        &self,
        f: impl FnOnce(&mut Shared) -> Result<R, ProtocolError>,
    ) -> Result<R, ProtocolError> {
        let shared = self.shared.upgrade().ok_or(ProtocolError::FrameDestroyed)?;
        let mut shared = shared.borrow_mut();
        f(&mut shared)
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut FrameState) -> Result<R, ProtocolError>,
    ) -> Result<R, ProtocolError> {
        self.with_shared(|shared| shared.with_frame(self.key, f))
    }

    fn send(
        &self,
        f: impl FnOnce(&mut FrameState) -> Result<SurfaceRequest, ProtocolError>,
    ) -> Result<(), ProtocolError> {
        self.with_shared(|shared| {
            let request = shared.with_frame(self.key, f)?;
            shared.queue(self.key.surface, request);
            Ok(())
        })
    }

    fn submit(&self, request: FrameRequest) -> Result<(), ProtocolError> {
        self.with_shared(|shared| shared.submit(self.key, request))
    }

    /// Protocol identity of the underlying surface.
    pub fn surface(&self) -> SurfaceId {
        self.key.surface
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.with_state(|state| Ok(state.lifecycle()))
            .unwrap_or(Lifecycle::Destroyed)
    }

    /// Map the window.
    ///
    /// This will eventually result in the initial configure event.
    pub fn map(&self) -> Result<(), ProtocolError> {
        self.send(|state| {
            state.ensure_alive()?;
            Ok(SurfaceRequest::Map)
        })
    }

    /// Acknowledge the pending configuration.
    ///
    /// Only the most recent configuration can be acknowledged; anything
    /// else fails with [`ProtocolError::UnknownSerial`].
    pub fn acknowledge(&self, serial: u32) -> Result<(), ProtocolError> {
        self.send(|state| state.acknowledge(serial))
    }

    /// Tell the compositor new content matching the last acknowledged
    /// configuration is attached.
    pub fn commit(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Commit)
    }

    /// The last acknowledged configuration.
    pub fn configuration(&self) -> Result<Option<Configuration>, ProtocolError> {
        self.with_state(|state| Ok(state.current().cloned()))
    }

    /// The configuration waiting to be acknowledged, if any.
    pub fn pending_configuration(&self) -> Result<Option<Configuration>, ProtocolError> {
        self.with_state(|state| Ok(state.pending().cloned()))
    }

    pub fn capabilities(&self) -> Result<Capabilities, ProtocolError> {
        self.with_state(|state| Ok(state.capabilities()))
    }

    /// Check whether the window has all of the given capabilities.
    pub fn has_capability(&self, capabilities: Capabilities) -> bool {
        self.capabilities()
            .map(|caps| caps.contains(capabilities))
            .unwrap_or(false)
    }

    /// Initiate an interactive resize.
    pub fn request_resize(&self, edge: ResizeEdge) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Resize(edge))
    }

    /// Initiate an interactive move.
    pub fn request_move(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Move)
    }

    pub fn request_minimize(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Minimize)
    }

    pub fn request_maximize(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Maximize)
    }

    pub fn request_unmaximize(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Unmaximize)
    }

    pub fn request_fullscreen(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Fullscreen)
    }

    pub fn request_unfullscreen(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Unfullscreen)
    }

    /// Close the window.
    ///
    /// This behaves as if the compositor asked for it: an
    /// [`Event::Close`] is queued for the application.
    pub fn request_close(&self) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::Close)
    }

    /// Show the window menu at the given frame coordinates.
    pub fn show_window_menu(&self, x: i32, y: i32) -> Result<(), ProtocolError> {
        self.submit(FrameRequest::ShowWindowMenu { x, y })
    }

    /// Sets the minimum content size, 0 leaves a dimension unconstrained.
    pub fn set_min_size(&self, width: u32, height: u32) -> Result<(), ProtocolError> {
        self.send(|state| state.set_min_size(width, height))
    }

    /// Sets the maximum content size, 0 leaves a dimension unbounded.
    pub fn set_max_size(&self, width: u32, height: u32) -> Result<(), ProtocolError> {
        self.send(|state| state.set_max_size(width, height))
    }

    /// Set a short title for the window.
    pub fn set_title(&self, title: &str) -> Result<(), ProtocolError> {
        self.send(|state| state.set_title(title))
    }

    pub fn title(&self) -> Result<String, ProtocolError> {
        self.with_state(|state| Ok(state.title().to_owned()))
    }

    /// Set an app id for the surface.
    ///
    /// Several wayland compositors will try to find a `.desktop` file
    /// matching this name to find metadata about your app.
    pub fn set_app_id(&self, app_id: &str) -> Result<(), ProtocolError> {
        self.send(|state| state.set_app_id(app_id))
    }

    pub fn app_id(&self) -> Result<Option<String>, ProtocolError> {
        self.with_state(|state| Ok(state.app_id().map(str::to_owned)))
    }

    /// Stack this window above `parent`, or make it independent again.
    pub fn set_parent(&self, parent: Option<&Frame>) -> Result<(), ProtocolError> {
        let parent = parent.map(Frame::surface);
        self.send(|state| state.set_parent(parent))
    }

    pub fn parent(&self) -> Result<Option<SurfaceId>, ProtocolError> {
        self.with_state(|state| Ok(state.parent()))
    }

    /// Set the visibility of the decorations.
    ///
    /// An application that wants to be borderless can hide them.
    pub fn set_visibility(&self, visible: bool) -> Result<(), ProtocolError> {
        self.with_shared(|shared| {
            let requests = shared.with_frame(self.key, |state| state.set_visibility(visible))?;
            for request in requests {
                shared.queue(self.key.surface, request);
            }
            Ok(())
        })
    }

    pub fn is_visible(&self) -> Result<bool, ProtocolError> {
        self.with_state(|state| Ok(state.is_visible()))
    }

    /// Whether the window is floating, according to the last
    /// acknowledged configuration.
    pub fn is_floating(&self) -> Result<bool, ProtocolError> {
        self.with_state(|state| Ok(state.is_floating()))
    }

    /// Expected size of the content for this configuration.
    ///
    /// `None` if the configuration leaves the size to the client.
    pub fn content_size(
        &self,
        configuration: &Configuration,
    ) -> Result<Option<(u32, u32)>, ProtocolError> {
        self.with_state(|state| Ok(state.content_size(configuration)))
    }

    /// Record a new content size, for resizes driven by the application.
    pub fn resize(&self, width: u32, height: u32) -> Result<(), ProtocolError> {
        self.with_state(|state| state.resize(width, height))
    }

    /// Current content size.
    pub fn dimensions(&self) -> Result<(u32, u32), ProtocolError> {
        self.with_state(|state| Ok(state.dimensions()))
    }

    /// Translate content surface local coordinates to frame coordinates.
    pub fn translate_coordinate(&self, x: i32, y: i32) -> Result<(i32, i32), ProtocolError> {
        self.with_state(|state| Ok(state.translate_coordinate(x, y)))
    }

    /// Which part of the frame the point falls on, in frame coordinates.
    pub fn location_at(&self, x: f64, y: f64) -> Result<Location, ProtocolError> {
        self.with_state(|state| Ok(state.location_at(x, y)))
    }

    /// Register a popup grab on the given seat, so the popup is dismissed
    /// when the user interacts with the decorations.
    pub fn popup_grab(&self, seat_name: &str) -> Result<(), ProtocolError> {
        self.with_state(|state| state.popup_grab(seat_name))
    }

    /// Release the popup grab. Call this when you unmap a popup.
    pub fn popup_ungrab(&self, seat_name: &str) -> Result<(), ProtocolError> {
        self.with_state(|state| state.popup_ungrab(seat_name))
    }

    /// Destroy the frame.
    pub fn destroy(&self) -> Result<(), ProtocolError> {
        self.with_shared(|shared| shared.destroy(self.key))
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        let _ = self.destroy();
    }
}
