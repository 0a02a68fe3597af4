use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, trace, warn};

use crate::config::Config;
use crate::error::{Error, ErrorKind, ProtocolError};
use crate::frame::{Frame, FrameKey, FrameState};
use crate::request::{Event, FrameRequest, SurfaceRequest};
use crate::transport::{CompositorEvent, SurfaceId, Transport, TransportEvent};

/// State shared between a [`Context`] and the [`Frame`] handles it gave out.
///
/// The frames only hold a weak reference to it.
#[derive(Debug)]
pub(crate) struct Shared {
    config: Config,
    frames: IndexMap<SurfaceId, FrameState>,
    outgoing: VecDeque<(SurfaceId, SurfaceRequest)>,
    events: VecDeque<Event>,
}

impl Shared {
    fn new(config: Config) -> Shared {
        Shared {
            config,
            frames: IndexMap::new(),
            outgoing: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Run `f` on the frame matching `key`, then publish what it has to say.
    pub(crate) fn with_frame<R>(
        &mut self,
        key: FrameKey,
        f: impl FnOnce(&mut FrameState) -> Result<R, ProtocolError>,
    ) -> Result<R, ProtocolError> {
        let (result, notices) = {
            let frame = self
                .frames
                .get_mut(&key.surface)
                .filter(|frame| frame.key() == key)
                .ok_or(ProtocolError::FrameDestroyed)?;
            let result = f(frame);
            (result, frame.drain_notices())
        };
        for event in notices {
            self.push_event(event);
        }
        result
    }

    pub(crate) fn queue(&mut self, surface: SurfaceId, request: SurfaceRequest) {
        trace!(%surface, ?request, "queued");
        self.outgoing.push_back((surface, request));
    }

    /// Validate a request on the frame and forward it.
    pub(crate) fn submit(&mut self, key: FrameKey, request: FrameRequest) -> Result<(), ProtocolError> {
        let request = self.with_frame(key, |frame| frame.request(request))?;
        debug!(surface = %key.surface, ?request, "frame request");
        if let Some(request) = request.to_surface_request() {
            self.queue(key.surface, request);
        }
        Ok(())
    }

    pub(crate) fn destroy(&mut self, key: FrameKey) -> Result<(), ProtocolError> {
        match self.frames.get(&key.surface) {
            Some(frame) if frame.key() == key => {}
            _ => return Err(ProtocolError::FrameDestroyed),
        }
        if let Some(mut frame) = self.frames.shift_remove(&key.surface) {
            frame.destroy()?;
        }
        debug!(surface = %key.surface, "frame destroyed");
        self.queue(key.surface, SurfaceRequest::DestroySurface);
        Ok(())
    }

    /// Route an inbound compositor event to its frame.
    fn route(&mut self, surface: SurfaceId, event: CompositorEvent) -> Result<(), ProtocolError> {
        let key = self
            .frames
            .get(&surface)
            .map(FrameState::key)
            .ok_or(ProtocolError::UnknownIdentity(surface))?;
        trace!(%surface, ?event, "routing event");
        match event {
            CompositorEvent::Configure(configuration) => {
                self.with_frame(key, |frame| frame.on_configure(configuration))
            }
            CompositorEvent::CapabilitiesChanged(capabilities) => {
                self.with_frame(key, |frame| frame.set_capabilities(capabilities))
            }
            CompositorEvent::CloseRequested => self.with_frame(key, FrameState::close_requested),
        }
    }

    fn push_event(&mut self, event: Event) {
        if let Event::Redraw { surface } = event {
            let queued = self
                .events
                .iter()
                .any(|e| matches!(e, Event::Redraw { surface: s } if *s == surface));
            if queued {
                return;
            }
        }
        self.events.push_back(event);
    }

    /// Destroy every frame, leaving the registry empty.
    fn teardown(&mut self) {
        let frames: Vec<(SurfaceId, FrameState)> = self.frames.drain(..).collect();
        for (surface, mut frame) in frames {
            let _ = frame.destroy();
            self.queue(surface, SurfaceRequest::DestroySurface);
            self.events.push_back(Event::Destroyed { surface });
        }
    }
}

/// A decoration context, one per connection to the display server.
///
/// The context owns the [`Transport`] and the registry of live frames.
/// It routes compositor events to the frames, buffers the requests
/// they produce until [`flush`](#method.flush), and queues [`Event`]s
/// for the application to handle.
///
/// Dropping the context destroys every frame it created.
#[derive(Debug)]
pub struct Context<T: Transport> {
    transport: T,
    shared: Rc<RefCell<Shared>>,
    next_generation: u64,
    failure: Option<Error>,
    inbound: Vec<TransportEvent>,
}

impl<T: Transport> Context<T> {
    /// Create a new context using the given transport.
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, Config::default())
    }

    pub fn with_config(transport: T, config: Config) -> Self {
        Context {
            transport,
            shared: Rc::new(RefCell::new(Shared::new(config))),
            next_generation: 0,
            failure: None,
            inbound: Vec::new(),
        }
    }

    pub fn config(&self) -> Config {
        self.shared.borrow().config.clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The error that brought this context down, if any.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Number of live frames.
    pub fn frame_count(&self) -> usize {
        self.shared.borrow().frames.len()
    }

    fn check_failed(&self) -> Result<(), Error> {
        match self.failure {
            Some(ref err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Record a fatal error and tear everything down.
    fn fail(&mut self, err: Error) -> Error {
        if self.failure.is_none() {
            error!(kind = ?err.kind(), "{}", err.message());
            self.failure = Some(err.clone());
            self.shared.borrow_mut().events.push_back(Event::Error(err.clone()));
            self.teardown();
        }
        err
    }

    /// Create a decorated toplevel.
    ///
    /// The frame starts in [`Lifecycle::Created`](crate::Lifecycle::Created);
    /// call [`Frame::map`] to receive the initial configuration.
    pub fn create_frame(&mut self, title: &str, parent: Option<&Frame>) -> Result<Frame, Error> {
        self.check_failed()?;
        // requests queued before this one have to reach the transport first
        self.forward()?;
        let parent = parent.map(Frame::surface);
        let surface = self.transport.create_surface(title, parent)?;

        if self.shared.borrow().frames.contains_key(&surface) {
            let err = Error::new(
                ErrorKind::Desynchronized,
                format!("transport reused live surface {surface}"),
            );
            return Err(self.fail(err));
        }

        self.next_generation += 1;
        let key = FrameKey {
            surface,
            generation: self.next_generation,
        };
        let mut shared = self.shared.borrow_mut();
        let state = FrameState::new(key, title, parent, &shared.config);
        shared.frames.insert(surface, state);
        debug!(%surface, title, "frame created");
        Ok(Frame::new(key, Rc::downgrade(&self.shared)))
    }

    /// Deliver a compositor event to the frame it is addressed to.
    ///
    /// In strict mode an event for an unknown surface fails with
    /// [`ProtocolError::UnknownIdentity`], otherwise it is logged and
    /// dropped. The context stays usable in both cases: the caller fed
    /// the event in, so it decides whether that is fatal.
    /// [`dispatch`](#method.dispatch) does treat it as fatal.
    ///
    /// A compositor sending a non-increasing configure serial always
    /// brings the context down.
    pub fn dispatch_event(
        &mut self,
        surface: SurfaceId,
        event: CompositorEvent,
    ) -> Result<(), ProtocolError> {
        let result = self.shared.borrow_mut().route(surface, event);
        match result {
            Err(ProtocolError::UnknownIdentity(id)) if !self.shared.borrow().config.strict => {
                warn!(surface = %id, "dropping event for unknown surface");
                Ok(())
            }
            Err(err @ ProtocolError::StaleConfigure { .. }) => {
                self.fail(Error::compositor(format!("surface {surface}: {err}")));
                Err(err)
            }
            other => other,
        }
    }

    /// Read the events available on the transport and route them.
    ///
    /// Returns the number of events processed. Any failure here is fatal.
    pub fn dispatch(&mut self) -> Result<usize, Error> {
        self.check_failed()?;
        let mut inbound = std::mem::take(&mut self.inbound);
        if let Err(err) = self.transport.poll_events(&mut inbound) {
            return Err(self.fail(err));
        }
        let count = inbound.len();
        for event in inbound.drain(..) {
            match event {
                TransportEvent::Frame { surface, event } => {
                    if let Err(err) = self.dispatch_event(surface, event) {
                        if let Some(failure) = self.failure.clone() {
                            return Err(failure);
                        }
                        let kind = match err {
                            ProtocolError::UnknownIdentity(_) => ErrorKind::Desynchronized,
                            _ => ErrorKind::CompositorError,
                        };
                        return Err(self.fail(Error::new(kind, err.to_string())));
                    }
                }
                TransportEvent::ConnectionError(message) => {
                    return Err(self.fail(Error::wayland(message)));
                }
            }
        }
        self.inbound = inbound;
        Ok(count)
    }

    /// Hand every buffered request to the transport, in order.
    fn forward(&mut self) -> Result<(), Error> {
        loop {
            let next = self.shared.borrow_mut().outgoing.pop_front();
            let Some((surface, request)) = next else {
                return Ok(());
            };
            if let Err(err) = self.transport.send(surface, &request) {
                warn!(%surface, ?request, "transport refused request: {}", err);
                self.shared.borrow_mut().outgoing.push_front((surface, request));
                return Err(err);
            }
        }
    }

    /// Drain the buffered requests to the transport and flush it.
    ///
    /// On failure the unsent requests stay queued, so the call can be
    /// retried.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.check_failed()?;
        self.forward()?;
        self.transport.flush()
    }

    /// Pop the oldest pending event.
    pub fn next_event(&self) -> Option<Event> {
        self.shared.borrow_mut().events.pop_front()
    }

    pub fn drain_events(&self) -> Vec<Event> {
        self.shared.borrow_mut().events.drain(..).collect()
    }

    /// Destroy every live frame.
    ///
    /// Each frame gets an [`Event::Destroyed`] and any further call on
    /// its handle fails with [`ProtocolError::FrameDestroyed`].
    pub fn teardown(&mut self) {
        let mut shared = self.shared.borrow_mut();
        if !shared.frames.is_empty() {
            debug!(frames = shared.frames.len(), "tearing down context");
        }
        shared.teardown();
    }
}

impl<T: Transport> Drop for Context<T> {
    fn drop(&mut self) {
        self.teardown();
        if self.failure.is_none() {
            let _ = self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{Capabilities, ResizeEdge};
    use crate::configuration::{Configuration, WindowState};
    use crate::frame::Lifecycle;
    use crate::transport::testing::Recorder;
    use pretty_assertions::assert_eq;

    fn context() -> Context<Recorder> {
        Context::with_config(Recorder::default(), Config::default().decorate(false))
    }

    fn configure(serial: u32, w: u32, h: u32, state: WindowState) -> CompositorEvent {
        CompositorEvent::Configure(Configuration::new(serial, w, h, state))
    }

    #[test]
    fn configure_ack_commit_cycle() {
        let mut ctx = context();
        let frame = ctx.create_frame("hello", None).unwrap();
        let id = frame.surface();
        frame.map().unwrap();
        ctx.dispatch_event(id, configure(1, 800, 600, WindowState::ACTIVATED))
            .unwrap();

        let event = ctx.next_event().unwrap();
        let Event::Configure { configuration, .. } = event else {
            panic!("expected a configure, got {event:?}");
        };
        frame.acknowledge(configuration.serial()).unwrap();
        frame.commit().unwrap();
        ctx.flush().unwrap();

        assert_eq!(
            ctx.transport().sent_to(id),
            vec![
                SurfaceRequest::Map,
                SurfaceRequest::AckConfigure(1),
                SurfaceRequest::CommitSurface,
            ]
        );
        assert_eq!(ctx.transport().flushes, 1);
        assert_eq!(frame.lifecycle(), Lifecycle::Configured);
    }

    #[test]
    fn commit_survives_newer_pending_configuration() {
        let mut ctx = context();
        let frame = ctx.create_frame("hello", None).unwrap();
        let id = frame.surface();
        ctx.dispatch_event(id, configure(1, 800, 600, WindowState::ACTIVATED))
            .unwrap();
        frame.acknowledge(1).unwrap();
        frame.commit().unwrap();

        ctx.dispatch_event(id, configure(2, 400, 300, WindowState::MAXIMIZED))
            .unwrap();
        frame.commit().unwrap();
        assert_eq!(
            frame.configuration().unwrap().and_then(|c| c.size()),
            Some((800, 600))
        );
        assert_eq!(frame.dimensions().unwrap(), (800, 600));
        assert_eq!(frame.acknowledge(1), Err(ProtocolError::UnknownSerial {
            expected: Some(2),
            got: 1
        }));
    }

    #[test]
    fn capabilities_gate_requests() {
        let mut ctx = context();
        let frame = ctx.create_frame("caps", None).unwrap();
        let id = frame.surface();
        ctx.dispatch_event(
            id,
            CompositorEvent::CapabilitiesChanged(Capabilities::MOVE | Capabilities::CLOSE),
        )
        .unwrap();
        assert_eq!(
            frame.request_maximize(),
            Err(ProtocolError::CapabilityDenied(Capabilities::MAXIMIZE))
        );
        assert_eq!(
            frame.request_resize(ResizeEdge::Left),
            Err(ProtocolError::CapabilityDenied(Capabilities::RESIZE))
        );
        frame.request_move().unwrap();
        ctx.flush().unwrap();
        assert_eq!(
            ctx.transport().sent_to(id),
            vec![SurfaceRequest::BeginInteractiveMove]
        );
        let events = ctx.drain_events();
        assert!(events.contains(&Event::Capabilities {
            surface: id,
            capabilities: Capabilities::MOVE | Capabilities::CLOSE
        }));
    }

    #[test]
    fn unknown_identity_strict_and_lenient() {
        let mut ctx = context();
        let ghost = SurfaceId::new(42);
        assert_eq!(
            ctx.dispatch_event(ghost, CompositorEvent::CloseRequested),
            Err(ProtocolError::UnknownIdentity(ghost))
        );

        let mut lenient = Context::with_config(Recorder::default(), Config::default().strict(false));
        assert_eq!(lenient.dispatch_event(ghost, CompositorEvent::CloseRequested), Ok(()));
    }

    #[test]
    fn direct_unknown_identity_leaves_context_usable() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        assert_eq!(
            ctx.dispatch_event(SurfaceId::new(42), CompositorEvent::CloseRequested),
            Err(ProtocolError::UnknownIdentity(SurfaceId::new(42)))
        );
        assert!(ctx.failure().is_none());
        assert_eq!(ctx.frame_count(), 1);
        frame.set_title("still alive").unwrap();
        ctx.flush().unwrap();
    }

    #[test]
    fn dispatch_to_unknown_surface_is_fatal() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        ctx.transport_mut().inbound.push_back(TransportEvent::Frame {
            surface: SurfaceId::new(99),
            event: CompositorEvent::CloseRequested,
        });
        let err = ctx.dispatch().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Desynchronized);
        assert_eq!(ctx.frame_count(), 0);
        assert_eq!(frame.commit(), Err(ProtocolError::FrameDestroyed));
        assert_eq!(ctx.flush(), Err(err.clone()));
        assert!(matches!(ctx.next_event(), Some(Event::Error(e)) if e == err));
    }

    #[test]
    fn connection_error_tears_down() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        let id = frame.surface();
        ctx.transport_mut()
            .inbound
            .push_back(TransportEvent::ConnectionError("broken pipe".into()));
        let err = ctx.dispatch().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WaylandError);
        let events = ctx.drain_events();
        assert_eq!(events, vec![Event::Error(err.clone()), Event::Destroyed { surface: id }]);
        assert!(ctx.create_frame("two", None).is_err());
    }

    #[test]
    fn stale_serial_is_a_compositor_error() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        let id = frame.surface();
        ctx.dispatch_event(id, configure(3, 0, 0, WindowState::empty()))
            .unwrap();
        assert_eq!(
            ctx.dispatch_event(id, configure(2, 0, 0, WindowState::empty())),
            Err(ProtocolError::StaleConfigure { last: 3, got: 2 })
        );
        assert_eq!(
            ctx.failure().map(Error::kind),
            Some(ErrorKind::CompositorError)
        );
        assert_eq!(frame.lifecycle(), Lifecycle::Destroyed);
    }

    #[test]
    fn failed_send_keeps_requests_queued() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        let id = frame.surface();
        frame.set_title("two").unwrap();
        ctx.transport_mut().fail_sends = true;
        assert!(ctx.flush().is_err());
        ctx.transport_mut().fail_sends = false;
        ctx.flush().unwrap();
        assert_eq!(
            ctx.transport().sent_to(id),
            vec![SurfaceRequest::SetTitle("two".into())]
        );
    }

    #[test]
    fn dropping_the_handle_destroys_the_frame() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        let id = frame.surface();
        drop(frame);
        assert_eq!(ctx.frame_count(), 0);
        ctx.flush().unwrap();
        assert_eq!(ctx.transport().sent_to(id), vec![SurfaceRequest::DestroySurface]);
        assert_eq!(
            ctx.dispatch_event(id, CompositorEvent::CloseRequested),
            Err(ProtocolError::UnknownIdentity(id))
        );
    }

    #[test]
    fn reused_identity_does_not_reach_stale_handle() {
        let mut ctx = context();
        let first = ctx.create_frame("one", None).unwrap();
        let id = first.surface();
        first.destroy().unwrap();
        // make the transport hand out the same identity again
        ctx.transport_mut().next_id -= 1;
        let second = ctx.create_frame("two", None).unwrap();
        assert_eq!(second.surface(), id);
        assert_eq!(first.title(), Err(ProtocolError::FrameDestroyed));
        assert_eq!(first.destroy(), Err(ProtocolError::FrameDestroyed));
        assert_eq!(second.title().unwrap(), "two");
    }

    #[test]
    fn redraws_are_coalesced() {
        let mut ctx = context();
        let frame = ctx.create_frame("one", None).unwrap();
        let id = frame.surface();
        frame.set_title("two").unwrap();
        frame.set_title("three").unwrap();
        let redraws = ctx
            .drain_events()
            .into_iter()
            .filter(|e| *e == Event::Redraw { surface: id })
            .count();
        assert_eq!(redraws, 1);
    }

    #[test]
    fn parent_is_forwarded_on_creation() {
        let mut ctx = context();
        let parent = ctx.create_frame("parent", None).unwrap();
        let child = ctx.create_frame("child", Some(&parent)).unwrap();
        assert_eq!(child.parent().unwrap(), Some(parent.surface()));
        assert_eq!(
            ctx.transport().created[1],
            (child.surface(), "child".to_owned(), Some(parent.surface()))
        );
    }
}
