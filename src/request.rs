use crate::capabilities::{Capabilities, ResizeEdge};
use crate::configuration::Configuration;
use crate::error::Error;
use crate::transport::SurfaceId;

/// An ask from a [`Frame`](crate::Frame) to its [`Context`](crate::Context).
///
/// Window-management requests are forwarded to the transport, the
/// others are turned into [`Event`]s for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRequest {
    /// Emulate a close request from the compositor.
    Close,
    /// Commit the surface, its content matches the current configuration.
    Commit,
    Minimize,
    Maximize,
    Unmaximize,
    Fullscreen,
    Unfullscreen,
    /// Show the compositor window menu at the given frame coordinates.
    ShowWindowMenu { x: i32, y: i32 },
    /// Start an interactive move.
    Move,
    /// Start an interactive resize.
    Resize(ResizeEdge),
}

impl FrameRequest {
    /// The capability the compositor must grant for this request.
    pub fn required_capability(&self) -> Option<Capabilities> {
        match *self {
            FrameRequest::Close => Some(Capabilities::CLOSE),
            FrameRequest::Commit => None,
            FrameRequest::Minimize => Some(Capabilities::MINIMIZE),
            FrameRequest::Maximize | FrameRequest::Unmaximize => Some(Capabilities::MAXIMIZE),
            FrameRequest::Fullscreen | FrameRequest::Unfullscreen => {
                Some(Capabilities::FULLSCREEN)
            }
            FrameRequest::ShowWindowMenu { .. } => Some(Capabilities::WINDOW_MENU),
            FrameRequest::Move => Some(Capabilities::MOVE),
            FrameRequest::Resize(_) => Some(Capabilities::RESIZE),
        }
    }

    /// Whether this request comes from the user interacting with the decorations.
    pub(crate) fn is_decoration_interaction(&self) -> bool {
        matches!(
            *self,
            FrameRequest::Move | FrameRequest::Resize(_) | FrameRequest::ShowWindowMenu { .. }
        )
    }

    /// The transport request carrying this ask, if any.
    pub(crate) fn to_surface_request(self) -> Option<SurfaceRequest> {
        match self {
            FrameRequest::Close => None,
            FrameRequest::Commit => Some(SurfaceRequest::CommitSurface),
            FrameRequest::Minimize => Some(SurfaceRequest::SetMinimized),
            FrameRequest::Maximize => Some(SurfaceRequest::SetMaximized(true)),
            FrameRequest::Unmaximize => Some(SurfaceRequest::SetMaximized(false)),
            FrameRequest::Fullscreen => Some(SurfaceRequest::SetFullscreen(true)),
            FrameRequest::Unfullscreen => Some(SurfaceRequest::SetFullscreen(false)),
            FrameRequest::ShowWindowMenu { x, y } => Some(SurfaceRequest::ShowWindowMenu { x, y }),
            FrameRequest::Move => Some(SurfaceRequest::BeginInteractiveMove),
            FrameRequest::Resize(edge) => Some(SurfaceRequest::BeginInteractiveResize(edge)),
        }
    }
}

/// A request sent to the transport for a given surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceRequest {
    /// Initial commit without a buffer, this triggers the first configure.
    Map,
    DestroySurface,
    AckConfigure(u32),
    CommitSurface,
    SetMinSize(u32, u32),
    SetMaxSize(u32, u32),
    SetTitle(String),
    SetAppId(String),
    SetParent(Option<SurfaceId>),
    BeginInteractiveMove,
    BeginInteractiveResize(ResizeEdge),
    SetMinimized,
    SetMaximized(bool),
    SetFullscreen(bool),
    ShowWindowMenu { x: i32, y: i32 },
}

/// A notification for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A new configuration was received. The application should compute
    /// its new content, [`acknowledge`](crate::Frame::acknowledge) the
    /// configuration and [`commit`](crate::Frame::commit).
    Configure {
        surface: SurfaceId,
        configuration: Configuration,
    },
    /// The compositor changed the set of allowed operations.
    Capabilities {
        surface: SurfaceId,
        capabilities: Capabilities,
    },
    /// The window was requested to be closed.
    Close { surface: SurfaceId },
    /// The main surface should be committed for a decoration change to
    /// take effect.
    Commit { surface: SurfaceId },
    /// The decorations need to be painted again.
    Redraw { surface: SurfaceId },
    /// Any mapped popup that has a grab on the given seat should be
    /// dismissed.
    DismissPopup { surface: SurfaceId, seat_name: String },
    /// The frame was destroyed by the context.
    Destroyed { surface: SurfaceId },
    /// A fatal error occurred, the context has been torn down.
    Error(Error),
}

impl Event {
    pub fn surface(&self) -> Option<SurfaceId> {
        match *self {
            Event::Configure { surface, .. }
            | Event::Capabilities { surface, .. }
            | Event::Close { surface }
            | Event::Commit { surface }
            | Event::Redraw { surface }
            | Event::DismissPopup { surface, .. }
            | Event::Destroyed { surface } => Some(surface),
            Event::Error(_) => None,
        }
    }
}
