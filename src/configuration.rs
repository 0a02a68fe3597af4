bitflags::bitflags! {
    /// Logical window states announced by the compositor.
    ///
    /// Several of them combine freely, e.g. `ACTIVATED | TILED_LEFT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowState: u32 {
        const ACTIVATED = 1;
        const MAXIMIZED = 1 << 1;
        const FULLSCREEN = 1 << 2;
        const TILED_LEFT = 1 << 3;
        const TILED_RIGHT = 1 << 4;
        const TILED_TOP = 1 << 5;
        const TILED_BOTTOM = 1 << 6;
        const SUSPENDED = 1 << 7;
        const RESIZING = 1 << 8;
    }
}

impl WindowState {
    pub const TILED: WindowState = WindowState::TILED_LEFT
        .union(WindowState::TILED_RIGHT)
        .union(WindowState::TILED_TOP)
        .union(WindowState::TILED_BOTTOM);
}

/// A toplevel configuration proposed by the compositor.
///
/// It has to be acknowledged with [`Frame::acknowledge`](crate::Frame::acknowledge)
/// before any content derived from it is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    serial: u32,
    width: u32,
    height: u32,
    state: WindowState,
    bounds: Option<(u32, u32)>,
}

impl Configuration {
    /// A zero width or height leaves the choice of that dimension to the client.
    pub fn new(serial: u32, width: u32, height: u32, state: WindowState) -> Self {
        Configuration {
            serial,
            width,
            height,
            state,
            bounds: None,
        }
    }

    /// Attach the bounds the compositor recommends to stay within.
    pub fn with_bounds(mut self, width: u32, height: u32) -> Self {
        self.bounds = if width == 0 || height == 0 {
            None
        } else {
            Some((width, height))
        };
        self
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    /// Proposed window size, `None` if the compositor lets the client decide.
    pub fn size(&self) -> Option<(u32, u32)> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some((self.width, self.height))
        }
    }

    pub fn window_state(&self) -> WindowState {
        self.state
    }

    pub fn bounds(&self) -> Option<(u32, u32)> {
        self.bounds
    }

    /// A window is floating when it's not maximized, tiled, fullscreen, or
    /// in any similar way constrained to a fixed size.
    pub fn is_floating(&self) -> bool {
        !self
            .state
            .intersects(WindowState::MAXIMIZED | WindowState::FULLSCREEN | WindowState::TILED)
    }
}
