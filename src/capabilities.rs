bitflags::bitflags! {
    /// Window operations the compositor currently permits on a frame.
    ///
    /// An update from the compositor replaces the previous value as a
    /// whole, it is never merged with it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const MOVE = 1;
        const RESIZE = 1 << 1;
        const MINIMIZE = 1 << 2;
        const MAXIMIZE = 1 << 3;
        const FULLSCREEN = 1 << 4;
        const CLOSE = 1 << 5;
        const WINDOW_MENU = 1 << 6;
    }
}

impl Default for Capabilities {
    /// Until told otherwise, everything is allowed.
    fn default() -> Self {
        Capabilities::all()
    }
}

/// Edge or corner grabbed by an interactive resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResizeEdge {
    #[default]
    None,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeEdge {
    /// Whether this edge moves the top border of the window.
    pub fn is_top(self) -> bool {
        matches!(self, ResizeEdge::Top | ResizeEdge::TopLeft | ResizeEdge::TopRight)
    }

    /// Whether this edge moves the left border of the window.
    pub fn is_left(self) -> bool {
        matches!(self, ResizeEdge::Left | ResizeEdge::TopLeft | ResizeEdge::BottomLeft)
    }
}
