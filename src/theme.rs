use crate::capabilities::ResizeEdge;

const DECORATION_SIZE: u32 = 8;
const DECORATION_TOP_SIZE: u32 = 24;

/// Part of the decorated window a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Outside of the window
    None,
    /// On the content surface
    Inside,
    /// On the title bar, where a press starts a move
    TitleBar,
    /// On a border, where a press starts a resize
    Edge(ResizeEdge),
}

impl Location {
    pub fn resize_edge(self) -> Option<ResizeEdge> {
        match self {
            Location::Edge(edge) => Some(edge),
            _ => None,
        }
    }
}

/// Dimensions of the decorations drawn around the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Borders {
    pub size: u32,
    pub title_bar: u32,
}

impl Default for Borders {
    fn default() -> Self {
        Borders {
            size: DECORATION_SIZE,
            title_bar: DECORATION_TOP_SIZE,
        }
    }
}

impl Borders {
    /// Offset at which the contents are placed relative to the top-left
    /// corner of the decorations
    pub fn offset(&self) -> (u32, u32) {
        (self.size, self.title_bar)
    }

    /// Subtracts the border dimensions from the given dimensions.
    pub fn subtract(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.saturating_sub(self.size.saturating_mul(2)),
            height
                .saturating_sub(self.size)
                .saturating_sub(self.title_bar),
        )
    }

    /// Adds the border dimensions to the given dimensions, saturating at
    /// `u32::MAX`.
    pub fn add(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.saturating_add(self.size.saturating_mul(2)),
            height
                .saturating_add(self.size)
                .saturating_add(self.title_bar),
        )
    }

    /// Compute on which part of the window given point falls.
    ///
    /// `(x, y)` is relative to the top-left corner of the decorations and
    /// `(w, h)` is the size of the content.
    pub fn locate(&self, (x, y): (f64, f64), (w, h): (u32, u32)) -> Location {
        let (full_w, full_h) = self.add(w, h);
        if x < 0.0 || y < 0.0 || x > full_w as f64 || y > full_h as f64 {
            return Location::None;
        }
        let size = self.size as f64;
        let left = x <= size;
        let right = x > w.saturating_add(self.size) as f64;
        if y <= self.title_bar as f64 {
            // we are in the top part
            if left {
                Location::Edge(ResizeEdge::TopLeft)
            } else if right {
                Location::Edge(ResizeEdge::TopRight)
            } else if y <= size {
                Location::Edge(ResizeEdge::Top)
            } else {
                Location::TitleBar
            }
        } else if y <= self.title_bar.saturating_add(h) as f64 {
            if left {
                Location::Edge(ResizeEdge::Left)
            } else if right {
                Location::Edge(ResizeEdge::Right)
            } else {
                Location::Inside
            }
        } else if left {
            Location::Edge(ResizeEdge::BottomLeft)
        } else if right {
            Location::Edge(ResizeEdge::BottomRight)
        } else {
            Location::Edge(ResizeEdge::Bottom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_subtract_are_inverse() {
        let borders = Borders::default();
        assert_eq!(borders.add(800, 600), (816, 632));
        assert_eq!(borders.subtract(816, 632), (800, 600));
        assert_eq!(borders.subtract(4, 4), (0, 0));
    }

    #[test]
    fn huge_sizes_saturate() {
        let borders = Borders::default();
        assert_eq!(borders.add(u32::MAX, u32::MAX - 1), (u32::MAX, u32::MAX));
        let wide = Borders {
            size: u32::MAX,
            title_bar: u32::MAX,
        };
        assert_eq!(wide.subtract(100, 100), (0, 0));
        let content = (u32::MAX, 10);
        assert_eq!(borders.locate((50.0, 16.0), content), Location::TitleBar);
        assert_eq!(borders.locate((50.0, 30.0), content), Location::Inside);
    }

    #[test]
    fn locate_corners_and_bars() {
        let borders = Borders::default();
        let content = (100, 50);
        assert_eq!(borders.locate((2.0, 2.0), content), Location::Edge(ResizeEdge::TopLeft));
        assert_eq!(borders.locate((50.0, 2.0), content), Location::Edge(ResizeEdge::Top));
        assert_eq!(borders.locate((50.0, 16.0), content), Location::TitleBar);
        assert_eq!(borders.locate((112.0, 2.0), content), Location::Edge(ResizeEdge::TopRight));
        assert_eq!(borders.locate((2.0, 40.0), content), Location::Edge(ResizeEdge::Left));
        assert_eq!(borders.locate((50.0, 40.0), content), Location::Inside);
        assert_eq!(borders.locate((112.0, 40.0), content), Location::Edge(ResizeEdge::Right));
        assert_eq!(borders.locate((2.0, 80.0), content), Location::Edge(ResizeEdge::BottomLeft));
        assert_eq!(borders.locate((50.0, 80.0), content), Location::Edge(ResizeEdge::Bottom));
        assert_eq!(borders.locate((112.0, 80.0), content), Location::Edge(ResizeEdge::BottomRight));
        assert_eq!(borders.locate((500.0, 80.0), content), Location::None);
    }
}
