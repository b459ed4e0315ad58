//! Geometry primitives
//!
//! Rectangles, points, sizes and border margins shared between the window
//! core and the X11 driver. Widths and heights are unsigned like on the wire.

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A position on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// Border thickness on each side of a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Margins {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn uniform(width: u32) -> Self {
        Self::new(width, width, width, width)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_parts(pos: Point, size: Size) -> Self {
        Self::new(pos.x, pos.y, size.width, size.height)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn with_position(self, pos: Point) -> Self {
        Self { x: pos.x, y: pos.y, ..self }
    }

    pub fn with_size(self, size: Size) -> Self {
        Self { width: size.width, height: size.height, ..self }
    }

    pub fn translated(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        !(self.right() <= other.x
            || other.right() <= self.x
            || self.bottom() <= other.y
            || other.bottom() <= self.y)
    }

    /// Smallest rectangle containing both
    pub fn united(&self, other: &Geometry) -> Geometry {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Geometry::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    /// Expand outwards by the given margins
    pub fn grown_by(&self, m: Margins) -> Geometry {
        Geometry::new(
            self.x - m.left as i32,
            self.y - m.top as i32,
            self.width + m.horizontal(),
            self.height + m.vertical(),
        )
    }

    /// Shrink inwards by the given margins, never below zero size
    pub fn shrunk_by(&self, m: Margins) -> Geometry {
        Geometry::new(
            self.x + m.left as i32,
            self.y + m.top as i32,
            self.width.saturating_sub(m.horizontal()),
            self.height.saturating_sub(m.vertical()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_then_shrink_is_identity() {
        let g = Geometry::new(10, 20, 300, 200);
        let m = Margins::new(2, 30, 2, 2);
        assert_eq!(g.grown_by(m).shrunk_by(m), g);
    }

    #[test]
    fn test_shrink_saturates() {
        let g = Geometry::new(0, 0, 3, 3);
        let shrunk = g.shrunk_by(Margins::uniform(5));
        assert_eq!(shrunk.size(), Size::new(0, 0));
    }

    #[test]
    fn test_united_ignores_empty() {
        let a = Geometry::new(0, 0, 10, 10);
        let b = Geometry::new(20, 5, 10, 10);
        assert_eq!(a.united(&b), Geometry::new(0, 0, 30, 15));
        assert_eq!(a.united(&Geometry::default()), a);
    }

    #[test]
    fn test_intersects_edges_do_not_touch() {
        let a = Geometry::new(0, 0, 10, 10);
        assert!(!a.intersects(&Geometry::new(10, 0, 5, 5)));
        assert!(a.intersects(&Geometry::new(9, 9, 5, 5)));
    }
}
