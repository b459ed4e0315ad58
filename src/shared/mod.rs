//! Shared geometry primitives used by the window core and the X11 driver.

pub mod geometry;

pub use geometry::{Geometry, Margins, Point, Size};
