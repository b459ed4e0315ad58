//! X11 adapter
//!
//! Implements the window core's [`Display`](crate::wm::display::Display)
//! transport on x11rb and drives a [`Workspace`](crate::wm::Workspace) from
//! server events.

pub mod atoms;
pub mod connection;
pub mod display;
pub mod events;
pub mod properties;

pub use atoms::Atoms;
pub use connection::{WmSelection, become_wm};
pub use display::{Shared, X11Display};
pub use events::X11Driver;
