//! Area Client
//!
//! Lifecycle core for managed X11 windows, plus the x11rb adapter that lets
//! the `area-client` binary run it on a live server.

pub mod config;
pub mod shared;
pub mod wm;
pub mod x11;
pub mod x11_async;
