//! Shared helpers used across the window manager.

mod geometry;
pub mod x11rb;

pub use self::geometry::{Point, Rectangle, Size};
