//! Geometry types shared by render states and the rasterizer.
//!
//! Canonical CPU space:
//! - Pixels of the current draw target
//! - Origin top-left
//! - +X right, +Y down
//!
//! Draw positions are relative to the active viewport's origin.

mod rect;
mod vec2;
mod viewport;

pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
