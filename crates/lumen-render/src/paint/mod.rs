//! Color representation and compositing.
//!
//! Colors are linear premultiplied RGBA while in flight; images store straight
//! alpha bytes and convert at the boundary.

mod blend;
mod color;

pub use blend::BlendMode;
pub use color::Color;
