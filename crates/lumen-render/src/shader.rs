//! Per-fragment shading hook.
//!
//! Shader compilation belongs to the GPU backend; the CPU compositor only needs
//! a function from (source color, uv) to output color.

use std::rc::Rc;

use crate::coords::Vec2;
use crate::paint::Color;

/// Post-processes each source fragment before blending.
///
/// `uv` is the fragment's position inside the drawn geometry, normalized to `[0, 1]`.
pub trait Shader {
    fn shade(&self, color: Color, uv: Vec2) -> Color;
}

pub type SharedShader = Rc<dyn Shader>;

impl<F> Shader for F
where
    F: Fn(Color, Vec2) -> Color,
{
    #[inline]
    fn shade(&self, color: Color, uv: Vec2) -> Color {
        self(color, uv)
    }
}

/// The default shader: returns the fragment unchanged.
#[derive(Debug, Copy, Clone, Default)]
pub struct PassThrough;

impl Shader for PassThrough {
    #[inline]
    fn shade(&self, color: Color, _uv: Vec2) -> Color {
        color
    }
}

/// Converts fragments to luminance, keeping alpha.
#[derive(Debug, Copy, Clone, Default)]
pub struct Grayscale;

impl Shader for Grayscale {
    fn shade(&self, color: Color, _uv: Vec2) -> Color {
        let l = 0.299 * color.r + 0.587 * color.g + 0.114 * color.b;
        Color::from_premul(l, l, l, color.a)
    }
}
