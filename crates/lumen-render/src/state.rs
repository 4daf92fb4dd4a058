use std::fmt;

use crate::coords::Vec2;
use crate::paint::{BlendMode, Color};
use crate::shader::SharedShader;
use crate::texture::SharedTexture;

/// Geometry override for a draw.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned box of `size`, top-left at the draw position (before rotation).
    Rect { size: Vec2 },
    /// Disc inscribed in a `2r`x`2r` box, top-left at the draw position.
    Circle { radius: f32 },
}

impl Shape {
    #[inline]
    pub fn size(self) -> Vec2 {
        match self {
            Shape::Rect { size } => size,
            Shape::Circle { radius } => Vec2::splat(radius * 2.0),
        }
    }
}

/// Everything one draw call needs.
///
/// Borrows its sprite and shader; the renderer takes its own reference when the
/// state is submitted. Fields left unset mean: no sprite (state-only draw),
/// default shader, origin, no rotation, the target's blend mode, the sprite's
/// own geometry and native colors.
#[derive(Clone, Default)]
pub struct RenderState<'a> {
    pub sprite: Option<&'a SharedTexture>,
    pub shader: Option<&'a SharedShader>,
    /// Top-left of the geometry in viewport-local pixels.
    pub position: Vec2,
    /// Rotation about the geometry's center, radians.
    pub angle: f32,
    pub blend_mode: Option<BlendMode>,
    pub shape: Option<Shape>,
    pub color: Option<Color>,
}

impl<'a> RenderState<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// State drawing `texture` at the origin.
    pub fn sprite(texture: &'a SharedTexture) -> Self {
        Self::new().with_sprite(texture)
    }

    /// Solid fill of `shape`.
    pub fn shape(shape: Shape, color: Color) -> Self {
        Self::new().with_shape(shape).with_color(color)
    }

    pub fn with_sprite(mut self, texture: &'a SharedTexture) -> Self {
        self.sprite = Some(texture);
        self
    }

    pub fn with_shader(mut self, shader: &'a SharedShader) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = Some(mode);
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

impl fmt::Debug for RenderState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderState")
            .field("sprite", &self.sprite)
            .field("custom_shader", &self.shader.is_some())
            .field("position", &self.position)
            .field("angle", &self.angle)
            .field("blend_mode", &self.blend_mode)
            .field("shape", &self.shape)
            .field("color", &self.color)
            .finish()
    }
}
