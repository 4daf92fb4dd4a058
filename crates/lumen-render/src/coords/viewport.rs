use super::{Rect, Vec2};

/// Pixel rectangle of a draw target that drawing is clipped to.
///
/// Draw positions are interpreted relative to `x`/`y`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Viewport covering a whole `width`x`height` target.
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Restricts the viewport to a `width`x`height` target.
    pub fn clipped_to(self, width: u32, height: u32) -> Viewport {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        Viewport::new(x, y, x1 - x, y1 - y)
    }

    #[inline]
    pub fn origin(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    #[inline]
    pub fn rect(self) -> Rect {
        Rect::new(self.x as f32, self.y as f32, self.width as f32, self.height as f32)
    }

    /// Maps normalized `[0, 1]` viewport coordinates to target pixels.
    #[inline]
    pub fn map_normalized(self, uv: Vec2) -> Vec2 {
        self.origin() + Vec2::new(uv.x * self.width as f32, uv.y * self.height as f32)
    }
}
