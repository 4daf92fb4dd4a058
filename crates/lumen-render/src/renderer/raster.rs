//! CPU compositor shared by every backend.

use crate::coords::{Rect, Vec2, Viewport};
use crate::image::Image;
use crate::paint::{BlendMode, Color};
use crate::shader::SharedShader;
use crate::state::{RenderState, Shape};
use crate::texture::SharedTexture;

/// A submitted draw with the target settings captured at submission time.
pub(super) struct DrawCall {
    /// `None` renders into the context backbuffer.
    pub target: Option<SharedTexture>,
    /// `None` covers the whole target.
    pub viewport: Option<Viewport>,
    pub blend_mode: BlendMode,
    pub wrapped: bool,

    pub sprite: Option<SharedTexture>,
    pub shader: Option<SharedShader>,
    pub position: Vec2,
    pub angle: f32,
    pub shape: Option<Shape>,
    pub color: Option<Color>,
}

impl DrawCall {
    pub(super) fn new(
        state: RenderState<'_>,
        target: Option<SharedTexture>,
        viewport: Option<Viewport>,
        target_blend: BlendMode,
        wrapped: bool,
    ) -> Self {
        Self {
            target,
            viewport,
            blend_mode: state.blend_mode.unwrap_or(target_blend),
            wrapped,
            sprite: state.sprite.cloned(),
            shader: state.shader.cloned(),
            position: state.position,
            angle: state.angle,
            shape: state.shape,
            color: state.color,
        }
    }

    /// Size of the drawn geometry; `None` for state-only draws.
    fn extent(&self) -> Option<Vec2> {
        match (self.shape, &self.sprite) {
            (Some(shape), _) => Some(shape.size()),
            (None, Some(tex)) => Some(Vec2::new(tex.width() as f32, tex.height() as f32)),
            (None, None) => None,
        }
    }
}

/// Composites one draw into `dst`.
///
/// `sprite` is the draw's sprite image, borrowed by the caller (it may be a
/// snapshot when the sprite is also the destination).
pub(super) fn composite(dst: &mut Image, call: &DrawCall, sprite: Option<&Image>) {
    let Some(size) = call.extent() else {
        return;
    };
    if size.x <= 0.0 || size.y <= 0.0 {
        return;
    }

    let (dw, dh) = dst.size();
    let viewport = call
        .viewport
        .unwrap_or(Viewport::full(dw, dh))
        .clipped_to(dw, dh);
    if viewport.is_empty() {
        return;
    }

    let center = viewport.origin() + call.position + size * 0.5;
    let Some(bounds) = Rect::rotated_bounds(center, size, call.angle).intersect(viewport.rect())
    else {
        return;
    };

    let x0 = bounds.origin.x.floor().max(0.0) as u32;
    let y0 = bounds.origin.y.floor().max(0.0) as u32;
    let x1 = (bounds.max().x.ceil() as u32).min(viewport.x + viewport.width);
    let y1 = (bounds.max().y.ceil() as u32).min(viewport.y + viewport.height);

    let local_box = Rect::from_origin_size(Vec2::ZERO, size);

    for y in y0..y1 {
        for x in x0..x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let local = (p - center).rotated(-call.angle) + size * 0.5;
            if !local_box.contains(local) {
                continue;
            }
            if let Some(Shape::Circle { radius }) = call.shape {
                if (local - Vec2::splat(radius)).length() > radius {
                    continue;
                }
            }

            let mut src = match sprite {
                Some(img) => {
                    let texel = img.sample(
                        local.x.floor() as i64,
                        local.y.floor() as i64,
                        call.wrapped,
                    );
                    match call.color {
                        Some(tint) => texel.modulate(tint),
                        None => texel,
                    }
                }
                None => call.color.unwrap_or(Color::WHITE),
            };

            if let Some(shader) = &call.shader {
                let uv = Vec2::new(local.x / size.x, local.y / size.y);
                src = shader.shade(src, uv);
            }

            let Ok(under) = dst.color_at(x, y) else {
                continue;
            };
            let _ = dst.put_color(x, y, call.blend_mode.apply(src, under));
        }
    }
}
