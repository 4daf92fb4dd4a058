use std::cell::Ref;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use super::raster::{self, DrawCall};
use super::{Phase, Renderer};
use crate::backend::Backend;
use crate::config::ContextDefaults;
use crate::context::{Context, WindowHandle};
use crate::coords::Viewport;
use crate::error::{BackendError, Result};
use crate::image::Image;
use crate::paint::{BlendMode, Color};
use crate::state::RenderState;
use crate::texture::SharedTexture;

/// Renderer with target-specific state: destination texture, blend mode,
/// viewport, wrap policy and clear color.
///
/// Without a bound texture it draws into its context's backbuffer and
/// `render()` presents it. With a texture bound it draws into the texture and
/// syncs the texture's backend copy instead.
///
/// Holds a weak back-reference to its context; the context is owned by the
/// manager.
pub struct RenderTarget<B: Backend> {
    window: WindowHandle,
    context: Weak<Context<B>>,

    texture: Option<SharedTexture>,
    blend_mode: BlendMode,
    viewport: Option<Viewport>,
    wrapped: bool,
    clear_color: Color,

    queue: Vec<DrawCall>,
    /// Textures written on the CPU whose backend copy is not yet updated.
    unsynced: Vec<SharedTexture>,
    /// The backbuffer changed since the last successful present.
    present_pending: bool,
    phase: Phase,
}

impl<B: Backend> RenderTarget<B> {
    pub(crate) fn new(context: &Rc<Context<B>>, defaults: &ContextDefaults) -> Self {
        Self {
            window: context.window(),
            context: Rc::downgrade(context),
            texture: None,
            blend_mode: defaults.blend_mode,
            viewport: None,
            wrapped: defaults.wrapped,
            clear_color: defaults.clear_color,
            queue: Vec::new(),
            unsynced: Vec::new(),
            present_pending: false,
            phase: Phase::Ready,
        }
    }

    /// Window of the context this renderer is bound to.
    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// Reports `Invalidated` as soon as the bound context is gone, even before
    /// the manager or a failed `render()` marked the renderer.
    pub fn phase(&self) -> Phase {
        if self.context_alive() {
            self.phase
        } else {
            Phase::Invalidated
        }
    }

    pub fn pending_draws(&self) -> usize {
        self.queue.len()
    }

    /// `false` once the bound context was destroyed or lost.
    pub fn is_valid(&self) -> bool {
        self.phase != Phase::Invalidated && self.context_alive()
    }

    fn context_alive(&self) -> bool {
        self.context.upgrade().is_some_and(|ctx| ctx.is_valid())
    }

    /// Queues `tex` for upload on the next `render()`.
    fn mark_unsynced(&mut self, tex: &SharedTexture) {
        if !self.unsynced.iter().any(|t| Rc::ptr_eq(t, tex)) {
            self.unsynced.push(Rc::clone(tex));
        }
    }

    /// Uploads every unsynced texture; the ones that fail stay queued.
    fn sync_textures(&mut self) -> Result<()> {
        let mut first_err = None;
        self.unsynced.retain(|tex| match tex.sync() {
            Ok(()) => false,
            Err(err) => {
                log::warn!("texture sync failed, retrying on next render: {err}");
                first_err.get_or_insert(err);
                true
            }
        });
        first_err.map_or(Ok(()), Err)
    }

    /// Marks the renderer unusable and drops pending work.
    pub(crate) fn invalidate(&mut self) {
        if self.phase != Phase::Invalidated {
            log::debug!("renderer bound to {} invalidated", self.window);
        }
        self.phase = Phase::Invalidated;
        self.queue.clear();
        self.present_pending = false;
    }

    /// Binds the renderer to another (freshly initialized) context.
    pub(crate) fn rebind(&mut self, context: &Rc<Context<B>>) {
        self.window = context.window();
        self.context = Rc::downgrade(context);
        self.queue.clear();
        self.present_pending = false;
        self.phase = Phase::Ready;
    }

    /// Binds a destination texture; `None` targets the backbuffer.
    ///
    /// Affects draws submitted after this call only.
    pub fn set_texture(&mut self, texture: Option<SharedTexture>) {
        self.texture = texture;
    }

    pub fn texture(&self) -> Option<&SharedTexture> {
        self.texture.as_ref()
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Whether out-of-range sprite sampling wraps (tiles) or clamps to the edge.
    pub fn set_wrapped(&mut self, wrapped: bool) {
        self.wrapped = wrapped;
    }

    pub fn wrapped(&self) -> bool {
        self.wrapped
    }

    /// Clips subsequent draws to `viewport` and makes positions relative to its origin.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    /// Restores the full-target viewport.
    pub fn reset_viewport(&mut self) {
        self.viewport = None;
    }

    /// The effective viewport, resolved against the current target size.
    pub fn viewport(&self) -> Viewport {
        let (w, h) = self.target_size();
        self.viewport.unwrap_or(Viewport::full(w, h)).clipped_to(w, h)
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    fn target_size(&self) -> (u32, u32) {
        match (&self.texture, self.context.upgrade()) {
            (Some(tex), _) => (tex.width(), tex.height()),
            (None, Some(ctx)) => ctx.size(),
            (None, None) => (0, 0),
        }
    }

    fn live_context(&mut self) -> Result<Rc<Context<B>>> {
        match self.context.upgrade() {
            Some(ctx) if ctx.is_valid() && self.phase != Phase::Invalidated => Ok(ctx),
            _ => {
                self.invalidate();
                Err(BackendError::ContextLost(self.window).into())
            }
        }
    }
}

/// Composites `call` into `dst`, snapshotting the sprite when it is also the destination.
fn run_call(dst: &SharedTexture, call: &DrawCall) {
    let snapshot: Option<Image> = match &call.sprite {
        Some(sprite) if Rc::ptr_eq(sprite, dst) => Some(sprite.image().clone()),
        _ => None,
    };
    let borrowed: Option<Ref<'_, Image>> = match snapshot {
        Some(_) => None,
        None => call.sprite.as_ref().map(|s| s.image()),
    };
    let sprite = snapshot.as_ref().or(borrowed.as_deref());
    raster::composite(&mut dst.image_mut(), call, sprite);
}

impl<B: Backend> Renderer for RenderTarget<B> {
    fn clear(&mut self) {
        self.queue.clear();
        let Some(ctx) = self.context.upgrade().filter(|c| c.is_valid()) else {
            self.invalidate();
            return;
        };
        if self.phase == Phase::Invalidated {
            return;
        }
        match self.texture.clone() {
            Some(tex) => {
                tex.image_mut().fill(self.clear_color);
                self.mark_unsynced(&tex);
            }
            None => {
                ctx.backbuffer_mut().fill(self.clear_color);
                self.present_pending = true;
            }
        }
        self.phase = Phase::Recording;
    }

    fn draw(&mut self, state: RenderState<'_>) {
        if !self.is_valid() {
            self.invalidate();
            log::trace!("draw on invalidated renderer for {} dropped", self.window);
            return;
        }
        self.queue.push(DrawCall::new(
            state,
            self.texture.clone(),
            self.viewport,
            self.blend_mode,
            self.wrapped,
        ));
        self.phase = Phase::Recording;
    }

    fn render(&mut self) -> Result<()> {
        let ctx = self.live_context()?;
        if self.queue.is_empty() && !self.present_pending && self.unsynced.is_empty() {
            return Ok(());
        }

        let calls = mem::take(&mut self.queue);
        for call in &calls {
            match &call.target {
                Some(tex) => {
                    run_call(tex, call);
                    self.mark_unsynced(tex);
                }
                None => {
                    let sprite = call.sprite.as_ref().map(|s| s.image());
                    raster::composite(&mut ctx.backbuffer_mut(), call, sprite.as_deref());
                    self.present_pending = true;
                }
            }
        }
        drop(calls);

        let synced = self.sync_textures();

        if self.present_pending {
            if let Err(err) = ctx.present() {
                if !ctx.is_valid() {
                    self.invalidate();
                }
                return Err(err);
            }
            self.present_pending = false;
        }

        synced?;
        self.phase = Phase::Rendered;
        Ok(())
    }
}

impl<B: Backend> fmt::Debug for RenderTarget<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTarget")
            .field("window", &self.window)
            .field("texture", &self.texture)
            .field("blend_mode", &self.blend_mode)
            .field("viewport", &self.viewport)
            .field("wrapped", &self.wrapped)
            .field("clear_color", &self.clear_color)
            .field("pending_draws", &self.queue.len())
            .field("unsynced_textures", &self.unsynced.len())
            .field("phase", &self.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SoftwareBackend, TextureStore};
    use crate::coords::Vec2;
    use crate::image::BitDepth;
    use crate::state::Shape;
    use crate::texture::Texture;

    const W: WindowHandle = WindowHandle(7);

    fn setup(w: u32, h: u32) -> (Rc<SoftwareBackend>, Rc<Context<SoftwareBackend>>) {
        let backend = Rc::new(SoftwareBackend::new());
        backend.register_window(W, w, h);
        let ctx = Rc::new(Context::new(W, Rc::clone(&backend)).unwrap());
        (backend, ctx)
    }

    fn texture(backend: &Rc<SoftwareBackend>, w: u32, h: u32) -> SharedTexture {
        let store: Rc<dyn TextureStore> = backend.clone();
        Rc::new(Texture::new(Image::new(w, h, BitDepth::ThirtyTwo), store).unwrap())
    }

    fn unit_square(color: Color) -> RenderState<'static> {
        RenderState::shape(Shape::Rect { size: Vec2::new(1.0, 1.0) }, color)
    }

    fn presented_rgba(backend: &SoftwareBackend, x: u32, y: u32) -> [u8; 4] {
        let frame = backend.presented_frame(W).unwrap();
        frame.color_at(x, y).unwrap().to_rgba8()
    }

    #[test]
    fn draws_composite_in_submission_order() {
        let red = Color::from_straight(1.0, 0.0, 0.0, 1.0);
        let blue_half = Color::from_straight(0.0, 0.0, 1.0, 0.5);

        let (backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.draw(unit_square(red));
        r.draw(unit_square(blue_half).with_blend_mode(BlendMode::Alpha));
        r.render().unwrap();
        assert_eq!(presented_rgba(&backend, 0, 0), [128, 0, 128, 255]);

        let (backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.draw(unit_square(blue_half).with_blend_mode(BlendMode::Alpha));
        r.draw(unit_square(red));
        r.render().unwrap();
        assert_eq!(presented_rgba(&backend, 0, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn clear_discards_pending_draws() {
        let (backend, ctx) = setup(2, 2);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.set_clear_color(Color::from_rgba8(0, 255, 0, 255));

        r.draw(RenderState::shape(
            Shape::Rect { size: Vec2::new(2.0, 2.0) },
            Color::WHITE,
        ));
        r.clear();
        assert_eq!(r.pending_draws(), 0);
        r.render().unwrap();

        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(presented_rgba(&backend, x, y), [0, 255, 0, 255]);
            }
        }
    }

    #[test]
    fn render_with_nothing_pending_is_a_no_op() {
        let (backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.render().unwrap();
        assert_eq!(backend.stats().presents, 0);
        assert_eq!(r.phase(), Phase::Ready);

        r.draw(unit_square(Color::WHITE));
        r.render().unwrap();
        r.render().unwrap();
        assert_eq!(backend.stats().presents, 1);
        assert_eq!(r.phase(), Phase::Rendered);
    }

    #[test]
    fn rebinding_the_texture_only_affects_later_draws() {
        let (backend, ctx) = setup(1, 1);
        let offscreen = texture(&backend, 1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());

        r.draw(unit_square(Color::WHITE));
        r.set_texture(Some(Rc::clone(&offscreen)));
        r.draw(unit_square(Color::from_rgba8(0, 0, 255, 255)));
        r.render().unwrap();

        assert_eq!(presented_rgba(&backend, 0, 0), [255, 255, 255, 255]);
        assert_eq!(offscreen.get_pixel(0, 0).unwrap(), 0xffff_0000);

        // The backend mirror was synced.
        let mirror = backend.texture_image(offscreen.texture_id().unwrap()).unwrap();
        assert_eq!(mirror.pixel(0, 0).unwrap(), 0xffff_0000);
    }

    #[test]
    fn clear_on_a_bound_texture_reaches_the_backend_copy() {
        let green = Color::from_rgba8(0, 255, 0, 255);
        let (backend, ctx) = setup(1, 1);
        let tex = texture(&backend, 2, 2);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.set_texture(Some(Rc::clone(&tex)));

        r.draw(RenderState::shape(
            Shape::Rect { size: Vec2::new(2.0, 2.0) },
            Color::WHITE,
        ));
        r.render().unwrap();

        r.set_clear_color(green);
        r.clear();
        r.render().unwrap();
        assert_eq!(r.phase(), Phase::Rendered);
        assert!(!tex.is_dirty());

        let mirror = backend.texture_image(tex.texture_id().unwrap()).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(mirror.pixel(x, y).unwrap(), 0xff00_ff00);
                assert_eq!(mirror.pixel(x, y).unwrap(), tex.get_pixel(x, y).unwrap());
            }
        }
        assert_eq!(backend.stats().presents, 0);
    }

    #[test]
    fn failed_texture_sync_is_retried_on_next_render() {
        let (backend, ctx) = setup(1, 1);
        let tex = texture(&backend, 1, 1);
        let handle = tex.texture_id().unwrap();
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.set_texture(Some(Rc::clone(&tex)));
        r.draw(unit_square(Color::WHITE));

        backend.fail_next_update(handle);
        let err = r.render().unwrap_err();
        assert!(err.is_backend());
        assert!(r.is_valid());
        assert_eq!(backend.texture_image(handle).unwrap().pixel(0, 0).unwrap(), 0);

        // Nothing new queued; the pending upload alone drives this render.
        r.render().unwrap();
        assert_eq!(r.phase(), Phase::Rendered);
        assert_eq!(
            backend.texture_image(handle).unwrap().pixel(0, 0).unwrap(),
            0xffff_ffff
        );
    }

    #[test]
    fn released_context_shows_through_phase_and_draw() {
        let (_backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        assert_eq!(r.phase(), Phase::Ready);

        ctx.release();
        assert_eq!(r.phase(), Phase::Invalidated);
        r.draw(unit_square(Color::WHITE));
        assert_eq!(r.pending_draws(), 0);
        r.clear();
        assert_eq!(r.phase(), Phase::Invalidated);
    }

    #[test]
    fn texture_can_be_drawn_onto_itself() {
        let (backend, ctx) = setup(1, 1);
        let tex = texture(&backend, 2, 1);
        tex.image_mut().put_color(0, 0, Color::WHITE).unwrap();

        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.set_texture(Some(Rc::clone(&tex)));
        r.draw(RenderState::sprite(&tex).at(1.0, 0.0));
        r.render().unwrap();

        assert_eq!(tex.image().color_at(1, 0).unwrap(), Color::WHITE);
        assert_eq!(backend.stats().presents, 0);
    }

    #[test]
    fn viewport_resolves_against_the_target() {
        let (_backend, ctx) = setup(4, 3);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        assert_eq!(r.viewport(), Viewport::full(4, 3));

        r.set_viewport(Viewport::new(2, 1, 10, 10));
        assert_eq!(r.viewport(), Viewport::new(2, 1, 2, 2));

        r.reset_viewport();
        assert_eq!(r.viewport(), Viewport::full(4, 3));
    }

    #[test]
    fn transient_present_failure_is_retried() {
        let (backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.draw(unit_square(Color::WHITE));

        backend.fail_next_present(W);
        let err = r.render().unwrap_err();
        assert!(err.is_backend());
        assert!(r.is_valid());

        r.render().unwrap();
        assert_eq!(backend.stats().presents, 1);
        assert_eq!(presented_rgba(&backend, 0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn lost_context_invalidates_for_good() {
        let (backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        r.draw(unit_square(Color::WHITE));

        backend.lose_context(W);
        assert!(r.render().is_err());
        assert_eq!(r.phase(), Phase::Invalidated);
        assert!(!ctx.is_valid());

        r.draw(unit_square(Color::WHITE));
        assert_eq!(r.pending_draws(), 0);
        assert!(matches!(
            r.render(),
            Err(crate::error::RenderError::Backend(BackendError::ContextLost(w))) if w == W
        ));
    }

    #[test]
    fn dropped_context_fails_render() {
        let (_backend, ctx) = setup(1, 1);
        let mut r = RenderTarget::new(&ctx, &ContextDefaults::default());
        drop(ctx);
        assert!(!r.is_valid());
        assert!(r.render().is_err());
    }

    #[test]
    fn new_target_starts_from_defaults() {
        let (_backend, ctx) = setup(1, 1);
        let defaults = ContextDefaults {
            clear_color: Color::WHITE,
            blend_mode: BlendMode::Additive,
            wrapped: true,
        };
        let r = RenderTarget::new(&ctx, &defaults);
        assert_eq!(r.clear_color(), Color::WHITE);
        assert_eq!(r.blend_mode(), BlendMode::Additive);
        assert!(r.wrapped());
        assert!(r.texture().is_none());
    }
}
