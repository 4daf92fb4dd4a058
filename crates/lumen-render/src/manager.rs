//! Ownership of contexts, renderers and textures.
//!
//! One `ContextManager` per graphics thread. It owns:
//! - one [`Context`] per window handle
//! - a pool of renderers keyed by [`RendererId`]
//! - a pool of textures keyed by [`TextureId`]
//!
//! Renderers and textures are handed out as shared handles; the pool keeps one
//! reference of its own until the id is freed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use crate::backend::{Backend, TextureStore};
use crate::config::ManagerConfig;
use crate::context::{Context, WindowHandle};
use crate::error::{RenderError, ResourceKey, Result};
use crate::image::{BitDepth, Image};
use crate::pool::{Pool, PoolKey};
use crate::renderer::{RenderTarget, SharedRenderer};
use crate::texture::{SharedTexture, Texture};

/// Stable id of a pooled renderer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RendererId(pub u32);

/// Stable id of a pooled texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureId(pub u32);

impl fmt::Display for RendererId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl PoolKey for RendererId {
    fn from_index(index: usize) -> Self {
        RendererId(index as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl PoolKey for TextureId {
    fn from_index(index: usize) -> Self {
        TextureId(index as u32)
    }
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns the rendering contexts and resource pools for one graphics thread.
///
/// Everything handed out is `Rc`-based, so neither the manager nor its
/// resources can cross threads. Debug builds also assert that every call comes
/// from the thread that created the manager.
pub struct ContextManager<B: Backend> {
    backend: Rc<B>,
    config: ManagerConfig,

    contexts: HashMap<WindowHandle, Rc<Context<B>>>,
    current: Option<WindowHandle>,

    renderers: Pool<RendererId, RefCell<RenderTarget<B>>>,
    textures: Pool<TextureId, Texture>,

    owner: ThreadId,
}

impl<B: Backend> ContextManager<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ManagerConfig::default())
    }

    pub fn with_config(backend: B, config: ManagerConfig) -> Self {
        Self::from_shared(Rc::new(backend), config)
    }

    /// Builds a manager over a backend the caller keeps a handle to.
    pub fn from_shared(backend: Rc<B>, config: ManagerConfig) -> Self {
        Self {
            backend,
            config,
            contexts: HashMap::new(),
            current: None,
            renderers: Pool::new(),
            textures: Pool::new(),
            owner: thread::current().id(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[inline]
    fn assert_owner(&self) {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "ContextManager called from a thread other than its owner"
        );
    }

    // ---- contexts --------------------------------------------------------

    /// Creates and registers a context for `window`.
    ///
    /// Fails with `AlreadyInitialized` if the window already has one.
    pub fn initialize_context(&mut self, window: WindowHandle) -> Result<Rc<Context<B>>> {
        self.assert_owner();
        if self.contexts.contains_key(&window) {
            return Err(RenderError::AlreadyInitialized(window));
        }

        let ctx = Rc::new(Context::new(window, Rc::clone(&self.backend))?);
        self.contexts.insert(window, Rc::clone(&ctx));

        if self.current.is_none() && self.config.activate_first_context {
            self.make_current(window)?;
        }
        Ok(ctx)
    }

    /// Releases the context for `window`.
    ///
    /// Renderers bound to it are invalidated but stay in the pool until freed.
    pub fn destroy_context(&mut self, window: WindowHandle) -> Result<()> {
        self.assert_owner();
        let ctx = self
            .contexts
            .remove(&window)
            .ok_or(RenderError::NotFound(ResourceKey::Window(window)))?;

        let mut invalidated = 0usize;
        for (_, renderer) in self.renderers.iter() {
            // A renderer borrowed right now, or freed but still held, sees the
            // released context through its own `phase()`/`draw()`.
            if let Ok(mut target) = renderer.try_borrow_mut() {
                if target.window() == window {
                    target.invalidate();
                    invalidated += 1;
                }
            }
        }

        ctx.release();
        if self.current == Some(window) {
            self.current = None;
        }
        log::debug!("{window}: context destroyed, {invalidated} renderer(s) invalidated");
        Ok(())
    }

    pub fn get_context(&self, window: WindowHandle) -> Result<Rc<Context<B>>> {
        self.contexts
            .get(&window)
            .cloned()
            .ok_or(RenderError::NotFound(ResourceKey::Window(window)))
    }

    pub fn has_context(&self, window: WindowHandle) -> bool {
        self.contexts.contains_key(&window)
    }

    /// Activates the context for `window` and applies the default state to it.
    pub fn make_current(&mut self, window: WindowHandle) -> Result<()> {
        self.assert_owner();
        let ctx = self.get_context(window)?;
        self.current = Some(window);
        ctx.apply_defaults(&self.config.defaults)
    }

    pub fn current_context(&self) -> Option<Rc<Context<B>>> {
        self.current.and_then(|w| self.contexts.get(&w).cloned())
    }

    /// Resets the current context's backend state to the configured baseline.
    ///
    /// A no-op when no context is current.
    pub fn apply_defaults(&self) -> Result<()> {
        self.assert_owner();
        match self.current_context() {
            Some(ctx) => ctx.apply_defaults(&self.config.defaults),
            None => Ok(()),
        }
    }

    /// Resizes the surface and backbuffer of `window`'s context.
    pub fn resize_context(&mut self, window: WindowHandle, width: u32, height: u32) -> Result<()> {
        self.assert_owner();
        let ctx = self.get_context(window)?;
        ctx.resize(width, height)?;
        log::debug!("{window}: context resized to {width}x{height}");
        Ok(())
    }

    pub fn windows(&self) -> impl Iterator<Item = WindowHandle> + '_ {
        self.contexts.keys().copied()
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    // ---- renderers -------------------------------------------------------

    /// Creates a renderer bound to the current context.
    pub fn create_renderer(&mut self) -> Result<(RendererId, SharedRenderer<B>)> {
        let window = self.current.ok_or(RenderError::NoCurrentContext)?;
        self.create_renderer_for(window)
    }

    /// Creates a renderer bound to `window`'s context.
    pub fn create_renderer_for(
        &mut self,
        window: WindowHandle,
    ) -> Result<(RendererId, SharedRenderer<B>)> {
        self.assert_owner();
        let ctx = self.get_context(window)?;
        let renderer = Rc::new(RefCell::new(RenderTarget::new(&ctx, &self.config.defaults)));
        let id = self.renderers.insert(Rc::clone(&renderer));
        log::debug!("renderer {id} created for {window}");
        Ok((id, renderer))
    }

    pub fn get_renderer(&self, id: RendererId) -> Result<SharedRenderer<B>> {
        self.renderers
            .get(id)
            .cloned()
            .ok_or(RenderError::NotFound(ResourceKey::Renderer(id)))
    }

    /// Drops the pool's reference. Handles the caller still holds stay usable.
    pub fn free_renderer(&mut self, id: RendererId) -> Result<()> {
        self.assert_owner();
        self.renderers
            .remove(id)
            .ok_or(RenderError::NotFound(ResourceKey::Renderer(id)))?;
        log::debug!("renderer {id} freed");
        Ok(())
    }

    /// Binds an invalidated renderer to the (re-initialized) context of `window`.
    pub fn rebind_renderer(&mut self, id: RendererId, window: WindowHandle) -> Result<()> {
        self.assert_owner();
        let renderer = self.get_renderer(id)?;
        let ctx = self.get_context(window)?;
        renderer.borrow_mut().rebind(&ctx);
        log::debug!("renderer {id} rebound to {window}");
        Ok(())
    }

    pub fn renderer_count(&self) -> usize {
        self.renderers.len()
    }

    // ---- textures --------------------------------------------------------

    /// Creates a zeroed texture.
    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        depth: BitDepth,
    ) -> Result<(TextureId, SharedTexture)> {
        self.create_texture_from_image(Image::new(width, height, depth))
    }

    pub fn create_texture_from_image(&mut self, image: Image) -> Result<(TextureId, SharedTexture)> {
        self.assert_owner();
        let store: Rc<dyn TextureStore> = self.backend.clone();
        let (w, h, depth) = (image.width(), image.height(), image.bit_depth());

        let texture = Rc::new(Texture::new(image, store)?);
        let id = self.textures.insert(Rc::clone(&texture));
        log::debug!("texture {id} created ({w}x{h}, {}-bit)", depth.bits());
        Ok((id, texture))
    }

    /// Decodes an image file into a new texture.
    pub fn create_texture_from_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(TextureId, SharedTexture)> {
        let image = Image::from_file(path)?;
        self.create_texture_from_image(image)
    }

    pub fn get_texture(&self, id: TextureId) -> Result<SharedTexture> {
        self.textures
            .get(id)
            .cloned()
            .ok_or(RenderError::NotFound(ResourceKey::Texture(id)))
    }

    /// Drops the pool's reference. The backend copy is released once no
    /// renderer or caller holds the texture any more.
    pub fn free_texture(&mut self, id: TextureId) -> Result<()> {
        self.assert_owner();
        self.textures
            .remove(id)
            .ok_or(RenderError::NotFound(ResourceKey::Texture(id)))?;
        log::debug!("texture {id} freed");
        Ok(())
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl<B: Backend> Drop for ContextManager<B> {
    fn drop(&mut self) {
        for (_, renderer) in self.renderers.iter() {
            if let Ok(mut target) = renderer.try_borrow_mut() {
                target.invalidate();
            }
        }
        self.renderers.clear();
        self.textures.clear();

        let leaked = self.contexts.len();
        for (_, ctx) in self.contexts.drain() {
            ctx.release();
        }
        if leaked > 0 {
            log::debug!("context manager dropped with {leaked} live context(s); released");
        }
    }
}

impl<B: Backend> fmt::Debug for ContextManager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("contexts", &self.contexts.len())
            .field("current", &self.current)
            .field("renderers", &self.renderers.len())
            .field("textures", &self.textures.len())
            .finish()
    }
}
