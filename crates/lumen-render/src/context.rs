use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::backend::Backend;
use crate::config::ContextDefaults;
use crate::error::{BackendError, Result};
use crate::image::{BitDepth, Image};

/// Opaque key for a platform window.
///
/// The windowing system hands these out; the render layer never creates or
/// destroys windows.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct WindowHandle(pub u64);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window #{}", self.0)
    }
}

impl From<winit::window::WindowId> for WindowHandle {
    fn from(id: winit::window::WindowId) -> Self {
        WindowHandle(u64::from(id))
    }
}

/// A platform rendering context bound to one window.
///
/// Owns the backend surface and the backbuffer that untargeted renderers draw
/// into. Once destroyed (or lost) the context stays invalid; renderers holding a
/// back-reference can no longer present through it.
pub struct Context<B: Backend> {
    window: WindowHandle,
    backend: Rc<B>,

    /// `None` after release.
    surface: RefCell<Option<B::Surface>>,

    backbuffer: RefCell<Image>,
    valid: Cell<bool>,
}

impl<B: Backend> Context<B> {
    pub(crate) fn new(window: WindowHandle, backend: Rc<B>) -> Result<Self> {
        let surface = backend.create_surface(window)?;
        let (width, height) = backend.surface_size(&surface);
        log::debug!("created render context for {window} ({width}x{height})");

        Ok(Self {
            window,
            backend,
            surface: RefCell::new(Some(surface)),
            backbuffer: RefCell::new(Image::new(width, height, BitDepth::ThirtyTwo)),
            valid: Cell::new(true),
        })
    }

    #[inline]
    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// `false` once the context was destroyed or reported lost.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    /// Backbuffer size in pixels.
    pub fn size(&self) -> (u32, u32) {
        self.backbuffer.borrow().size()
    }

    /// The composited frame as of the last render.
    pub fn backbuffer(&self) -> Ref<'_, Image> {
        self.backbuffer.borrow()
    }

    pub(crate) fn backbuffer_mut(&self) -> RefMut<'_, Image> {
        self.backbuffer.borrow_mut()
    }

    /// Runs `f` against the backend surface, failing if the context is gone.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut B::Surface) -> R) -> Result<R> {
        let mut slot = self.surface.borrow_mut();
        match slot.as_mut() {
            Some(surface) if self.is_valid() => Ok(f(surface)),
            _ => Err(BackendError::ContextLost(self.window).into()),
        }
    }

    pub(crate) fn apply_defaults(&self, defaults: &ContextDefaults) -> Result<()> {
        self.with_surface(|surface| self.backend.apply_defaults(surface, defaults))?;
        log::debug!("applied default render state to {}", self.window);
        Ok(())
    }

    /// Resizes the surface and reallocates the backbuffer (contents are reset).
    pub(crate) fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.with_surface(|surface| self.backend.resize_surface(surface, width, height))??;
        *self.backbuffer.borrow_mut() = Image::new(width, height, BitDepth::ThirtyTwo);
        Ok(())
    }

    /// Presents the backbuffer. A lost context invalidates `self` permanently.
    pub(crate) fn present(&self) -> Result<()> {
        let frame = self.backbuffer.borrow();
        let result = self.with_surface(|surface| self.backend.present(surface, &frame))?;
        match result {
            Ok(()) => Ok(()),
            Err(err @ BackendError::ContextLost(_)) => {
                log::warn!("{} lost its render context", self.window);
                self.valid.set(false);
                Err(err.into())
            }
            Err(err) => {
                log::warn!("present to {} failed: {err}", self.window);
                Err(err.into())
            }
        }
    }

    /// Invalidates the context and hands the surface back to the backend.
    ///
    /// Idempotent.
    pub(crate) fn release(&self) {
        self.valid.set(false);
        if let Some(surface) = self.surface.borrow_mut().take() {
            self.backend.destroy_surface(self.window, surface);
            log::debug!("destroyed render context for {}", self.window);
        }
    }
}

impl<B: Backend> Drop for Context<B> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<B: Backend> fmt::Debug for Context<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("window", &self.window)
            .field("size", &self.size())
            .field("valid", &self.valid.get())
            .finish()
    }
}
