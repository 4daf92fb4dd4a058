use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use anyhow::anyhow;

use super::{Backend, TextureStore};
use crate::config::ContextDefaults;
use crate::context::WindowHandle;
use crate::error::BackendError;
use crate::image::Image;
use crate::texture::TextureHandle;

/// Resource counters, for leak checks.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BackendStats {
    pub textures_allocated: usize,
    pub textures_released: usize,
    pub live_textures: usize,
    pub surfaces_created: usize,
    pub surfaces_destroyed: usize,
    pub presents: usize,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Fault {
    /// Next present fails once with a transient error.
    Transient,
    /// Every present reports the context as lost.
    Lost,
}

/// Headless backend that keeps presented frames in memory.
///
/// The platform windowing system is modelled by [`register_window`](Self::register_window):
/// only registered windows can receive a context.
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    windows: RefCell<HashMap<WindowHandle, (u32, u32)>>,
    textures: RefCell<HashMap<TextureHandle, Image>>,
    frames: RefCell<HashMap<WindowHandle, Image>>,
    faults: RefCell<HashMap<WindowHandle, Fault>>,
    update_faults: RefCell<HashSet<TextureHandle>>,
    next_texture: Cell<u64>,
    stats: Cell<BackendStats>,
}

/// Per-window state of the software backend.
#[derive(Debug)]
pub struct SoftwareSurface {
    window: WindowHandle,
    width: u32,
    height: u32,
    defaults: Option<ContextDefaults>,
}

impl SoftwareSurface {
    /// Baseline last applied through `apply_defaults`.
    pub fn defaults(&self) -> Option<ContextDefaults> {
        self.defaults
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces a platform window of the given drawable size.
    pub fn register_window(&self, window: WindowHandle, width: u32, height: u32) {
        self.windows.borrow_mut().insert(window, (width, height));
    }

    pub fn stats(&self) -> BackendStats {
        self.stats.get()
    }

    /// Copy of the last frame presented to `window`.
    pub fn presented_frame(&self, window: WindowHandle) -> Option<Image> {
        self.frames.borrow().get(&window).cloned()
    }

    /// Copy of the backend's mirror of a texture.
    pub fn texture_image(&self, handle: TextureHandle) -> Option<Image> {
        self.textures.borrow().get(&handle).cloned()
    }

    /// Makes the next present on `window` fail with a transient surface error.
    pub fn fail_next_present(&self, window: WindowHandle) {
        self.faults.borrow_mut().insert(window, Fault::Transient);
    }

    /// Makes the next upload to `handle` fail once.
    pub fn fail_next_update(&self, handle: TextureHandle) {
        self.update_faults.borrow_mut().insert(handle);
    }

    /// Simulates a lost device/context for `window`.
    pub fn lose_context(&self, window: WindowHandle) {
        self.faults.borrow_mut().insert(window, Fault::Lost);
    }

    fn bump(&self, f: impl FnOnce(&mut BackendStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

impl TextureStore for SoftwareBackend {
    fn allocate(&self, image: &Image) -> Result<TextureHandle, BackendError> {
        let handle = TextureHandle(self.next_texture.get());
        self.next_texture.set(handle.0 + 1);
        self.textures.borrow_mut().insert(handle, image.clone());
        self.bump(|s| {
            s.textures_allocated += 1;
            s.live_textures += 1;
        });
        Ok(handle)
    }

    fn update(&self, handle: TextureHandle, image: &Image) -> Result<(), BackendError> {
        if self.update_faults.borrow_mut().remove(&handle) {
            return Err(BackendError::Surface("texture upload failed".into()));
        }
        match self.textures.borrow_mut().get_mut(&handle) {
            Some(slot) => {
                slot.clone_from(image);
                Ok(())
            }
            None => Err(BackendError::Platform(anyhow!(
                "texture handle {} is not allocated",
                handle.0
            ))),
        }
    }

    fn release(&self, handle: TextureHandle) {
        if self.textures.borrow_mut().remove(&handle).is_some() {
            self.bump(|s| {
                s.textures_released += 1;
                s.live_textures -= 1;
            });
        } else {
            log::warn!("release of unknown texture handle {}", handle.0);
        }
    }
}

impl Backend for SoftwareBackend {
    type Surface = SoftwareSurface;

    fn create_surface(&self, window: WindowHandle) -> Result<SoftwareSurface, BackendError> {
        let (width, height) = self
            .windows
            .borrow()
            .get(&window)
            .copied()
            .ok_or_else(|| anyhow!("{window} is not a registered window"))?;

        // A fresh context starts without stale faults.
        self.faults.borrow_mut().remove(&window);
        self.bump(|s| s.surfaces_created += 1);

        Ok(SoftwareSurface {
            window,
            width,
            height,
            defaults: None,
        })
    }

    fn surface_size(&self, surface: &SoftwareSurface) -> (u32, u32) {
        (surface.width, surface.height)
    }

    fn resize_surface(
        &self,
        surface: &mut SoftwareSurface,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        surface.width = width;
        surface.height = height;
        self.windows
            .borrow_mut()
            .insert(surface.window, (width, height));
        Ok(())
    }

    fn apply_defaults(&self, surface: &mut SoftwareSurface, defaults: &ContextDefaults) {
        surface.defaults = Some(*defaults);
    }

    fn present(&self, surface: &mut SoftwareSurface, frame: &Image) -> Result<(), BackendError> {
        let fault = self.faults.borrow().get(&surface.window).copied();
        match fault {
            Some(Fault::Lost) => return Err(BackendError::ContextLost(surface.window)),
            Some(Fault::Transient) => {
                self.faults.borrow_mut().remove(&surface.window);
                return Err(BackendError::Surface("present timed out".into()));
            }
            None => {}
        }

        self.frames
            .borrow_mut()
            .insert(surface.window, frame.clone());
        self.bump(|s| s.presents += 1);
        Ok(())
    }

    fn destroy_surface(&self, window: WindowHandle, _surface: SoftwareSurface) {
        self.frames.borrow_mut().remove(&window);
        self.bump(|s| s.surfaces_destroyed += 1);
    }
}
