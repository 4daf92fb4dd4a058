//! Backends own the platform side of contexts and textures.
//!
//! - `software`: headless, deterministic; the reference the tests run against
//! - `gpu`: presents through a wgpu surface bound to a winit window
//!
//! Both composite on the CPU (see `renderer`); a backend only stores texture
//! copies and puts finished frames on screen.

mod software;
mod gpu;

pub use software::{BackendStats, SoftwareBackend, SoftwareSurface};
pub use gpu::{GpuInit, SurfaceErrorAction, WgpuBackend, WgpuSurface};

use crate::config::ContextDefaults;
use crate::context::WindowHandle;
use crate::error::BackendError;
use crate::image::Image;
use crate::texture::TextureHandle;

/// Backend storage for texture copies.
pub trait TextureStore {
    fn allocate(&self, image: &Image) -> Result<TextureHandle, BackendError>;

    fn update(&self, handle: TextureHandle, image: &Image) -> Result<(), BackendError>;

    /// Called exactly once per allocated handle.
    fn release(&self, handle: TextureHandle);
}

/// A rendering backend.
///
/// Methods take `&self`; implementations use interior mutability because the
/// backend is shared by the manager, its contexts and every texture.
pub trait Backend: TextureStore + 'static {
    /// Platform rendering context bound to one window.
    type Surface;

    fn create_surface(&self, window: WindowHandle) -> Result<Self::Surface, BackendError>;

    /// Drawable size in physical pixels.
    fn surface_size(&self, surface: &Self::Surface) -> (u32, u32);

    fn resize_surface(
        &self,
        surface: &mut Self::Surface,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    /// Resets global state (blend, clear color, sampling) to a known baseline.
    fn apply_defaults(&self, surface: &mut Self::Surface, defaults: &ContextDefaults);

    /// Puts `frame` on screen. May block on the platform's present call.
    fn present(&self, surface: &mut Self::Surface, frame: &Image) -> Result<(), BackendError>;

    fn destroy_surface(&self, window: WindowHandle, surface: Self::Surface);
}
