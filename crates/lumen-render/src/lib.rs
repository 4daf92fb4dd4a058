//! Lumen render layer.
//!
//! Owns the resource-lifetime side of rendering: one context per window,
//! pooled renderers and textures with stable ids, and the per-draw
//! [`RenderState`] passed down to a [`Renderer`].
//!
//! Compositing happens on the CPU; a [`Backend`](backend::Backend) stores
//! texture copies and presents finished frames. [`SoftwareBackend`] is
//! headless and deterministic; [`WgpuBackend`] presents to winit windows.

pub mod backend;
pub mod config;
pub mod context;
pub mod coords;
pub mod error;
pub mod image;
pub mod logging;
pub mod manager;
pub mod paint;
pub mod renderer;
pub mod shader;
pub mod state;
pub mod texture;

mod pool;

pub use backend::{GpuInit, SoftwareBackend, WgpuBackend};
pub use config::{ContextDefaults, ManagerConfig};
pub use context::{Context, WindowHandle};
pub use error::{BackendError, RenderError, ResourceKey, Result};
pub use image::{BitDepth, Image};
pub use manager::{ContextManager, RendererId, TextureId};
pub use paint::{BlendMode, Color};
pub use renderer::{Phase, RenderTarget, Renderer, SharedRenderer};
pub use shader::{Shader, SharedShader};
pub use state::{RenderState, Shape};
pub use texture::{SharedTexture, Texture, TextureHandle};
