use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::context::WindowHandle;
use crate::manager::{RendererId, TextureId};

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Identifies a resource that a lookup failed to find.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKey {
    Window(WindowHandle),
    Renderer(RendererId),
    Texture(TextureId),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Window(w) => write!(f, "render context for {w}"),
            ResourceKey::Renderer(id) => write!(f, "renderer {id}"),
            ResourceKey::Texture(id) => write!(f, "texture {id}"),
        }
    }
}

/// Errors reported by the render layer.
///
/// Lookup and lifecycle errors always indicate caller misuse of ids or window
/// handles; they are never recovered internally.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("a render context is already initialized for {0}")]
    AlreadyInitialized(WindowHandle),

    #[error("{0} not found")]
    NotFound(ResourceKey),

    #[error("no render context is current")]
    NoCurrentContext,

    #[error("pixel ({x}, {y}) is outside the {width}x{height} image")]
    OutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("failed to decode image {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl RenderError {
    /// Returns `true` for failures raised by the backend rather than by the caller.
    pub fn is_backend(&self) -> bool {
        matches!(self, RenderError::Backend(_))
    }
}

/// Failures raised by a GPU/platform backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The context is gone for good; renderers bound to it stay unusable until
    /// the context is destroyed and initialized again.
    #[error("render context for {0} is no longer valid")]
    ContextLost(WindowHandle),

    /// Transient acquire/present failure. Retrying next frame is expected to work.
    #[error("surface error: {0}")]
    Surface(String),

    /// Device or surface creation failed.
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}
