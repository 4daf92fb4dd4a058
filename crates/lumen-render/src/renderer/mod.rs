//! Draw-call accumulation and compositing.
//!
//! A renderer records draws in submission order and composites them on
//! `render()`, painter's-algorithm style: later draws land on top of earlier
//! ones through their blend mode.

mod raster;
mod target;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::state::RenderState;

pub use target::RenderTarget;

/// Core renderer capability.
pub trait Renderer {
    /// Drops pending draws and resets the target to its clear color immediately.
    fn clear(&mut self);

    /// Queues a draw. The state is consumed; nothing it borrows is retained
    /// beyond the renderer's own references.
    fn draw(&mut self, state: RenderState<'_>);

    /// Flushes queued draws to the backend.
    ///
    /// A no-op when nothing is pending. Fails with a backend error if the
    /// context is gone; transient failures leave the renderer usable.
    fn render(&mut self) -> Result<()>;
}

/// Where a renderer is in its frame cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Phase {
    /// Nothing pending.
    Ready,
    /// Draws or a clear are pending.
    Recording,
    /// The last `render()` flushed successfully; the next draw starts a new frame.
    Rendered,
    /// The bound context was destroyed or lost.
    Invalidated,
}

/// Shared-ownership renderer handle handed out by the manager.
pub type SharedRenderer<B> = Rc<RefCell<RenderTarget<B>>>;
