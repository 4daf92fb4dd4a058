use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::backend::TextureStore;
use crate::error::Result;
use crate::image::{BitDepth, Image};

/// Shared-ownership texture handle.
///
/// The manager's pool holds one reference and every issued handle holds one.
/// The backend copy is released when the last reference is dropped.
pub type SharedTexture = Rc<Texture>;

/// Opaque backend handle for a texture's GPU copy.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct TextureHandle(pub u64);

/// A CPU image paired with its backend copy.
pub struct Texture {
    image: RefCell<Image>,

    /// `None` once released, or when the backend declined to allocate.
    handle: Cell<Option<TextureHandle>>,

    /// CPU image changed since the last upload.
    dirty: Cell<bool>,

    store: Rc<dyn TextureStore>,
}

impl Texture {
    pub(crate) fn new(image: Image, store: Rc<dyn TextureStore>) -> Result<Self> {
        let handle = store.allocate(&image)?;
        Ok(Self {
            image: RefCell::new(image),
            handle: Cell::new(Some(handle)),
            dirty: Cell::new(false),
            store,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.borrow().width()
    }

    pub fn height(&self) -> u32 {
        self.image.borrow().height()
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.image.borrow().bit_depth()
    }

    /// Backend handle, `None` when unassigned.
    pub fn texture_id(&self) -> Option<TextureHandle> {
        self.handle.get()
    }

    /// Read-only view of the pixel buffer, if allocated.
    pub fn pixels(&self) -> Option<Ref<'_, [u8]>> {
        Ref::filter_map(self.image.borrow(), |img| img.pixels()).ok()
    }

    /// Bounds-checked read of a packed pixel value.
    pub fn get_pixel(&self, x: u32, y: u32) -> Result<u32> {
        self.image.borrow().pixel(x, y)
    }

    /// Bounds-checked write of a packed pixel value. Reaches the backend on the next [`sync`](Self::sync).
    pub fn set_pixel(&self, x: u32, y: u32, value: u32) -> Result<()> {
        self.image.borrow_mut().set_pixel(x, y, value)?;
        self.dirty.set(true);
        Ok(())
    }

    pub fn image(&self) -> Ref<'_, Image> {
        self.image.borrow()
    }

    /// Mutable access to the CPU image; marks the texture for re-upload.
    pub fn image_mut(&self) -> RefMut<'_, Image> {
        self.dirty.set(true);
        self.image.borrow_mut()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Uploads pending CPU changes to the backend copy.
    pub fn sync(&self) -> Result<()> {
        if !self.dirty.get() {
            return Ok(());
        }
        if let Some(handle) = self.handle.get() {
            self.store.update(handle, &self.image.borrow())?;
        }
        self.dirty.set(false);
        Ok(())
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log::debug!("releasing texture handle {}", handle.0);
            self.store.release(handle);
        }
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let image = self.image.borrow();
        f.debug_struct("Texture")
            .field("width", &image.width())
            .field("height", &image.height())
            .field("depth", &image.bit_depth())
            .field("handle", &self.handle.get())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}
