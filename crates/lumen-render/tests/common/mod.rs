#![allow(dead_code)]

use std::rc::Rc;

use lumen_render::logging::{LoggingConfig, init_logging};
use lumen_render::{ContextManager, ManagerConfig, SoftwareBackend, WindowHandle};

pub const MAIN: WindowHandle = WindowHandle(1);
pub const SIDE: WindowHandle = WindowHandle(2);

/// A manager over a software backend with `MAIN` (4x4) and `SIDE` (2x2) registered.
pub fn setup() -> (Rc<SoftwareBackend>, ContextManager<SoftwareBackend>) {
    init_logging(LoggingConfig::for_tests());

    let backend = Rc::new(SoftwareBackend::new());
    backend.register_window(MAIN, 4, 4);
    backend.register_window(SIDE, 2, 2);
    let manager = ContextManager::from_shared(Rc::clone(&backend), ManagerConfig::default());
    (backend, manager)
}

/// Straight RGBA8 of a presented pixel.
pub fn presented(backend: &SoftwareBackend, window: WindowHandle, x: u32, y: u32) -> [u8; 4] {
    backend
        .presented_frame(window)
        .expect("nothing presented")
        .color_at(x, y)
        .expect("pixel out of bounds")
        .to_rgba8()
}
