use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use lumen_render::coords::Vec2;
use lumen_render::logging::{LoggingConfig, init_logging};
use lumen_render::shader::Grayscale;
use lumen_render::{
    BackendError, BitDepth, BlendMode, Color, ContextManager, GpuInit, RenderError, RenderState,
    Renderer, RendererId, SharedRenderer, SharedShader, SharedTexture, Shape, WgpuBackend,
    WindowHandle,
};

const CHECKER_SIZE: u32 = 64;
const OFFSCREEN_SIZE: u32 = 96;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let image_path = std::env::args_os().nth(1).map(PathBuf::from);
    let backend = WgpuBackend::new(GpuInit::default()).context("GPU initialization failed")?;

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut viewer = Viewer::new(ContextManager::new(backend), image_path);
    event_loop
        .run_app(&mut viewer)
        .context("winit event loop terminated with error")?;
    Ok(())
}

/// Resources drawn every frame.
struct Scene {
    renderer_id: RendererId,
    renderer: SharedRenderer<WgpuBackend>,
    checker: SharedTexture,
    offscreen: SharedTexture,
    photo: Option<SharedTexture>,
    grayscale: SharedShader,
}

struct Viewer {
    manager: ContextManager<WgpuBackend>,
    image_path: Option<PathBuf>,

    window: Option<(Arc<Window>, WindowHandle)>,
    scene: Option<Scene>,

    started: Instant,
    exit_requested: bool,
}

impl Viewer {
    fn new(manager: ContextManager<WgpuBackend>, image_path: Option<PathBuf>) -> Self {
        Self {
            manager,
            image_path,
            window: None,
            scene: None,
            started: Instant::now(),
            exit_requested: false,
        }
    }

    fn open_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("lumen viewer")
            .with_inner_size(LogicalSize::new(640.0, 480.0));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let handle = self.manager.backend().attach_window(Arc::clone(&window))?;
        self.manager.initialize_context(handle)?;
        self.scene = Some(self.build_scene()?);
        self.window = Some((window, handle));
        Ok(())
    }

    fn build_scene(&mut self) -> Result<Scene> {
        let (renderer_id, renderer) = self.manager.create_renderer()?;
        renderer
            .borrow_mut()
            .set_clear_color(Color::from_rgba8(24, 26, 32, 255));

        let (_, checker) = self
            .manager
            .create_texture(CHECKER_SIZE, CHECKER_SIZE, BitDepth::ThirtyTwo)?;
        {
            let light = Color::from_rgba8(230, 230, 230, 255);
            let dark = Color::from_rgba8(90, 110, 200, 255);
            let mut img = checker.image_mut();
            for y in 0..CHECKER_SIZE {
                for x in 0..CHECKER_SIZE {
                    let c = if (x / 8 + y / 8) % 2 == 0 { light } else { dark };
                    img.put_color(x, y, c)?;
                }
            }
        }
        checker.sync()?;

        let (_, offscreen) =
            self.manager
                .create_texture(OFFSCREEN_SIZE, OFFSCREEN_SIZE, BitDepth::ThirtyTwo)?;

        let photo = match &self.image_path {
            Some(path) => match self.manager.create_texture_from_file(path) {
                Ok((_, tex)) => Some(tex),
                Err(e) => {
                    log::error!("{e}");
                    None
                }
            },
            None => None,
        };

        Ok(Scene {
            renderer_id,
            renderer,
            checker,
            offscreen,
            photo,
            grayscale: Rc::new(Grayscale),
        })
    }

    fn draw_frame(&mut self) -> Result<()> {
        let Some(scene) = &self.scene else {
            return Ok(());
        };
        let t = self.started.elapsed().as_secs_f32();
        let mut r = scene.renderer.borrow_mut();

        // Offscreen pass: a spinning checker tile into its own texture.
        r.set_texture(Some(Rc::clone(&scene.offscreen)));
        r.clear();
        r.draw(
            RenderState::sprite(&scene.checker)
                .at(16.0, 16.0)
                .rotated(t * 0.7),
        );
        // Flush before the backbuffer clear, which would drop the queued draw.
        r.render()?;

        r.set_texture(None);
        r.clear();
        r.draw(RenderState::sprite(&scene.offscreen).at(40.0, 40.0));
        r.draw(
            RenderState::sprite(&scene.checker)
                .with_shape(Shape::Rect {
                    size: Vec2::new(160.0, 64.0),
                })
                .at(200.0, 60.0)
                .rotated(-t * 0.3),
        );
        r.draw(
            RenderState::shape(
                Shape::Circle { radius: 48.0 },
                Color::from_straight(1.0, 0.35, 0.2, 0.7),
            )
            .at(120.0 + 80.0 * t.cos(), 240.0 + 40.0 * t.sin())
            .with_blend_mode(BlendMode::Alpha),
        );
        if let Some(photo) = &scene.photo {
            r.draw(
                RenderState::sprite(photo)
                    .with_shader(&scene.grayscale)
                    .at(380.0, 200.0),
            );
        }

        r.render()?;
        Ok(())
    }

    /// Re-creates the context after it was lost and points the renderer at it.
    fn recover_context(&mut self) -> Result<()> {
        let (Some((_, handle)), Some(scene)) = (&self.window, &self.scene) else {
            return Ok(());
        };
        let (handle, id) = (*handle, scene.renderer_id);

        log::warn!("{handle}: render context lost, re-initializing");
        self.manager.destroy_context(handle)?;
        self.manager.initialize_context(handle)?;
        self.manager.rebind_renderer(id, handle)?;
        Ok(())
    }

    fn close_window(&mut self) {
        if let Some(scene) = self.scene.take() {
            if let Err(e) = self.manager.free_renderer(scene.renderer_id) {
                log::warn!("{e}");
            }
        }
        if let Some((_, handle)) = self.window.take() {
            if let Err(e) = self.manager.destroy_context(handle) {
                log::warn!("{e}");
            }
            self.manager.backend().detach_window(handle);
        }
        self.exit_requested = true;
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open_window(event_loop) {
            log::error!("failed to open viewer window: {e:#}");
            self.exit_requested = true;
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some((window, _)) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_window();
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some((_, handle)) = &self.window {
                    if let Err(e) = self.manager.resize_context(*handle, size.width, size.height) {
                        log::warn!("resize failed: {e}");
                    }
                }
            }

            WindowEvent::RedrawRequested => match self.draw_frame() {
                Ok(()) => {}
                Err(e) => match e.downcast_ref::<RenderError>() {
                    Some(RenderError::Backend(BackendError::ContextLost(_))) => {
                        if let Err(e) = self.recover_context() {
                            log::error!("could not recover render context: {e:#}");
                            self.close_window();
                            event_loop.exit();
                        }
                    }
                    Some(RenderError::Backend(_)) => log::warn!("frame skipped: {e}"),
                    _ => {
                        log::error!("{e:#}");
                        self.close_window();
                        event_loop.exit();
                    }
                },
            },

            _ => {}
        }
    }
}
