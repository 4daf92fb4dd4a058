//! wgpu backend.
//!
//! One Instance/Adapter/Device/Queue shared by every attached window. Each
//! context owns a configured `wgpu::Surface`; presenting uploads the
//! CPU-composited backbuffer into a texture and draws it with a fullscreen
//! triangle.

mod init;
mod surface;

pub use init::GpuInit;
pub use surface::SurfaceErrorAction;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, anyhow};
use raw_window_handle::HasWindowHandle;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use super::{Backend, TextureStore};
use crate::config::ContextDefaults;
use crate::context::WindowHandle;
use crate::error::BackendError;
use crate::image::Image;
use crate::texture::TextureHandle;

use surface::{apply_resize, choose_alpha_mode, choose_surface_format, map_surface_error};

/// GPU copy of a texture, always RGBA8.
struct GpuTexture {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

/// Presents through wgpu surfaces bound to winit windows.
///
/// Windows must be attached with [`attach_window`](Self::attach_window) before a
/// context can be initialized for them.
pub struct WgpuBackend {
    init: GpuInit,

    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,

    windows: RefCell<HashMap<WindowHandle, Arc<Window>>>,
    textures: RefCell<HashMap<TextureHandle, GpuTexture>>,
    next_texture: Cell<u64>,
}

/// Per-window wgpu state.
pub struct WgpuSurface {
    handle: WindowHandle,
    window: Arc<Window>,

    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    blit: Blit,
    clear_color: wgpu::Color,
}

impl WgpuSurface {
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }
}

impl WgpuBackend {
    /// Creates the shared device. Blocks on adapter/device acquisition.
    pub fn new(init: GpuInit) -> anyhow::Result<Self> {
        pollster::block_on(Self::new_async(init))
    }

    async fn new_async(init: GpuInit) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lumen device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::info!("wgpu adapter: {:?}", adapter.get_info().name);

        Ok(Self {
            init,
            instance,
            adapter,
            device,
            queue,
            windows: RefCell::new(HashMap::new()),
            textures: RefCell::new(HashMap::new()),
            next_texture: Cell::new(0),
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Makes `window` available for context initialization.
    pub fn attach_window(&self, window: Arc<Window>) -> Result<WindowHandle, BackendError> {
        window
            .window_handle()
            .map_err(|e| anyhow!("window has no usable platform handle: {e}"))?;

        let handle = WindowHandle::from(window.id());
        self.windows.borrow_mut().insert(handle, window);
        log::debug!("attached {handle}");
        Ok(handle)
    }

    /// Forgets `window`. Its context, if any, keeps the window alive until destroyed.
    pub fn detach_window(&self, handle: WindowHandle) -> Option<Arc<Window>> {
        self.windows.borrow_mut().remove(&handle)
    }

    fn create_gpu_texture(&self, width: u32, height: u32) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lumen texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }
}

/// Writes tightly packed RGBA8 rows into `texture`.
fn upload_rgba8(queue: &wgpu::Queue, texture: &wgpu::Texture, width: u32, height: u32, rgba: &[u8]) {
    if width == 0 || height == 0 {
        return;
    }
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}

impl TextureStore for WgpuBackend {
    fn allocate(&self, image: &Image) -> Result<TextureHandle, BackendError> {
        let (width, height) = image.size();
        let texture = self.create_gpu_texture(width, height);
        upload_rgba8(&self.queue, &texture, width, height, &image.to_rgba8());

        let handle = TextureHandle(self.next_texture.get());
        self.next_texture.set(handle.0 + 1);
        self.textures.borrow_mut().insert(
            handle,
            GpuTexture {
                texture,
                width,
                height,
            },
        );
        Ok(handle)
    }

    fn update(&self, handle: TextureHandle, image: &Image) -> Result<(), BackendError> {
        let mut textures = self.textures.borrow_mut();
        let gpu = textures
            .get_mut(&handle)
            .ok_or_else(|| anyhow!("texture handle {} is not allocated", handle.0))?;

        let (width, height) = image.size();
        if (gpu.width, gpu.height) != (width, height) {
            gpu.texture.destroy();
            gpu.texture = self.create_gpu_texture(width, height);
            gpu.width = width;
            gpu.height = height;
        }
        upload_rgba8(&self.queue, &gpu.texture, width, height, &image.to_rgba8());
        Ok(())
    }

    fn release(&self, handle: TextureHandle) {
        match self.textures.borrow_mut().remove(&handle) {
            Some(gpu) => gpu.texture.destroy(),
            None => log::warn!("release of unknown texture handle {}", handle.0),
        }
    }
}

impl Backend for WgpuBackend {
    type Surface = WgpuSurface;

    fn create_surface(&self, handle: WindowHandle) -> Result<WgpuSurface, BackendError> {
        let window = self
            .windows
            .borrow()
            .get(&handle)
            .cloned()
            .ok_or_else(|| anyhow!("{handle} is not attached to the wgpu backend"))?;

        let size = window.inner_size();

        // `Arc<Window>` makes the surface `'static`.
        let surface = self
            .instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;

        let caps = surface.get_capabilities(&self.adapter);
        let format = choose_surface_format(&caps, self.init.prefer_srgb)
            .context("surface is not supported by the adapter")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: self.init.present_mode,
            alpha_mode: choose_alpha_mode(&caps, self.init.alpha_mode),
            view_formats: vec![],
            desired_maximum_frame_latency: self.init.desired_maximum_frame_latency,
        };
        if size.width > 0 && size.height > 0 {
            surface.configure(&self.device, &config);
        }

        let blit = Blit::new(&self.device, format);
        log::debug!("{handle}: surface {format:?} {}x{}", size.width, size.height);

        Ok(WgpuSurface {
            handle,
            window,
            surface,
            config,
            size,
            blit,
            clear_color: wgpu::Color::BLACK,
        })
    }

    fn surface_size(&self, surface: &WgpuSurface) -> (u32, u32) {
        (surface.size.width, surface.size.height)
    }

    fn resize_surface(
        &self,
        surface: &mut WgpuSurface,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        apply_resize(
            &surface.surface,
            &self.device,
            &mut surface.config,
            &mut surface.size,
            PhysicalSize::new(width, height),
        );
        Ok(())
    }

    fn apply_defaults(&self, surface: &mut WgpuSurface, defaults: &ContextDefaults) {
        surface.clear_color = defaults.clear_color.to_wgpu();
    }

    fn present(&self, surface: &mut WgpuSurface, frame: &Image) -> Result<(), BackendError> {
        // Minimized: nothing to show, nothing to fail.
        if surface.size.width == 0 || surface.size.height == 0 {
            return Ok(());
        }

        surface.blit.upload(&self.device, &self.queue, frame);

        let surface_texture = match surface.surface.get_current_texture() {
            Ok(t) => t,
            Err(err) => {
                let action = map_surface_error(
                    &surface.surface,
                    &self.device,
                    &surface.config,
                    surface.size,
                    &err,
                );
                log::warn!("{}: surface error {err:?}, {action:?}", surface.handle);
                return Err(action.into_error(surface.handle, &err));
            }
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lumen present encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lumen present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(surface.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            surface.blit.draw(&mut rpass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface.window.pre_present_notify();
        surface_texture.present();
        Ok(())
    }

    fn destroy_surface(&self, window: WindowHandle, surface: WgpuSurface) {
        drop(surface);
        log::debug!("{window}: surface destroyed");
    }
}

/// Fullscreen-triangle copy of the backbuffer onto the surface.
struct Blit {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Sampled format; matches the surface's sRGB-ness so bytes reach the screen unchanged.
    frame_format: wgpu::TextureFormat,
    frame: Option<(wgpu::Texture, wgpu::BindGroup, u32, u32)>,
}

impl Blit {
    fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("lumen blit shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blit.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lumen blit bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lumen blit pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("lumen blit pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lumen blit sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let frame_format = if surface_format.is_srgb() {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };

        Self {
            pipeline,
            bind_group_layout,
            sampler,
            frame_format,
            frame: None,
        }
    }

    /// Uploads `frame`, recreating the texture when the size changed.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &Image) {
        let (width, height) = frame.size();
        if width == 0 || height == 0 {
            self.frame = None;
            return;
        }

        let stale = !matches!(&self.frame, Some((_, _, w, h)) if (*w, *h) == (width, height));
        if stale {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("lumen backbuffer"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: self.frame_format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("lumen blit bind group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.frame = Some((texture, bind_group, width, height));
        }

        if let Some((texture, ..)) = &self.frame {
            upload_rgba8(queue, texture, width, height, &frame.to_rgba8());
        }
    }

    fn draw(&self, rpass: &mut wgpu::RenderPass<'_>) {
        let Some((_, bind_group, ..)) = &self.frame else {
            return;
        };
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}
