//! Surface-backed simulation loop
//!
//! `GpuSimRenderer` owns the device, the ping-pong cell buffers and both
//! pipelines. A tick records the compute pass and the render pass into one
//! encoder and submits them together, so the frame always shows the
//! generation that tick produced.

use std::sync::Arc;

use wgpu::{
    CommandEncoderDescriptor, Device, Instance, LoadOp, Operations, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, StoreOp, Surface, SurfaceConfiguration,
    TextureUsages, TextureViewDescriptor,
};
use winit::window::Window;

use crate::config::LifeConfig;
use crate::error::GpuInitError;
use crate::rendering::LifeRender;
use crate::sim::gpucompute::{CellBindings, LifeCompute, check_capabilities, request_device};
use crate::sim::{Generation, GridSize, LifeStepper};
use crate::util::Color;

pub struct GpuSimRenderer {
    #[allow(dead_code)]
    instance: Instance, // Keep instance alive for the lifetime of the renderer
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    /// Cleared when the surface is lost; ticks are skipped until the surface
    /// has been reconfigured.
    surface_ready: bool,
    bindings: CellBindings,
    compute: LifeCompute,
    render: LifeRender,
    clear_color: Color,
    window: Arc<Window>,
}

impl GpuSimRenderer {
    /// Create the renderer and upload `start` into both cell buffers.
    pub async fn new(
        window: Arc<Window>,
        start: Generation,
        config: &LifeConfig,
    ) -> Result<Self, GpuInitError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());

        // Create surface first to find compatible adapter
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await?;

        log::info!("Using adapter: {:?}", adapter.get_info());
        check_capabilities(&adapter)?;

        let (device, queue) = request_device(&adapter, "gridlife device").await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&fallback_format) = surface_caps.formats.first() else {
            return Err(GpuInitError::MissingCapability(
                "any surface format for this window",
            ));
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(fallback_format);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let bindings = CellBindings::new(&device, &start);
        let compute = LifeCompute::new(&device, &bindings, config.workgroup_size);
        let render = LifeRender::new(&device, &bindings, surface_format);
        log::info!(
            "{n}x{n} grid, {wg}x{wg} workgroups per dispatch, {pop} cells alive",
            n = start.size().side(),
            wg = compute.workgroup_count(start.size()),
            pop = start.population(),
        );

        Ok(Self {
            instance,
            device,
            queue,
            surface,
            surface_config,
            surface_ready: true,
            bindings,
            compute,
            render,
            clear_color: config.clear_color,
            window,
        })
    }

    /// Request a redraw of the window
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> GridSize {
        self.bindings.size()
    }

    /// Advance one generation and present it.
    ///
    /// The frame target is acquired before anything is recorded, so a failed
    /// acquisition leaves the step counter untouched.
    pub fn tick(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                if matches!(e, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                    self.surface_ready = false;
                }
                return Err(e);
            }
        };
        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("tick encoder"),
            });
        self.compute.encode_step(&mut encoder, &mut self.bindings);
        self.encode_render(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Redraw the current generation without advancing the simulation.
    pub fn render(&self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("render encoder"),
            });
        self.encode_render(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn encode_render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("cell render pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(self.clear_color.to_wgpu()),
                    store: StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.render.draw(&mut render_pass, &self.bindings);
    }

    /// Resize the render surface. Also used to recover a lost surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
            self.surface_ready = true;
        }
    }

    /// Reconfigure the surface at its current size.
    pub fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.resize(size.width, size.height);
    }

    pub fn steps(&self) -> u64 {
        self.bindings.counter().get()
    }
}

impl LifeStepper for GpuSimRenderer {
    type Error = wgpu::SurfaceError;

    fn is_ready(&self) -> bool {
        self.surface_ready
    }
    fn step(&mut self) -> Result<(), Self::Error> {
        self.tick()
    }
    fn steps(&self) -> u64 {
        GpuSimRenderer::steps(self)
    }
}
