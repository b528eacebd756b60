use std::sync::mpsc::channel;

use anyhow::Context;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, Buffer, BufferDescriptor, BufferUsages, CommandEncoder,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor,
    Device, Instance, PipelineCompilationOptions, PipelineLayout, PipelineLayoutDescriptor, Queue,
    ShaderStages,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::error::GpuInitError;
use crate::sim::{DoubleBuffer, Generation, GridSize, LifeStepper, StepCounter};

pub const DEFAULT_WORKGROUP_SIZE: u32 = 8;

/// Grid dimensions as laid out in the uniform at binding 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridUniform {
    pub size: [f32; 2],
}

/// Buffers and bind groups shared by the compute and render pipelines.
///
/// Bind group `i` reads cell buffer `i` at binding 1 and writes the other one
/// at binding 2, so the bind group for the current role is always
/// `bind_groups.current()`.
pub struct CellBindings {
    pub pipeline_layout: PipelineLayout,
    pub bind_groups: DoubleBuffer<BindGroup>,
    cell_buffers: [Buffer; 2],
    #[allow(dead_code)]
    uniform_buf: Buffer, // must outlive the bind groups
    size: GridSize,
}

impl CellBindings {
    /// Seeds both cell buffers with `start`.
    pub fn new(device: &Device, start: &Generation) -> Self {
        let size = start.size();
        let uniform_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("grid uniform buffer"),
            contents: bytemuck::bytes_of(&GridUniform {
                size: size.uniform(),
            }),
            usage: BufferUsages::UNIFORM,
        });

        let cell_usage = BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST;
        let cell_buffers = [
            device.create_buffer_init(&BufferInitDescriptor {
                label: Some("cell state A"),
                contents: bytemuck::cast_slice(start.cells()),
                usage: cell_usage,
            }),
            device.create_buffer_init(&BufferInitDescriptor {
                label: Some("cell state B"),
                contents: bytemuck::cast_slice(start.cells()),
                usage: cell_usage,
            }),
        ];

        let storage = |read_only| wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("cell bind group layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX
                        | ShaderStages::FRAGMENT
                        | ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::VERTEX | ShaderStages::COMPUTE,
                    ty: storage(true),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::COMPUTE,
                    ty: storage(false),
                    count: None,
                },
            ],
        });

        let make_bind_group = |label, read: &Buffer, write: &Buffer| {
            device.create_bind_group(&BindGroupDescriptor {
                label: Some(label),
                layout: &layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: uniform_buf.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: read.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: write.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = DoubleBuffer::new(
            make_bind_group("cells bind group (A -> B)", &cell_buffers[0], &cell_buffers[1]),
            make_bind_group("cells bind group (B -> A)", &cell_buffers[1], &cell_buffers[0]),
        );

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("cell pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        Self {
            pipeline_layout,
            bind_groups,
            cell_buffers,
            uniform_buf,
            size,
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }
    pub fn counter(&self) -> StepCounter {
        self.bind_groups.counter()
    }
    /// The buffer holding the authoritative generation.
    pub fn current_buffer(&self) -> &Buffer {
        &self.cell_buffers[self.bind_groups.current_id().index()]
    }
}

/// The compute half of a tick: the Game of Life pipeline and its dispatch
/// geometry.
pub struct LifeCompute {
    pipeline: ComputePipeline,
    workgroup_size: u32,
}

impl LifeCompute {
    pub fn new(device: &Device, bindings: &CellBindings, workgroup_size: u32) -> Self {
        let source = include_str!("./shader.wgsl")
            .replace("WORKGROUP_SIZE", &format!("{workgroup_size}u"));
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("life compute shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("life compute pipeline"),
            layout: Some(&bindings.pipeline_layout),
            module: &shader,
            entry_point: Some("cs_main"),
            compilation_options: PipelineCompilationOptions::default(),
            cache: None,
        });
        Self {
            pipeline,
            workgroup_size,
        }
    }

    pub fn workgroup_count(&self, size: GridSize) -> u32 {
        size.side().div_ceil(self.workgroup_size)
    }

    /// Record one generation into `encoder` and swap roles in `bindings`.
    /// Nothing runs until the encoder is submitted.
    pub fn encode_step(&self, encoder: &mut CommandEncoder, bindings: &mut CellBindings) {
        let workgroups = self.workgroup_count(bindings.size());
        {
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some("life compute pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bindings.bind_groups.current(), &[]);
            pass.dispatch_workgroups(workgroups, workgroups, 1);
        }
        bindings.bind_groups.swap();
    }
}

/// Check that the adapter can run both halves of a tick.
pub(crate) fn check_capabilities(adapter: &wgpu::Adapter) -> Result<(), GpuInitError> {
    let flags = adapter.get_downlevel_capabilities().flags;
    if !flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(GpuInitError::MissingCapability("compute shaders"));
    }
    if !flags.contains(wgpu::DownlevelFlags::VERTEX_STORAGE) {
        return Err(GpuInitError::MissingCapability(
            "storage buffers in vertex shaders",
        ));
    }
    Ok(())
}

pub(crate) async fn request_device(
    adapter: &wgpu::Adapter,
    label: &'static str,
) -> Result<(Device, Queue), GpuInitError> {
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        })
        .await?;
    Ok((device, queue))
}

/// Headless GPU simulation: compute only, with blocking readback.
pub struct ComputeContext {
    #[allow(dead_code)]
    instance: Instance,
    device: Device,
    queue: Queue,
    bindings: CellBindings,
    compute: LifeCompute,
}

impl ComputeContext {
    pub async fn create(start: &Generation, workgroup_size: u32) -> Result<Self, GpuInitError> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await?;
        log::debug!("headless compute using adapter: {:?}", adapter.get_info());
        let flags = adapter.get_downlevel_capabilities().flags;
        if !flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(GpuInitError::MissingCapability("compute shaders"));
        }
        let (device, queue) = request_device(&adapter, "gridlife compute device").await?;
        let bindings = CellBindings::new(&device, start);
        let compute = LifeCompute::new(&device, &bindings, workgroup_size);
        Ok(Self {
            instance,
            device,
            queue,
            bindings,
            compute,
        })
    }

    pub fn size(&self) -> GridSize {
        self.bindings.size()
    }

    pub fn compute_step(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("compute step encoder"),
            });
        self.compute.encode_step(&mut encoder, &mut self.bindings);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copy the current generation back to the host. Blocks until the GPU
    /// has finished all submitted steps.
    pub fn read_current(&self) -> Result<Generation, anyhow::Error> {
        let src = self.bindings.current_buffer();
        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("cell readback buffer"),
            size: src.size(),
            mapped_at_creation: false,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_buffer_to_buffer(src, 0, &staging, 0, src.size());
        self.queue.submit(std::iter::once(encoder.finish()));

        let (tx, rx) = channel();
        staging.map_async(wgpu::MapMode::Read, .., move |v| {
            let _ = tx.send(v);
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        rx.recv()
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;
        let cells: Vec<u32> = {
            let view = staging.get_mapped_range(..);
            bytemuck::cast_slice::<u8, u32>(&view[..]).to_vec()
        };
        staging.unmap();
        Generation::from_cells(self.size(), cells)
            .context("readback size does not match the grid")
    }
}

impl LifeStepper for ComputeContext {
    type Error = std::convert::Infallible;

    fn step(&mut self) -> Result<(), Self::Error> {
        self.compute_step();
        Ok(())
    }
    fn steps(&self) -> u64 {
        self.bindings.counter().get()
    }
}
