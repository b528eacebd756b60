use bytemuck::{Pod, Zeroable};
use wgpu::{
    Buffer, BufferUsages, Device, FragmentState, MultisampleState, PrimitiveState, RenderPass,
    RenderPipeline, RenderPipelineDescriptor, TextureFormat, VertexState,
    util::{BufferInitDescriptor, DeviceExt},
};

use crate::sim::GridSize;
use crate::sim::gpucompute::CellBindings;
use crate::util::Color;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

const fn v(x: f32, y: f32) -> QuadVertex {
    QuadVertex { position: [x, y] }
}

/// Two triangles covering most of a unit cell, leaving a gap between cells.
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    v(-0.8, -0.8),
    v(0.8, -0.8),
    v(0.8, 0.8),
    v(-0.8, -0.8),
    v(0.8, 0.8),
    v(-0.8, 0.8),
];

/// Host-side view of what the vertex shader does with one instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellInstance {
    pub cell: (u32, u32),
    /// 1 for live cells, 0 collapses the quad to a point.
    pub scale: f32,
    pub color: Color,
}

pub fn cell_instance(size: GridSize, instance: u32, state: u32) -> CellInstance {
    let n = size.side();
    let cell = (instance % n, instance / n);
    CellInstance {
        cell,
        scale: state as f32,
        color: cell_color(size, cell.0, cell.1),
    }
}

/// Clip-space position of `vertex` for the given instance.
pub fn instance_vertex(size: GridSize, instance: &CellInstance, vertex: QuadVertex) -> [f32; 2] {
    let grid = size.uniform();
    let cell = [instance.cell.0 as f32, instance.cell.1 as f32];
    let place = |axis: usize| {
        let offset = cell[axis] / grid[axis] * 2.0;
        (vertex.position[axis] * instance.scale + 1.0) / grid[axis] - 1.0 + offset
    };
    [place(0), place(1)]
}

pub fn cell_color(size: GridSize, x: u32, y: u32) -> Color {
    let n = size.side() as f32;
    let (cx, cy) = (x as f32 / n, y as f32 / n);
    Color::rgb(cx, cy, 1.0 - cx)
}

/// Instanced quad renderer reading the generation at binding 1.
pub struct LifeRender {
    pipeline: RenderPipeline,
    vertex_buf: Buffer,
}

impl LifeRender {
    pub fn new(device: &Device, bindings: &CellBindings, format: TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("cell render shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./render.wgsl").into()),
        });

        let vertex_buf = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("cell quad vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: BufferUsages::VERTEX,
        });

        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("cell render pipeline"),
            layout: Some(&bindings.pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            vertex_buf,
        }
    }

    /// Draw one quad per cell from whatever generation is current in
    /// `bindings`. Only reads the cell buffers.
    pub fn draw(&self, pass: &mut RenderPass<'_>, bindings: &CellBindings) {
        let instances = bindings.size().cell_count() as u32;
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bindings.bind_groups.current(), &[]);
        pass.set_vertex_buffer(0, self.vertex_buf.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..instances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 2], b: [f32; 2]) -> bool {
        (a[0] - b[0]).abs() < 1e-5 && (a[1] - b[1]).abs() < 1e-5
    }

    #[test]
    fn instances_map_row_major() {
        let size = GridSize::new(4).unwrap();
        assert_eq!(cell_instance(size, 0, 1).cell, (0, 0));
        assert_eq!(cell_instance(size, 3, 1).cell, (3, 0));
        assert_eq!(cell_instance(size, 6, 1).cell, (2, 1));
        assert_eq!(cell_instance(size, 15, 1).cell, (3, 3));
    }

    #[test]
    fn dead_cells_collapse_to_a_point() {
        let size = GridSize::new(4).unwrap();
        let dead = cell_instance(size, 5, 0);
        let corners: Vec<_> = QUAD_VERTICES
            .iter()
            .map(|&vtx| instance_vertex(size, &dead, vtx))
            .collect();
        assert!(corners.iter().all(|&c| approx(c, corners[0])));
    }

    #[test]
    fn live_cells_stay_inside_their_slot() {
        let size = GridSize::new(4).unwrap();
        // slot (0, 0) spans clip space [-1, -0.5] on both axes
        let live = cell_instance(size, 0, 1);
        assert!(approx(instance_vertex(size, &live, v(-1.0, -1.0)), [-1.0, -1.0]));
        assert!(approx(instance_vertex(size, &live, v(1.0, 1.0)), [-0.5, -0.5]));
        // slot (3, 3) is the top-right corner
        let live = cell_instance(size, 15, 1);
        assert!(approx(instance_vertex(size, &live, v(1.0, 1.0)), [1.0, 1.0]));
    }

    #[test]
    fn color_follows_position() {
        let size = GridSize::new(4).unwrap();
        assert_eq!(cell_color(size, 0, 0).as_array(), [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(cell_color(size, 2, 1).as_array(), [0.5, 0.25, 0.5, 1.0]);
    }
}
