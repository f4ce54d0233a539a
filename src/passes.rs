//! Building blocks for the GPU pipeline: field storage buffers, compute
//! kernel passes, and the ping-pong schedule for iterative solves.

use crate::grid::GridSize;

/// Compute workgroups are 16x16 cells, matching the kernel declarations.
pub const WORKGROUP_SIZE: u32 = 16;

/// A GPU-resident 2D field: one f32 vector per grid cell, stored in a
/// storage buffer. Exclusively owned by the simulation; stages borrow it
/// through bind groups for the duration of one dispatch.
pub struct FieldBuffer {
    pub buffer: wgpu::Buffer,
    components: u32,
}

impl FieldBuffer {
    pub fn new(device: &wgpu::Device, grid: GridSize, components: u32, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: Self::size_bytes(grid, components),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Self { buffer, components }
    }

    pub fn size_bytes(grid: GridSize, components: u32) -> u64 {
        grid.cells() as u64 * components as u64 * std::mem::size_of::<f32>() as u64
    }

    pub fn components(&self) -> u32 {
        self.components
    }

    pub fn binding(&self) -> wgpu::BindingResource {
        self.buffer.as_entire_binding()
    }
}

/// One solver stage: a kernel program rasterized over every cell of its
/// destination. Stateless between invocations; inputs and outputs arrive
/// through the bind group, scalars through the shared uniform buffer.
pub struct KernelPass {
    pipeline: wgpu::ComputePipeline,
    label: &'static str,
}

impl KernelPass {
    pub fn new(
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        entry_point: &'static str,
    ) -> Self {
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(entry_point),
            layout: Some(layout),
            module,
            entry_point,
            compilation_options: Default::default(),
            cache: None,
        });
        Self {
            pipeline,
            label: entry_point,
        }
    }

    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        grid: GridSize,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(
            grid.width.div_ceil(WORKGROUP_SIZE),
            grid.height.div_ceil(WORKGROUP_SIZE),
            1,
        );
    }
}

/// Read/write schedule for a double-buffered iterative solve. The slot used
/// as the write target of an iteration is never its read source; `swap`
/// flips the roles between iterations.
#[derive(Clone, Copy, Debug, Default)]
pub struct PingPong {
    flipped: bool,
}

impl PingPong {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to the canonical order (read slot 0 first). Every iterative
    /// solve starts from here so the final result lands in a slot known at
    /// construction time.
    pub fn reset(&mut self) {
        self.flipped = false;
    }

    pub fn read(&self) -> usize {
        self.flipped as usize
    }

    pub fn write(&self) -> usize {
        (!self.flipped) as usize
    }

    pub fn swap(&mut self) {
        self.flipped = !self.flipped;
    }

    /// Slot holding the result after `iterations` swaps from a reset state.
    pub fn result_slot(iterations: u32) -> usize {
        // Iteration i writes slot (i + 1) % 2; the last write wins.
        (iterations % 2) as usize
    }
}
