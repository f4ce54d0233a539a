//! The solver pipeline: owns every field buffer, wires the kernel passes
//! into the per-step sequence, and handles grid resizes.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::config::EffectConfig;
use crate::gpu::GpuContext;
use crate::grid::GridSize;
use crate::passes::{FieldBuffer, KernelPass, PingPong};
use crate::pointer::PointerSample;

/// Uniform block shared by every kernel. Written once per step, read-only
/// while the passes execute.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct SimParams {
    grid: [u32; 2],
    cell_scale: [f32; 2],
    boundary_space: [f32; 2],
    dt: f32,
    viscosity: f32,
    force: [f32; 2],
    center: [f32; 2],
    cursor_size: f32,
    use_bfecc: u32,
    _pad: [u32; 2],
}

struct FieldBuffers {
    /// Divergence-free result of the previous step; advection source and
    /// projection destination.
    vel_front: FieldBuffer,
    /// Post-advection, post-force velocity.
    vel_back: FieldBuffer,
    /// Scratch pair for the viscosity iterations.
    viscous: [FieldBuffer; 2],
    divergence: FieldBuffer,
    /// Pressure pair, warm-started across frames.
    pressure: [FieldBuffer; 2],
}

impl FieldBuffers {
    fn new(device: &wgpu::Device, grid: GridSize) -> Self {
        Self {
            vel_front: FieldBuffer::new(device, grid, 2, "Velocity Front"),
            vel_back: FieldBuffer::new(device, grid, 2, "Velocity Back"),
            viscous: [
                FieldBuffer::new(device, grid, 2, "Viscous Scratch A"),
                FieldBuffer::new(device, grid, 2, "Viscous Scratch B"),
            ],
            divergence: FieldBuffer::new(device, grid, 1, "Divergence"),
            pressure: [
                FieldBuffer::new(device, grid, 1, "Pressure A"),
                FieldBuffer::new(device, grid, 1, "Pressure B"),
            ],
        }
    }
}

struct Kernels {
    advect: KernelPass,
    bounds: KernelPass,
    splat: KernelPass,
    viscous: KernelPass,
    divergence: KernelPass,
    pressure: KernelPass,
    project: KernelPass,
}

struct StageBindGroups {
    /// Shared by advection, the boundary reflection and the force splat:
    /// all of them write the back velocity buffer.
    advect: wgpu::BindGroup,
    viscous: [wgpu::BindGroup; 2],
    divergence: wgpu::BindGroup,
    pressure: [wgpu::BindGroup; 2],
    project: wgpu::BindGroup,
}

pub struct Simulation {
    grid: GridSize,
    resolution_scale: f32,
    dt: f32,
    viscosity: f32,
    viscous_iterations: u32,
    pressure_iterations: u32,
    viscosity_enabled: bool,
    bfecc: bool,
    bounded: bool,
    force_strength: f32,
    cursor_radius: f32,
    uniform: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    kernels: Kernels,
    buffers: FieldBuffers,
    binds: StageBindGroups,
}

impl Simulation {
    pub fn new(gpu: &GpuContext, grid: GridSize, config: &EffectConfig) -> Self {
        let device = &gpu.device;
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fluid Kernels"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/fluid.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fluid Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, true),
                storage_entry(5, true),
                storage_entry(6, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fluid Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let kernels = Kernels {
            advect: KernelPass::new(device, &module, &pipeline_layout, "advect_velocity"),
            bounds: KernelPass::new(device, &module, &pipeline_layout, "enforce_bounds"),
            splat: KernelPass::new(device, &module, &pipeline_layout, "splat_force"),
            viscous: KernelPass::new(device, &module, &pipeline_layout, "jacobi_viscous"),
            divergence: KernelPass::new(device, &module, &pipeline_layout, "compute_divergence"),
            pressure: KernelPass::new(device, &module, &pipeline_layout, "jacobi_pressure"),
            project: KernelPass::new(device, &module, &pipeline_layout, "subtract_gradient"),
        };

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sim Params"),
            size: std::mem::size_of::<SimParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let viscosity_enabled = config.viscosity_enabled && config.viscous_iterations > 0;
        let buffers = FieldBuffers::new(device, grid);
        let binds = Self::create_bind_groups(
            device,
            &layout,
            &uniform,
            &buffers,
            viscosity_enabled,
            config.viscous_iterations,
            config.pressure_iterations,
        );

        Self {
            grid,
            resolution_scale: config.resolution_scale,
            dt: config.dt.max(1e-6),
            viscosity: config.viscosity,
            viscous_iterations: config.viscous_iterations,
            pressure_iterations: config.pressure_iterations,
            viscosity_enabled,
            bfecc: config.bfecc,
            bounded: config.bounded,
            force_strength: config.force_strength,
            cursor_radius: config.cursor_radius,
            uniform,
            layout,
            kernels,
            buffers,
            binds,
        }
    }

    fn create_bind_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform: &wgpu::Buffer,
        buffers: &FieldBuffers,
        viscosity_enabled: bool,
        viscous_iterations: u32,
        pressure_iterations: u32,
    ) -> StageBindGroups {
        // Velocity feeding the divergence/pressure/projection stages: the
        // last-written viscosity scratch buffer, or the post-force velocity
        // when the diffusion solve is off.
        let vel_current = if viscosity_enabled {
            &buffers.viscous[PingPong::result_slot(viscous_iterations)]
        } else {
            &buffers.vel_back
        };
        let pressure_result = &buffers.pressure[PingPong::result_slot(pressure_iterations)];

        let group = |label: &str, fields: [&FieldBuffer; 6]| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry { binding: 1, resource: fields[0].binding() },
                    wgpu::BindGroupEntry { binding: 2, resource: fields[1].binding() },
                    wgpu::BindGroupEntry { binding: 3, resource: fields[2].binding() },
                    wgpu::BindGroupEntry { binding: 4, resource: fields[3].binding() },
                    wgpu::BindGroupEntry { binding: 5, resource: fields[4].binding() },
                    wgpu::BindGroupEntry { binding: 6, resource: fields[5].binding() },
                ],
            })
        };

        // Slots unused by a stage still need a binding; they are filled with
        // a buffer that cannot conflict with the stage's real reads/writes.
        StageBindGroups {
            advect: group(
                "Advect + Force",
                [
                    &buffers.vel_front,
                    &buffers.vel_front,
                    &buffers.vel_back,
                    &buffers.divergence,
                    &buffers.divergence,
                    &buffers.pressure[0],
                ],
            ),
            viscous: [
                group(
                    "Viscous A->B",
                    [
                        &buffers.vel_back,
                        &buffers.viscous[0],
                        &buffers.viscous[1],
                        &buffers.divergence,
                        &buffers.divergence,
                        &buffers.pressure[0],
                    ],
                ),
                group(
                    "Viscous B->A",
                    [
                        &buffers.vel_back,
                        &buffers.viscous[1],
                        &buffers.viscous[0],
                        &buffers.divergence,
                        &buffers.divergence,
                        &buffers.pressure[0],
                    ],
                ),
            ],
            divergence: group(
                "Divergence",
                [
                    vel_current,
                    vel_current,
                    &buffers.vel_front,
                    &buffers.pressure[0],
                    &buffers.pressure[0],
                    &buffers.divergence,
                ],
            ),
            pressure: [
                group(
                    "Pressure A->B",
                    [
                        vel_current,
                        vel_current,
                        &buffers.vel_front,
                        &buffers.divergence,
                        &buffers.pressure[0],
                        &buffers.pressure[1],
                    ],
                ),
                group(
                    "Pressure B->A",
                    [
                        vel_current,
                        vel_current,
                        &buffers.vel_front,
                        &buffers.divergence,
                        &buffers.pressure[1],
                        &buffers.pressure[0],
                    ],
                ),
            ],
            project: group(
                "Project",
                [
                    vel_current,
                    vel_current,
                    &buffers.vel_front,
                    pressure_result,
                    pressure_result,
                    &buffers.divergence,
                ],
            ),
        }
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Buffer holding the step's final, divergence-free velocity field.
    pub fn velocity_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.vel_front.buffer
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    fn frame_params(&self, pointer: PointerSample) -> SimParams {
        // Clamp the cursor center so the force footprint stays inside the
        // domain. A cursor wider than the domain collapses to the center.
        let cell_scale = self.grid.cell_scale();
        let cs = [
            (self.cursor_radius * cell_scale[0]).min(1.0),
            (self.cursor_radius * cell_scale[1]).min(1.0),
        ];
        let center = [
            pointer.position[0].clamp(-1.0 + cs[0], 1.0 - cs[0]),
            pointer.position[1].clamp(-1.0 + cs[1], 1.0 - cs[1]),
        ];
        SimParams {
            grid: [self.grid.width, self.grid.height],
            cell_scale,
            boundary_space: self.grid.boundary_space(self.bounded),
            dt: self.dt,
            viscosity: self.viscosity,
            force: [
                pointer.delta[0] / 2.0 * self.force_strength,
                pointer.delta[1] / 2.0 * self.force_strength,
            ],
            center,
            cursor_size: self.cursor_radius,
            use_bfecc: self.bfecc as u32,
            _pad: [0, 0],
        }
    }

    /// Advance the simulation one fixed timestep. Stage order: advection,
    /// boundary reflection (bounded mode), force injection, viscosity,
    /// divergence, pressure solve, projection.
    pub fn step(&mut self, gpu: &GpuContext, pointer: PointerSample) {
        let params = self.frame_params(pointer);
        gpu.queue
            .write_buffer(&self.uniform, 0, bytemuck::bytes_of(&params));

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Simulation Step"),
            });

        self.kernels
            .advect
            .dispatch(&mut encoder, &self.binds.advect, self.grid);
        if self.bounded {
            self.kernels
                .bounds
                .dispatch(&mut encoder, &self.binds.advect, self.grid);
        }
        self.kernels
            .splat
            .dispatch(&mut encoder, &self.binds.advect, self.grid);

        if self.viscosity_enabled {
            let mut pp = PingPong::new();
            for _ in 0..self.viscous_iterations {
                self.kernels.viscous.dispatch(
                    &mut encoder,
                    &self.binds.viscous[pp.read()],
                    self.grid,
                );
                pp.swap();
            }
        }

        self.kernels
            .divergence
            .dispatch(&mut encoder, &self.binds.divergence, self.grid);

        let mut pp = PingPong::new();
        for _ in 0..self.pressure_iterations {
            self.kernels.pressure.dispatch(
                &mut encoder,
                &self.binds.pressure[pp.read()],
                self.grid,
            );
            pp.swap();
        }

        self.kernels
            .project
            .dispatch(&mut encoder, &self.binds.project, self.grid);

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Recompute the grid for a new surface size and reallocate every field
    /// buffer if the dimensions actually changed. Returns whether buffers
    /// were reallocated; an unchanged grid is a no-op.
    pub fn resize(&mut self, gpu: &GpuContext, surface_width: u32, surface_height: u32) -> bool {
        let grid = GridSize::from_surface(surface_width, surface_height, self.resolution_scale);
        if grid == self.grid {
            return false;
        }
        self.grid = grid;
        self.buffers = FieldBuffers::new(&gpu.device, grid);
        self.binds = Self::create_bind_groups(
            &gpu.device,
            &self.layout,
            &self.uniform,
            &self.buffers,
            self.viscosity_enabled,
            self.viscous_iterations,
            self.pressure_iterations,
        );
        true
    }

    /// Copy the current velocity field back to the CPU. Diagnostic path,
    /// also used by the integration tests.
    pub fn read_velocity(&self, gpu: &GpuContext) -> Result<Vec<[f32; 2]>> {
        self.read_buffer(gpu, &self.buffers.vel_front, "Velocity Staging")
    }

    /// Copy the divergence measured before the last projection back to the
    /// CPU.
    pub fn read_divergence(&self, gpu: &GpuContext) -> Result<Vec<f32>> {
        self.read_buffer(gpu, &self.buffers.divergence, "Divergence Staging")
    }

    fn read_buffer<T: Pod>(&self, gpu: &GpuContext, field: &FieldBuffer, label: &str) -> Result<Vec<T>> {
        let size = FieldBuffer::size_bytes(self.grid, field.components());
        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Field Readback"),
            });
        encoder.copy_buffer_to_buffer(&field.buffer, 0, &staging, 0, size);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        pollster::block_on(receiver.receive())
            .context("readback channel closed")?
            .context("failed to map staging buffer")?;

        let data = slice.get_mapped_range();
        let result = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(result)
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
