//! The frame-loop manager: ties autopilot, pointer, solver and compositor
//! together and exposes the lifecycle the host drives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use winit::window::Window;

use crate::compositor::Compositor;
use crate::config::EffectConfig;
use crate::gpu::GpuContext;
use crate::grid::GridSize;
use crate::palette::Palette;
use crate::pointer::{normalized_from_pixels, AutoDriver, PointerState};
use crate::simulation::Simulation;

/// The complete effect bound to one window surface.
///
/// Lifecycle: `start` and `pause` flip between Running and Stopped (both
/// idempotent); `frame` advances autopilot, pointer, solver and compositor
/// once and is a no-op while stopped; `dispose` consumes the effect and
/// releases every GPU resource. Not restartable after dispose — build a new
/// one.
pub struct FluidEffect {
    gpu: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    config: EffectConfig,
    simulation: Simulation,
    compositor: Compositor,
    pointer: PointerState,
    driver: AutoDriver,
    running: bool,
    /// Applied at the next frame boundary, never mid-stage.
    pending_resize: Option<(u32, u32)>,
    last_user_input: Option<Instant>,
    auto_engaged_at: Option<Instant>,
}

impl FluidEffect {
    /// Build the whole pipeline against a window. Any resource failure here
    /// is fatal; nothing is retried later.
    pub fn new(window: Arc<Window>, config: EffectConfig) -> Result<Self> {
        let size = window.inner_size();
        let (gpu, surface) = GpuContext::for_window(window)?;

        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(caps.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);

        let grid = GridSize::from_surface(size.width, size.height, config.resolution_scale);
        let simulation = Simulation::new(&gpu, grid, &config);
        let palette = Palette::new(&config.palette)?;
        let compositor = Compositor::new(&gpu, format, &palette, config.background, &simulation);
        let pointer = PointerState::new(config.autopilot_intensity);
        let driver = AutoDriver::new(config.autopilot, config.autopilot_speed);

        Ok(Self {
            gpu,
            surface,
            surface_config,
            config,
            simulation,
            compositor,
            pointer,
            driver,
            running: false,
            pending_resize: None,
            last_user_input: None,
            auto_engaged_at: None,
        })
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Real pointer input in device pixels relative to the surface. Takes
    /// control away from the autopilot; it resumes only after the
    /// configured idle delay.
    pub fn pointer_moved(&mut self, px: f64, py: f64) {
        let [nx, ny] = normalized_from_pixels(
            px,
            py,
            self.surface_config.width,
            self.surface_config.height,
        );
        if self.driver.active() {
            self.driver.force_stop(&mut self.pointer);
            self.pointer.begin_takeover(self.config.takeover_duration);
        }
        self.last_user_input = Some(Instant::now());
        self.auto_engaged_at = None;
        self.pointer.set_position(nx, ny);
    }

    /// Record a new surface size; the reconfiguration happens at the next
    /// frame boundary.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_resize = Some((width, height));
    }

    /// Advance one frame: pending resize, autopilot, pointer, solver step,
    /// composite, present. No-op while paused.
    pub fn frame(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        if !self.running {
            return Ok(());
        }

        if let Some((width, height)) = self.pending_resize.take() {
            if width > 0 && height > 0 {
                self.surface_config.width = width;
                self.surface_config.height = height;
                self.surface.configure(&self.gpu.device, &self.surface_config);
            }
            if self.simulation.resize(&self.gpu, width, height) {
                self.compositor.rebind(&self.gpu, &self.simulation);
            }
        }

        self.drive_autopilot();
        self.pointer.update();
        self.simulation.step(&self.gpu, self.pointer.sample());

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.compositor.draw(&self.gpu, &view);
        frame.present();
        Ok(())
    }

    fn drive_autopilot(&mut self) {
        if !self.config.autopilot {
            return;
        }
        let resume_delay = Duration::from_millis(self.config.auto_resume_delay_ms);
        let idle = self
            .last_user_input
            .map_or(true, |t| t.elapsed() >= resume_delay);
        if !idle {
            return;
        }
        if !self.driver.active() {
            self.auto_engaged_at = Some(Instant::now());
        }
        let ramp = match self.auto_engaged_at {
            Some(t) if self.config.auto_ramp_duration > 0.0 => {
                (t.elapsed().as_secs_f32() / self.config.auto_ramp_duration).min(1.0)
            }
            _ => 1.0,
        };
        self.pointer.set_ramp(ramp);
        self.driver.update(&mut self.pointer);
    }

    /// Tear everything down. Valid from either state; the effect cannot be
    /// reused afterwards.
    pub fn dispose(self) {
        // Dropping the fields releases surface, pipelines and buffers in
        // declaration order; nothing survives this call.
        drop(self);
    }
}
