//! Ambient real-time 2D fluid simulation for window backgrounds.
//!
//! A GPU-resident Eulerian incompressible-flow solver (semi-Lagrangian
//! advection with optional BFECC error compensation, optional implicit
//! viscosity, Jacobi pressure solve and projection) driven by pointer
//! movement — real or synthesized by a wandering autopilot — and composited
//! through a color palette onto the host surface every display refresh.
//!
//! The host hands over a window, pointer-move events and resize events;
//! the effect hands back pixels. Nothing is persisted, and every run starts
//! from a zero velocity field.

pub mod app;
pub mod compositor;
pub mod config;
pub mod gpu;
pub mod grid;
pub mod palette;
pub mod passes;
pub mod pointer;
pub mod simulation;

pub use app::FluidEffect;
pub use config::EffectConfig;
pub use gpu::GpuContext;
pub use grid::GridSize;
pub use palette::{parse_color, Palette};
pub use passes::PingPong;
pub use pointer::{normalized_from_pixels, AutoDriver, PointerSample, PointerState};
pub use simulation::Simulation;
