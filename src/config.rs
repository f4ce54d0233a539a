//! Construction parameters for the fluid effect.

use serde::{Deserialize, Serialize};

/// Everything the host can tune at construction time. Every field has a
/// sensible default, so `EffectConfig::default()` is a complete working
/// setup and partial settings files fill in the rest.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    /// Scale applied to the pointer delta when injecting force.
    pub force_strength: f32,
    /// Radius of the force footprint, in grid cells.
    pub cursor_radius: f32,
    pub viscosity_enabled: bool,
    /// Viscosity coefficient, only used when viscosity is enabled.
    pub viscosity: f32,
    /// Jacobi iterations for the implicit viscosity solve.
    pub viscous_iterations: u32,
    /// Jacobi iterations for the pressure Poisson solve.
    pub pressure_iterations: u32,
    /// Fixed simulation timestep in seconds, decoupled from frame time.
    pub dt: f32,
    /// Back-and-forth error compensation for advection.
    pub bfecc: bool,
    /// Grid cells per surface pixel, in (0, 1].
    pub resolution_scale: f32,
    /// Bounce flow off the domain edges instead of letting it leave.
    pub bounded: bool,
    /// Palette stops, hex (`#rgb` / `#rrggbb`) or a named color.
    pub palette: Vec<String>,
    /// Background color the palette is blended over, RGBA in [0, 1].
    pub background: [f32; 4],
    pub autopilot: bool,
    /// Autopilot cursor speed in normalized units per second.
    pub autopilot_speed: f32,
    /// Multiplier on the synthetic pointer delta so autopilot motion reads
    /// stronger than idle drift.
    pub autopilot_intensity: f32,
    /// Seconds over which a real pointer takes over from the autopilot.
    pub takeover_duration: f32,
    /// Milliseconds of input silence before the autopilot re-engages.
    pub auto_resume_delay_ms: u64,
    /// Seconds over which re-engaged autopilot ramps back to full intensity.
    pub auto_ramp_duration: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            force_strength: 20.0,
            cursor_radius: 100.0,
            viscosity_enabled: false,
            viscosity: 30.0,
            viscous_iterations: 32,
            pressure_iterations: 32,
            dt: 0.014,
            bfecc: true,
            resolution_scale: 0.5,
            bounded: false,
            palette: vec![
                "#5227FF".to_string(),
                "#FF9FFC".to_string(),
                "#B19EEF".to_string(),
            ],
            background: [0.0, 0.0, 0.0, 0.0],
            autopilot: true,
            autopilot_speed: 0.5,
            autopilot_intensity: 2.2,
            takeover_duration: 0.25,
            auto_resume_delay_ms: 1000,
            auto_ramp_duration: 0.6,
        }
    }
}
