// Demo host for the etherflow background effect: a winit window with the
// simulation filling it, real pointer input taking over from the autopilot.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
};

use etherflow::{EffectConfig, FluidEffect};

const SETTINGS_FILE_NAME: &str = "etherflow_settings.json";

/// Optional settings file next to the executable; missing fields fall back
/// to the defaults, a missing file means all defaults.
fn load_settings() -> EffectConfig {
    match std::fs::read_to_string(SETTINGS_FILE_NAME) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(config) => {
                println!("Loaded settings from {SETTINGS_FILE_NAME}");
                config
            }
            Err(err) => {
                eprintln!("Ignoring malformed {SETTINGS_FILE_NAME}: {err}");
                EffectConfig::default()
            }
        },
        Err(_) => EffectConfig::default(),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = load_settings();
    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        event_loop.create_window(
            winit::window::WindowAttributes::default()
                .with_title("etherflow")
                .with_inner_size(PhysicalSize::new(1280, 720)),
        )?,
    );

    let mut effect = FluidEffect::new(window.clone(), config)?;
    effect.start();

    let mut frame_count = 0u32;
    let mut fps_window = Instant::now();

    event_loop.run(move |event, control_flow| {
        match event {
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => control_flow.exit(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(key),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => match key {
                    KeyCode::Escape => control_flow.exit(),
                    KeyCode::Space => {
                        if effect.is_running() {
                            effect.pause();
                        } else {
                            effect.start();
                        }
                    }
                    _ => {}
                },
                WindowEvent::CursorMoved { position, .. } => {
                    effect.pointer_moved(position.x, position.y);
                }
                WindowEvent::Resized(size) => {
                    effect.resize(size.width, size.height);
                }
                WindowEvent::RedrawRequested => match effect.frame() {
                    Ok(()) => {
                        frame_count += 1;
                        let elapsed = fps_window.elapsed().as_secs_f32();
                        if elapsed >= 0.5 {
                            let fps = frame_count as f32 / elapsed;
                            window.set_title(&format!("etherflow | {fps:.0} FPS"));
                            frame_count = 0;
                            fps_window = Instant::now();
                        }
                    }
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = window.inner_size();
                        effect.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        eprintln!("Out of GPU memory, exiting");
                        control_flow.exit();
                    }
                    Err(err) => eprintln!("{err:?}"),
                },
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
