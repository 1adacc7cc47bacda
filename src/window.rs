//! Windowed runner.
//!
//! Keyboard stands in for the pose classifier and a synthetic tone for the
//! microphone:
//!
//! | Key | Action |
//! |-----|--------|
//! | arrows up / left / right | pose `up` / `left` / `right` |
//! | `W` | pose `wide` |
//! | `N`, arrow down | pose `neutral` |
//! | `R` | reset |
//! | `1` `2` `3` | quality small / medium / large |
//! | `M` | toggle audio modulation |
//! | `Esc` | quit |
//!
//! Drag with the left mouse button to orbit, scroll to zoom.

use std::sync::Arc;

use anyhow::anyhow;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use posefield::prelude::*;
use posefield::GpuContext;

/// Samples per synthetic audio block.
const TONE_BLOCK: usize = 256;

/// Everything that exists once the window and device are up.
struct RunState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    sim: ParticleSimulation<GpuBackend>,
    camera: Camera,
    clock: FrameClock,
    tone: Vec<f32>,
    last_title_frame: u64,
}

impl RunState {
    async fn new(window: Arc<Window>, settings: &Settings) -> Result<Self, SimError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| SimError::Surface(e.to_string()))?;
        let context = GpuContext::for_surface(&instance, &surface).await?;

        let size = window.inner_size();
        let config = surface
            .get_default_config(&context.adapter, size.width.max(1), size.height.max(1))
            .ok_or_else(|| SimError::Surface("surface unsupported by adapter".into()))?;
        surface.configure(&context.device, &config);

        let backend = GpuBackend::new(context, config.format)?;
        let mut sim = ParticleSimulation::new(backend).with_settings(settings);
        sim.initialize()?;

        Ok(Self {
            window,
            surface,
            config,
            sim,
            camera: Camera::framing(settings.seed_state.radius * 2.0),
            clock: FrameClock::new(),
            tone: vec![0.0; TONE_BLOCK],
            last_title_frame: 0,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(self.sim.backend().device(), &self.config);
        }
    }

    /// Fill one block of a pulsing tone and fold it into the audio level.
    fn feed_tone(&mut self, elapsed: f32) {
        let amplitude = 0.01 * (0.5 + 0.5 * (elapsed * 1.3).sin());
        for (i, sample) in self.tone.iter_mut().enumerate() {
            *sample = amplitude * (i as f32 * 0.2 + elapsed * 440.0).sin();
        }
        self.sim.level().feed_samples(&self.tone);
    }

    fn key(&mut self, code: KeyCode) {
        let label = self.sim.label().clone();
        match code {
            KeyCode::ArrowUp => label.set(PoseLabel::Up),
            KeyCode::ArrowLeft => label.set(PoseLabel::Left),
            KeyCode::ArrowRight => label.set(PoseLabel::Right),
            KeyCode::KeyW => label.set(PoseLabel::Wide),
            KeyCode::KeyN | KeyCode::ArrowDown => label.set(PoseLabel::Neutral),
            KeyCode::KeyR => {
                if let Err(e) = self.sim.reset() {
                    log::error!("reset failed: {e}");
                }
            }
            KeyCode::Digit1 => self.sim.request_quality(Quality::Small),
            KeyCode::Digit2 => self.sim.request_quality(Quality::Medium),
            KeyCode::Digit3 => self.sim.request_quality(Quality::Large),
            KeyCode::KeyM => {
                let params = self.sim.params_mut();
                params.audio_enabled = !params.audio_enabled;
                log::info!("audio modulation {}", if params.audio_enabled { "on" } else { "off" });
            }
            _ => {}
        }
    }

    fn redraw(&mut self) -> Result<(), wgpu::SurfaceError> {
        let (elapsed, delta) = self.clock.tick();
        self.feed_tone(elapsed);

        if let Err(e) = self.sim.step(FrameInput::new(delta, elapsed)) {
            // a failed tier change leaves the old tier running
            log::error!("{e}");
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let aspect = self.config.width as f32 / self.config.height.max(1) as f32;
        self.sim.backend_mut().render(&view, self.camera.view_proj(aspect));
        output.present();

        if self.clock.frame() - self.last_title_frame >= 30 {
            self.last_title_frame = self.clock.frame();
            self.window.set_title(&format!(
                "posefield - {} particles - {:.0} fps - {}",
                self.sim.particle_count(),
                self.clock.fps(),
                self.sim.label().get()
            ));
        }
        Ok(())
    }
}

pub struct App {
    settings: Settings,
    state: Option<RunState>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            state: None,
            mouse_pressed: false,
            last_mouse_pos: None,
            error: None,
        }
    }

    /// The error that ended the event loop, if any.
    pub fn into_result(self) -> anyhow::Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("posefield")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, anyhow!("failed to create window: {e}")),
        };
        match pollster::block_on(RunState::new(window.clone(), &self.settings)) {
            Ok(state) => {
                window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(state) = &mut self.state else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                state.sim.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape {
                    state.sim.dispose();
                    event_loop.exit();
                } else {
                    state.key(code);
                }
            }
            WindowEvent::MouseInput { state: button_state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = button_state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        state
                            .camera
                            .orbit((position.x - last_x) as f32, (position.y - last_y) as f32);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                state.camera.zoom(scroll);
            }
            WindowEvent::RedrawRequested => {
                match state.redraw() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let (width, height) = (state.config.width, state.config.height);
                        state.resize(width, height);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        return self.fail(event_loop, anyhow!("surface out of memory"));
                    }
                    Err(e) => log::warn!("render error: {e:?}"),
                }
                state.window.request_redraw();
            }
            _ => {}
        }
    }
}
