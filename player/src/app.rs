//! Windowed player: winit event loop driving the frame driver

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use hotloop_core::config::Config;
use hotloop_core::{AudioDevice, ControlKeys, CpalDevice, FrameClock, FrameDriver, InputManager};

use crate::graphics::FramePresenter;
use crate::session;

/// Application state
pub struct App {
    config: Config,
    driver: FrameDriver,
    input: InputManager,
    clock: FrameClock,
    /// Window handle (created during resumed event)
    window: Option<Arc<Window>>,
    /// Graphics backend (initialized after window creation)
    graphics: Option<FramePresenter>,
    should_exit: bool,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let device = if config.audio.enabled {
            match CpalDevice::new(config.audio.sample_rate, config.audio.buffer_ms) {
                Ok(device) => Some(Box::new(device) as Box<dyn AudioDevice>),
                Err(e) => {
                    tracing::warn!("Audio unavailable, continuing without sound: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let driver = session::build_driver(&config, device)?;
        let control_keys =
            ControlKeys::from_config(&config.replay).context("Invalid replay key binding")?;
        let input = InputManager::new(config.input.clone(), control_keys);
        let clock = FrameClock::new(config.timing.update_hz);

        Ok(Self {
            config,
            driver,
            input,
            clock,
            window: None,
            graphics: None,
            should_exit: false,
        })
    }

    fn handle_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(graphics) = &mut self.graphics {
            graphics.resize(width, height);
        }
        self.driver.resize(width, height);
    }

    fn handle_key(&mut self, code: KeyCode, state: ElementState) {
        if code == KeyCode::Escape && state.is_pressed() {
            self.should_exit = true;
            return;
        }
        self.input.update_keyboard(code, state.is_pressed());
    }

    fn step(&mut self) {
        let Some(graphics) = self.graphics.as_mut() else {
            return;
        };

        self.clock.start_frame();
        let sample = self.input.sample();
        let controls = self.input.drain_controls();
        let report = self.driver.run_frame(sample, &controls, graphics);
        self.clock.finish_frame();

        if report.reloaded
            && let Some(window) = &self.window
        {
            window.set_title(&format!("Hotloop - reloaded at frame {}", report.frame));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Hotloop")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.video.width,
                self.config.video.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                tracing::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let graphics = match FramePresenter::new(window.clone(), self.config.video.vsync) {
            Ok(g) => g,
            Err(e) => {
                tracing::error!("Failed to initialize graphics: {:#}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.driver.resize(size.width.max(1), size.height.max(1));
        self.graphics = Some(graphics);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("Close requested");
                self.should_exit = true;
            }
            WindowEvent::Resized(new_size) => {
                tracing::debug!("Window resized to {:?}", new_size);
                self.handle_resize(new_size.width, new_size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key
                    && !event.repeat
                {
                    self.handle_key(code, event.state);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.update_mouse_position(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let index = match button {
                    MouseButton::Left => 0,
                    MouseButton::Right => 1,
                    MouseButton::Middle => 2,
                    _ => return,
                };
                self.input.update_mouse_button(index, state.is_pressed());
            }
            WindowEvent::Focused(false) => {
                self.input.clear();
            }
            _ => {}
        }

        if self.should_exit {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        if self.clock.is_due(Instant::now()) {
            self.step();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.clock.next_deadline()));
    }
}

pub fn run(config: Config) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config)?;

    event_loop
        .run_app(&mut app)
        .context("Event loop error")?;

    tracing::info!(
        "Exiting after {} frames ({} over budget)",
        app.clock.frames(),
        app.clock.overruns()
    );
    Ok(())
}
