//! Cube sample application
//!
//! Opens a window, builds the render context and spins a lit, textured cube.
//! Keys: I index buffer, L lighting, M display mode, P pause, R rotate vs.
//! mouse, V verbose logging, Q/Esc quit. With rotation off, left-drag rotates
//! and middle-drag scales.

use cube_renderer::prelude::*;
use glfw::{Action, WindowEvent};
use thiserror::Error;

const CONFIG_PATH: &str = "cube_app.toml";

/// Failures that stop the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration could not be read or is invalid
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Window could not be created
    #[error("window: {0}")]
    Window(#[from] WindowError),

    /// Fatal renderer failure
    #[error("renderer: {0}")]
    Render(#[from] VulkanError),
}

/// Window, scene and render context plus the input state between events
pub struct CubeApp {
    context: RenderContext,
    scene: SceneState,
    mouse: MouseTracker,
    clock: FrameClock,
    window: Window,
}

impl CubeApp {
    /// Load configuration and run every initialization stage
    pub fn new() -> Result<Self, AppError> {
        let config = RendererConfig::load_or_default(CONFIG_PATH)?;
        config.validate()?;
        let scene_config = SceneConfig::default();

        log::info!(
            "Creating {}x{} window, {:?} frame mode",
            config.width,
            config.height,
            config.frame_mode
        );
        let window = Window::new(&config.application_name, config.width, config.height)?;
        let scene = SceneState::new(scene_config, config.aspect_ratio());
        let context = RenderContext::new(config, &window, &scene)?;

        Ok(Self {
            context,
            scene,
            mouse: MouseTracker::default(),
            clock: FrameClock::new(),
            window,
        })
    }

    /// Poll, update, render until the window closes or exit is requested
    pub fn run(&mut self) -> Result<(), AppError> {
        log::info!("Initial toggles: {}", self.scene.describe_toggles());

        while !self.window.should_close() && !self.scene.need_to_exit {
            self.window.poll_events();
            self.handle_events();

            self.scene.update(self.clock.elapsed_seconds());
            if self.context.render_frame(&self.scene)?.is_some() {
                self.clock.tick();
            }
        }

        log::info!("Leaving the event loop after {} frames", self.clock.frame_count());
        self.context.wait_idle()?;
        Ok(())
    }

    fn handle_events(&mut self) {
        let events: Vec<WindowEvent> = self.window.flush_events().map(|(_, event)| event).collect();
        for event in events {
            match event {
                WindowEvent::Key(key, _, Action::Press, _) => {
                    if let Some(action) = SceneAction::from_key(key) {
                        self.scene.apply(action);
                        if action == SceneAction::Exit {
                            self.window.set_should_close(true);
                        }
                    }
                }
                WindowEvent::MouseButton(button, Action::Press, _) => {
                    let (x, y) = self.window.cursor_pos();
                    self.mouse.press(MouseButtons::from_glfw(button), x, y);
                }
                WindowEvent::MouseButton(button, Action::Release, _) => {
                    self.mouse.release(MouseButtons::from_glfw(button));
                }
                WindowEvent::CursorPos(x, y) => {
                    let delta = self.mouse.motion(x, y);
                    self.scene.apply_mouse(delta);
                }
                WindowEvent::Close => self.scene.need_to_exit = true,
                _ => {}
            }
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC occurred: {panic_info}");
        if let Some(location) = panic_info.location() {
            eprintln!("Panic location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    log::info!("Starting cube sample");

    let result = CubeApp::new().and_then(|mut app| app.run());
    match result {
        Ok(()) => {
            log::info!("Cube sample finished");
            Ok(())
        }
        Err(e) => {
            log::error!("Application error: {}", e);
            Err(e.into())
        }
    }
}
