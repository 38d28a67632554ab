use crate::renderer::{Scene, SkiaRenderer};
use anyhow::{Context, Result};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::ThreadRng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vrt_core::RenderCommand;
use vrt_experiment::{DirectorySink, ExperimentConfig, ExperimentController, ResponseInput};
use vrt_timing::{DeadlineScheduler, HighPrecisionTimer, Timer};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

type Experiment = ExperimentController<DeadlineScheduler<HighPrecisionTimer>, ThreadRng>;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    experiment: Experiment,
    timer: HighPrecisionTimer,
    renderer: Option<SkiaRenderer>,
    scene: Scene,
    sink: DirectorySink,
    scale_factor: f64,

    should_exit: bool,
}

impl App {
    pub fn new(config: ExperimentConfig, sink: DirectorySink) -> Result<Self> {
        let timer = HighPrecisionTimer::new();
        let experiment =
            ExperimentController::new(config, DeadlineScheduler::new(timer.clone()), rand::rng())?;
        let mut scene = Scene::default();
        scene.apply_all(&experiment.initial_commands());

        Ok(Self {
            window: None,
            pixels: None,
            experiment,
            timer,
            renderer: None,
            scene,
            sink,
            scale_factor: 1.0,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!("=== VISUAL REACTION TEST ===");
        info!("Platform: {}", std::env::consts::OS);
        info!("Press ENTER to start, SPACE to react, ESC to abort or exit.");

        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .context("No monitor available")?;

        let window_attributes = Window::default_attributes()
            .with_title("Visual Reaction Test")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.scale_factor = window.scale_factor();

        info!(
            "Display: {}x{} at scale {:.2}",
            physical_size.width, physical_size.height, self.scale_factor
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
        )?);

        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };
        let started = Instant::now();
        renderer.render_frame(&self.scene, pixels.frame_mut())?;
        pixels.render()?;
        debug!("frame presented in {:.3} ms", started.elapsed().as_secs_f64() * 1e3);
        Ok(())
    }

    /// Folds render commands into the scene and schedules a redraw if needed.
    fn present(&mut self, commands: Vec<RenderCommand>) {
        for command in &commands {
            match command {
                RenderCommand::LastLatency { latency_ms } => {
                    let (done, total) = self.experiment.trial_progress();
                    info!("Trial {done}/{total}: {latency_ms} ms");
                }
                RenderCommand::OfferDownload { file_name } => {
                    info!("Download ready: {}", self.sink.dir.join(file_name).display());
                }
                _ => {}
            }
        }
        if self.scene.apply_all(&commands) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    fn react(&mut self) {
        let now = self.timer.now();
        match self.experiment.handle_user_input(now) {
            Ok(commands) => self.present(commands),
            Err(e) => error!("Reaction failed: {e}"),
        }
    }

    fn press_control(&mut self) {
        let now = self.timer.now();
        match self.experiment.press_control(now, &mut self.sink) {
            Ok(commands) => self.present(commands),
            Err(e) => error!("Control action failed: {e}"),
        }
    }

    fn handle_key(&mut self, key: PhysicalKey, event_loop: &ActiveEventLoop) {
        let PhysicalKey::Code(code) = key else {
            return;
        };
        match code {
            KeyCode::Space if self.experiment.config().response_input == ResponseInput::Space => {
                self.react()
            }
            KeyCode::Enter | KeyCode::NumpadEnter => self.press_control(),
            KeyCode::Escape => {
                if self.experiment.phase().is_running() {
                    match self.experiment.abort() {
                        Ok(commands) => self.present(commands),
                        Err(e) => error!("Abort failed: {e}"),
                    }
                } else {
                    self.cleanup_and_exit(event_loop);
                }
            }
            other => warn!("Key: {other:?}"),
        }
    }

    fn update(&mut self, event_loop: &ActiveEventLoop) {
        match self.experiment.tick() {
            Ok(commands) => self.present(commands),
            Err(e) => error!("Timer delivery failed: {e}"),
        }
        let flow = match self.experiment.next_deadline_in() {
            Some(wait) => ControlFlow::WaitUntil(Instant::now() + wait),
            None => ControlFlow::Wait,
        };
        event_loop.set_control_flow(flow);
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("Failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("Failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!("Failed to resize canvas: {e}");
            }
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
        info!("Display resized to: {}x{}", new_size.width, new_size.height);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if self.experiment.phase().is_running() {
            if let Err(e) = self.experiment.abort() {
                error!("Abort failed: {e}");
            }
        }
        info!("Experiment closed.");
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("Failed to create window and surface: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    error!("Render error: {e}");
                }
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_key(event.physical_key, event_loop);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if self.experiment.config().response_input == ResponseInput::PointerPrimary => {
                self.react();
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
            return;
        }
        self.update(event_loop);
    }
}
