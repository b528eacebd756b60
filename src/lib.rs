use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    window::{WindowAttributes, WindowId},
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use web_sys::HtmlCanvasElement;
#[cfg(target_arch = "wasm32")]
use winit::platform::web::WindowAttributesExtWebSys;

pub mod config;
pub mod error;
pub mod gpu;
pub mod rendering;
pub mod sim;
pub mod util;

pub use config::LifeConfig;
pub use error::{ConfigError, GpuInitError};
pub use gpu::GpuSimRenderer;

use sim::{StepScheduler, TickOutcome};

/// Events delivered to the winit event loop
pub enum GpuMessage {
    Initialized(GpuSimRenderer),
    Error(GpuInitError),
    /// The interval timer elapsed.
    Tick,
    TogglePause,
    Stop,
    Resume,
}

struct Application {
    proxy: EventLoopProxy<GpuMessage>,
    gpu_renderer: Option<GpuSimRenderer>,
    config: LifeConfig,
    scheduler: StepScheduler,
    init_requested: bool,
    init_error: Option<GpuInitError>,
    /// For debug logging: time of last tick rate log
    last_tick_log_time: f64,
    /// For debug logging: ticks since last log
    ticks_since_last_log: u32,
    #[cfg(not(target_arch = "wasm32"))]
    last_poll: std::time::Instant,
    #[cfg(target_arch = "wasm32")]
    canvas_id: String,
    #[cfg(target_arch = "wasm32")]
    timer: Option<gloo_timers::callback::Interval>,
}

impl Application {
    fn new(event_loop: &EventLoop<GpuMessage>, config: LifeConfig) -> Self {
        let scheduler = StepScheduler::new(config.tick_interval);
        Self {
            proxy: event_loop.create_proxy(),
            gpu_renderer: None,
            config,
            scheduler,
            init_requested: false,
            init_error: None,
            last_tick_log_time: 0.0,
            ticks_since_last_log: 0,
            #[cfg(not(target_arch = "wasm32"))]
            last_poll: std::time::Instant::now(),
            #[cfg(target_arch = "wasm32")]
            canvas_id: String::new(),
            #[cfg(target_arch = "wasm32")]
            timer: None,
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn window_attributes(&self) -> Result<WindowAttributes, anyhow::Error> {
        let n = self.config.grid_size;
        Ok(WindowAttributes::default()
            .with_title(format!("gridlife {n}x{n}"))
            .with_inner_size(winit::dpi::LogicalSize::new(768.0, 768.0)))
    }

    #[cfg(target_arch = "wasm32")]
    fn window_attributes(&self) -> Result<WindowAttributes, anyhow::Error> {
        let canvas: HtmlCanvasElement = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| anyhow::anyhow!("no document available"))?
            .get_element_by_id(&self.canvas_id)
            .ok_or_else(|| anyhow::anyhow!("no element with id `{}`", self.canvas_id))?
            .dyn_into()
            .map_err(|_| anyhow::anyhow!("`{}` is not a canvas", self.canvas_id))?;
        Ok(WindowAttributes::default().with_canvas(Some(canvas)))
    }

    /// Start delivering ticks at the configured cadence.
    #[cfg(target_arch = "wasm32")]
    fn start_timer(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let proxy = self.proxy.clone();
        let millis = self.scheduler.interval().as_millis().min(u32::MAX as u128) as u32;
        self.timer = Some(gloo_timers::callback::Interval::new(millis, move || {
            let _ = proxy.send_event(GpuMessage::Tick);
        }));
    }

    #[cfg(target_arch = "wasm32")]
    fn stop_timer(&mut self) {
        // dropping the interval cancels it
        self.timer = None;
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn start_timer(&mut self) {
        self.last_poll = std::time::Instant::now();
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn stop_timer(&mut self) {}

    /// Start or cancel the tick source so it matches the scheduler.
    fn sync_timer(&mut self) {
        if self.scheduler.is_running() {
            self.start_timer();
        } else {
            self.stop_timer();
        }
    }

    fn on_tick(&mut self, event_loop: &ActiveEventLoop) {
        match self.scheduler.fire(&mut self.gpu_renderer) {
            Ok(TickOutcome::Stepped) => self.record_tick(),
            Ok(TickOutcome::Skipped) => log::debug!("tick skipped: renderer not ready"),
            Ok(TickOutcome::Stopped) => {}
            Err(e) => self.handle_surface_error(e, event_loop),
        }
    }

    fn record_tick(&mut self) {
        let now = util::now_ms();
        self.ticks_since_last_log += 1;

        // Log actual tick rate every 2 seconds
        if self.last_tick_log_time == 0.0 {
            self.last_tick_log_time = now;
        } else if now - self.last_tick_log_time >= 2000.0 {
            let elapsed_sec = (now - self.last_tick_log_time) / 1000.0;
            let steps = self
                .gpu_renderer
                .as_ref()
                .map_or(0, |r| r.steps());
            log::info!(
                "Actual tick rate: {:.1} ticks/sec (target interval {}), generation {}",
                self.ticks_since_last_log as f64 / elapsed_sec,
                humantime::format_duration(self.scheduler.interval()),
                steps
            );
            self.last_tick_log_time = now;
            self.ticks_since_last_log = 0;
        }
    }

    fn handle_surface_error(&mut self, error: wgpu::SurfaceError, event_loop: &ActiveEventLoop) {
        match error {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                // Reconfigure the surface
                log::debug!("surface {error:?}, reconfiguring");
                if let Some(ref mut renderer) = self.gpu_renderer {
                    renderer.reconfigure();
                }
            }
            wgpu::SurfaceError::OutOfMemory => {
                log::error!("Out of memory!");
                event_loop.exit();
            }
            e => log::warn!("Surface error: {e:?}"),
        }
    }
}

impl ApplicationHandler<GpuMessage> for Application {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.init_requested {
            return;
        }
        self.init_requested = true;

        let start = match self.config.seed_generation() {
            Ok(start) => start,
            Err(e) => {
                log::error!("invalid configuration: {e}");
                event_loop.exit();
                return;
            }
        };
        let window = match self
            .window_attributes()
            .and_then(|attrs| Ok(event_loop.create_window(attrs)?))
        {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let proxy = self.proxy.clone();
        let config = self.config.clone();
        let init = async move {
            let message = match GpuSimRenderer::new(window, start, &config).await {
                Ok(renderer) => GpuMessage::Initialized(renderer),
                Err(e) => GpuMessage::Error(e),
            };
            let _ = proxy.send_event(message);
        };

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(init);

        // On native, use pollster to block on the future
        #[cfg(not(target_arch = "wasm32"))]
        pollster::block_on(init);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.scheduler.stop();
                self.stop_timer();
                self.gpu_renderer = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut renderer) = self.gpu_renderer {
                    renderer.resize(size.width, size.height);
                    renderer.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                // Redraw only; generations advance on ticks
                let result = match self.gpu_renderer {
                    Some(ref renderer) => renderer.render(),
                    None => return,
                };
                if let Err(e) = result {
                    self.handle_surface_error(e, event_loop);
                }
            }
            _ => (),
        };
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: GpuMessage) {
        match event {
            GpuMessage::Initialized(renderer) => {
                log::info!("GPU renderer initialized successfully");
                renderer.request_redraw();
                self.gpu_renderer = Some(renderer);
                self.sync_timer();
            }
            GpuMessage::Error(e) => {
                if e.is_capability_absent() {
                    log::error!("GPU rendering is not available here: {e}");
                } else {
                    log::error!("GPU initialization error: {e}");
                }
                self.init_error = Some(e);
                event_loop.exit();
            }
            GpuMessage::Tick => self.on_tick(event_loop),
            GpuMessage::TogglePause => {
                let running = self.scheduler.toggle();
                self.sync_timer();
                log::info!("Simulation {}", if running { "resumed" } else { "paused" });
            }
            GpuMessage::Stop => {
                self.scheduler.stop();
                self.sync_timer();
                log::info!("Simulation stopped");
            }
            GpuMessage::Resume => {
                if !self.scheduler.is_running() {
                    self.scheduler.resume();
                    self.sync_timer();
                    log::info!("Simulation resumed");
                }
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        use winit::event_loop::ControlFlow;

        let now = std::time::Instant::now();
        let elapsed = now.duration_since(self.last_poll);
        self.last_poll = now;
        if self.scheduler.advance(elapsed) {
            self.on_tick(event_loop);
        }
        if self.scheduler.is_running() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(now + self.scheduler.remaining()));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        let stats = self.scheduler.statistics();
        log::info!(
            "Exiting after {} ticks ({} stepped, {} skipped, {} intervals dropped)",
            stats.fired,
            stats.stepped,
            stats.skipped,
            stats.dropped_intervals
        );
    }
}

/// Route `log` output through fern: the browser console on wasm, stdout
/// elsewhere.
#[cfg(target_arch = "wasm32")]
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("wgpu_core", log::LevelFilter::Warn)
        .level_for("wgpu_hal", log::LevelFilter::Warn)
        .chain(fern::Output::call(console_log::log))
        .apply()
}

#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339_seconds(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("wgpu_core", log::LevelFilter::Warn)
        .level_for("wgpu_hal", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()
}

/// Open a window and run the simulation until it is closed.
///
/// Initialization failures are fatal and returned once the event loop exits.
#[cfg(not(target_arch = "wasm32"))]
pub fn run(config: LifeConfig) -> Result<(), anyhow::Error> {
    config.validate()?;
    log::info!(
        "Starting {n}x{n} simulation, one generation every {}",
        humantime::format_duration(config.tick_interval),
        n = config.grid_size
    );

    let event_loop = EventLoop::<GpuMessage>::with_user_event().build()?;
    let mut app = Application::new(&event_loop, config);
    event_loop.run_app(&mut app)?;
    match app.init_error.take() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Attach the simulation to the canvas with id `canvas_id`.
#[cfg(target_arch = "wasm32")]
pub fn run_in_canvas(config: LifeConfig, canvas_id: &str) -> Result<(), anyhow::Error> {
    use winit::platform::web::EventLoopExtWebSys;

    config.validate()?;
    log::info!(
        "Starting {n}x{n} simulation, one generation every {}",
        humantime::format_duration(config.tick_interval),
        n = config.grid_size
    );

    let event_loop = EventLoop::<GpuMessage>::with_user_event().build()?;
    let mut app = Application::new(&event_loop, config);
    app.canvas_id = canvas_id.to_string();
    CONTROL_PROXY.with(|p| *p.borrow_mut() = Some(event_loop.create_proxy()));
    event_loop.spawn_app(app);
    Ok(())
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static CONTROL_PROXY: std::cell::RefCell<Option<EventLoopProxy<GpuMessage>>> =
        const { std::cell::RefCell::new(None) };
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn initialize() {
    console_error_panic_hook::set_once();
    let _ = init_logging(log::LevelFilter::Debug);
}

/// Start the simulation in the given canvas. `grid_size` and `tick_ms`
/// default to 128 and 200.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn start(
    canvas_id: &str,
    grid_size: Option<u32>,
    tick_ms: Option<u32>,
) -> Result<(), JsValue> {
    let mut config = LifeConfig::default();
    if let Some(n) = grid_size {
        config.grid_size = n;
    }
    if let Some(ms) = tick_ms {
        config.tick_interval = std::time::Duration::from_millis(ms as u64);
    }
    run_in_canvas(config, canvas_id).map_err(|e| JsValue::from_str(&format!("{e:#}")))
}

/// Controller for the running simulation
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct LifeController;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl LifeController {
    /// Toggle pause state
    #[wasm_bindgen]
    pub fn toggle_pause() {
        Self::send(GpuMessage::TogglePause);
    }

    /// Stop the simulation
    #[wasm_bindgen]
    pub fn stop() {
        Self::send(GpuMessage::Stop);
    }

    /// Resume the simulation (after stop)
    #[wasm_bindgen]
    pub fn resume() {
        Self::send(GpuMessage::Resume);
    }

    fn send(message: GpuMessage) {
        CONTROL_PROXY.with(|p| {
            if let Some(proxy) = p.borrow().as_ref() {
                if proxy.send_event(message).is_err() {
                    log::warn!("simulation event loop has already exited");
                }
            }
        });
    }
}
