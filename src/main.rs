use eframe::egui;
use embassy_executor::{Executor, Spawner};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use env_logger::Builder;
use log::LevelFilter;
use std::thread;

mod common;
mod simulation;
mod ui;

use common::config::SimulationConfig;
use simulation::log_capture::{TeeLogger, init_log_capture};
use ui::{AppState, UICommand, UIRefreshState};

const UI_REFRESH_QUEUE_SIZE: usize = 100;
type UIRefreshQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;
pub type UIRefreshQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;
pub type UIRefreshQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UIRefreshState, UI_REFRESH_QUEUE_SIZE>;

const UI_COMMAND_QUEUE_SIZE: usize = 32;
type UICommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;
pub type UICommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;
pub type UICommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, UICommand, UI_COMMAND_QUEUE_SIZE>;

fn embassy_init(spawner: Spawner, config: SimulationConfig, ui_refresh_tx: UIRefreshQueueSender, ui_command_rx: UICommandQueueReceiver) {
    let _ = spawner.spawn(simulation::network_task(config, ui_refresh_tx, ui_command_rx));
}

/// env_logger writes to the terminal; the tee also feeds the node inspector.
fn init_logging(log_filter: Option<&str>) {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info).filter(Some("batman_mesh_simulator"), LevelFilter::Debug);
    if let Some(filters) = log_filter {
        builder.parse_filters(filters);
    }

    init_log_capture();
    let logger = TeeLogger::new(builder.build());
    let max_level = logger.filter();
    if log::set_logger(Box::leak(Box::new(logger))).is_ok() {
        log::set_max_level(max_level);
    }
}

fn main() {
    let config_path = SimulationConfig::resolve_path(std::env::args().nth(1));
    let loaded = match &config_path {
        Some(path) => SimulationConfig::load(path).map(Some),
        None => Ok(None),
    };
    let (config, config_error) = match loaded {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(err) => (SimulationConfig::default(), Some(err)),
    };

    init_logging(config.log_filter.as_deref());
    log::info!("Starting up");

    let ui_refresh_queue: &'static UIRefreshQueue = Box::leak(Box::new(UIRefreshQueue::new()));
    let ui_command_queue: &'static UICommandQueue = Box::leak(Box::new(UICommandQueue::new()));

    let ui_refresh_tx = ui_refresh_queue.sender();
    let ui_refresh_rx = ui_refresh_queue.receiver();
    let ui_command_tx = ui_command_queue.sender();
    let ui_command_rx = ui_command_queue.receiver();

    match (&config_path, config_error) {
        (_, Some(err)) => {
            log::error!("{:#}", err);
            let _ = ui_refresh_tx.try_send(UIRefreshState::Alert(format!("{:#}\nUsing default configuration.", err)));
        }
        (Some(path), None) => log::info!("Loaded configuration file: {}", path.display()),
        (None, None) => log::info!("No configuration file, using defaults"),
    }

    // Spawn Embassy executor on a dedicated background thread
    let _embassy_handle = thread::Builder::new()
        .name("embassy-executor".to_string())
        .spawn(move || {
            // Leak the executor to satisfy the 'static lifetime required by run()
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(|spawner| embassy_init(spawner, config, ui_refresh_tx, ui_command_rx));
        })
        .expect("failed to spawn embassy thread");

    // Start the GUI on the main thread (required on macOS)
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        ..Default::default()
    };
    if let Err(err) = eframe::run_native(
        "B.A.T.M.A.N. Mesh Simulator",
        native_options,
        Box::new(move |cc| Ok(Box::new(AppState::new(ui_refresh_rx, ui_command_tx, cc.storage)))),
    ) {
        log::error!("GUI terminated with error: {}", err);
    }
}
