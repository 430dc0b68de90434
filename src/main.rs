pub mod config;
pub mod controller;
pub mod device;
pub mod mode;
pub mod navigation;
pub mod ui;

use crate::config::Config;
use crate::controller::ReaderHandle;
use crate::device::{SharedDevice, VirtualInputDevice};
use crate::navigation::KeyboardLayout;
use crate::ui::{KeyboardPanel, PanelDispatcher, SharedPanelView, UiHandle};
use color_eyre::{eyre::eyre, Result};
use eframe::egui;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = Config::load().await?;

    let layout = Arc::new(KeyboardLayout::standard());
    info!("Keyboard layout ready with {} keys", layout.len());

    // An inert device still lets the controller drive the on-screen keyboard
    let device = SharedDevice::new(VirtualInputDevice::initialize(
        &config.device.name,
        config.orientation,
    ));

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_watcher(shutdown.clone());

    let (ui_handle, ui_commands) = UiHandle::channel();

    info!("Initializing controller from {}", config.input.controller_path.display());
    let mut reader = ReaderHandle::spawn(
        &config,
        layout.clone(),
        device.clone(),
        Box::new(ui_handle.clone()),
        shutdown.clone(),
    )
    .map_err(|e| eyre!("Failed to spawn event reader: {}", e))?;

    info!("Starting on-screen keyboard");
    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = egui::ViewportBuilder::default()
        .with_title("Padboard")
        .with_inner_size([640.0, 200.0])
        .with_resizable(false)
        .with_always_on_top();

    let view = SharedPanelView::default();
    let dispatcher = PanelDispatcher::new(layout.clone(), view.clone(), device.clone());
    let dispatcher_shutdown = shutdown.clone();

    let ui_result = eframe::run_native(
        "Padboard",
        native_options,
        Box::new(move |cc| {
            tokio::spawn(dispatcher.run(
                ui_commands,
                Some(cc.egui_ctx.clone()),
                dispatcher_shutdown,
            ));
            Ok(Box::new(KeyboardPanel::new(cc, layout, view, ui_handle)))
        }),
    );

    info!("Keyboard window closed, shutting down");
    shutdown.cancel();
    reader.join();
    // the reader already released the device unless it never got a controller
    device.shutdown();

    ui_result.map_err(|e| eyre!("UI error: {}", e))
}

fn spawn_ctrl_c_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
