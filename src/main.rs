#![cfg_attr(feature = "windows_gui", windows_subsystem = "windows")]

use eframe::egui;
use once_cell::sync::OnceCell;
use sec_clock::background::{HttpFetcher, ImageFetcher};
use sec_clock::gui::ClockApp;
use sec_clock::logging;
use sec_clock::paths::AppPaths;
use sec_clock::settings::SettingsStore;
use sec_clock::tray::TrayController;
use sec_clock::widget::ClockWidget;
use std::sync::{mpsc, Arc};

fn main() -> anyhow::Result<()> {
    let debug = std::env::args().skip(1).any(|arg| arg == "--debug");
    let paths = AppPaths::resolve()?;
    logging::init(debug, debug.then(|| paths.log_file()));
    paths.ensure_dirs();

    let store = SettingsStore::load(paths.settings_file());
    let settings = store.settings().clone();
    tracing::info!(preset = %settings.window_size, "starting SecClock");

    let fetcher: Arc<dyn ImageFetcher> = Arc::new(HttpFetcher::new()?);
    let widget = ClockWidget::new(paths.clone(), store, fetcher, chrono::Local::now().time());

    let repaint: Arc<OnceCell<egui::Context>> = Arc::new(OnceCell::new());
    let (tray_tx, tray_rx) = mpsc::channel();
    let tray_waker = Arc::clone(&repaint);
    let mut tray = match TrayController::spawn(&paths, tray_tx, move || {
        if let Some(ctx) = tray_waker.get() {
            ctx.request_repaint();
        }
    }) {
        Ok(tray) => Some(tray),
        Err(e) => {
            tracing::error!("failed to start system tray: {e:#}");
            None
        }
    };
    let tray_available = tray.as_ref().is_some_and(|t| t.is_running());

    let (width, height) = settings.window_size.dimensions();
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("SecClock")
            .with_inner_size([width as f32, height as f32])
            .with_position([settings.window_x as f32, settings.window_y as f32])
            .with_decorations(false)
            .with_transparent(true)
            .with_resizable(false)
            .with_taskbar(false)
            .with_always_on_top(),
        ..Default::default()
    };

    let result = eframe::run_native(
        "SecClock",
        native_options,
        Box::new(move |cc| {
            let _ = repaint.set(cc.egui_ctx.clone());
            Box::new(ClockApp::new(cc, widget, Some(tray_rx), tray_available))
        }),
    );

    if let Some(tray) = tray.as_mut() {
        tray.shutdown();
    }
    result.map_err(|e| anyhow::anyhow!("failed to run SecClock: {e}"))
}
