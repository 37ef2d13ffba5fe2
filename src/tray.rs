use crate::paths::AppPaths;
use anyhow::Result;
use image::{Rgba, RgbaImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub const TRAY_ICON_SIZE: u32 = 64;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Requests sent from the tray thread to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    Show,
    Settings,
    Exit,
}

impl TrayCommand {
    /// Menu order.
    pub const ALL: [TrayCommand; 3] = [TrayCommand::Show, TrayCommand::Settings, TrayCommand::Exit];

    pub fn menu_id(self) -> &'static str {
        match self {
            TrayCommand::Show => "show",
            TrayCommand::Settings => "settings",
            TrayCommand::Exit => "exit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrayCommand::Show => "Show SecClock",
            TrayCommand::Settings => "Settings",
            TrayCommand::Exit => "Exit",
        }
    }

    pub fn from_menu_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.menu_id() == id)
    }
}

/// Icon shown in the tray. Falls back to a generated square when the icon
/// file is missing or unreadable.
pub fn tray_icon_image(path: &Path) -> RgbaImage {
    match image::open(path) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            tracing::debug!(path = %path.display(), "tray icon unavailable: {e}; generating one");
            fallback_icon()
        }
    }
}

fn fallback_icon() -> RgbaImage {
    let inner = TRAY_ICON_SIZE / 4..TRAY_ICON_SIZE * 3 / 4;
    RgbaImage::from_fn(TRAY_ICON_SIZE, TRAY_ICON_SIZE, |x, y| {
        if inner.contains(&x) && inner.contains(&y) {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0x33, 0x33, 0x33, 255])
        }
    })
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Owns the tray thread for the lifetime of the app.
pub struct TrayController {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TrayController {
    pub fn spawn(
        paths: &AppPaths,
        commands: Sender<TrayCommand>,
        waker: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let waker: Waker = Arc::new(waker);
        let handle = spawn_platform(paths, commands, waker, Arc::clone(&stop))?;
        Ok(Self { stop, handle })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the tray thread. If it does not finish within two seconds the
    /// process is terminated.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let join_result = handle.join();
            let _ = done_tx.send(join_result);
        });

        match done_rx.recv_timeout(SHUTDOWN_TIMEOUT) {
            Ok(Ok(())) => tracing::debug!("tray thread stopped"),
            Ok(Err(_)) => tracing::error!("tray thread panicked during shutdown"),
            Err(e) => {
                tracing::error!("tray thread did not stop ({e}); exiting");
                std::process::exit(0);
            }
        }
    }
}

impl Drop for TrayController {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(target_os = "windows")]
fn spawn_platform(
    paths: &AppPaths,
    commands: Sender<TrayCommand>,
    waker: Waker,
    stop: Arc<AtomicBool>,
) -> Result<Option<JoinHandle<()>>> {
    let icon = tray_icon_image(&paths.icon_file());
    let handle = std::thread::Builder::new()
        .name("tray".into())
        .spawn(move || {
            if let Err(e) = run_tray(icon, &commands, &waker, &stop) {
                tracing::error!("system tray failed: {e:#}");
            }
        })?;
    Ok(Some(handle))
}

#[cfg(not(target_os = "windows"))]
fn spawn_platform(
    _paths: &AppPaths,
    _commands: Sender<TrayCommand>,
    _waker: Waker,
    _stop: Arc<AtomicBool>,
) -> Result<Option<JoinHandle<()>>> {
    tracing::info!("system tray not supported on this platform");
    Ok(None)
}

#[cfg(target_os = "windows")]
fn run_tray(
    icon: RgbaImage,
    commands: &Sender<TrayCommand>,
    waker: &Waker,
    stop: &AtomicBool,
) -> Result<()> {
    use tray_icon::menu::{Menu, MenuEvent, MenuItem};
    use tray_icon::{Icon, TrayIconBuilder};

    let menu = Menu::new();
    for command in TrayCommand::ALL {
        menu.append(&MenuItem::with_id(command.menu_id(), command.label(), true, None))?;
    }
    let (width, height) = icon.dimensions();
    let icon = Icon::from_rgba(icon.into_raw(), width, height)?;
    let _tray = TrayIconBuilder::new()
        .with_menu(Box::new(menu))
        .with_tooltip(crate::autostart::APP_NAME)
        .with_icon(icon)
        .build()?;
    tracing::info!("system tray started");

    let events = MenuEvent::receiver();
    while !stop.load(Ordering::SeqCst) {
        pump_messages();
        while let Ok(event) = events.try_recv() {
            let Some(command) = TrayCommand::from_menu_id(event.id.0.as_str()) else {
                continue;
            };
            tracing::debug!(?command, "tray menu selected");
            if commands.send(command).is_err() {
                return Ok(());
            }
            waker();
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}

#[cfg(target_os = "windows")]
fn pump_messages() {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
    };

    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).into() {
            let _ = TranslateMessage(&msg);
            let _ = DispatchMessageW(&msg);
        }
    }
}
