use crate::background::{
    BackgroundController, BackgroundJob, BackgroundLoader, BackgroundOutcome, BackgroundSource,
    ImageFetcher, REMOTE_URLS,
};
use crate::clock::{ClockView, TickChanges};
use crate::compositor::placeholder;
use crate::glyph::ClockFont;
use crate::mask::MaskProvider;
use crate::paths::AppPaths;
use crate::settings::{Settings, SettingsStore, SizePreset};
use chrono::NaiveTime;
use image::{GrayImage, RgbaImage};
use std::sync::Arc;

pub const BUTTON_SIZE: f32 = 25.0;
const BUTTON_MARGIN: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetButton {
    Settings,
    Rotate,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ButtonRect {
    fn square(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            width: BUTTON_SIZE,
            height: BUTTON_SIZE,
        }
    }

    /// Edges are inclusive.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Positions of the fixed-role buttons for a canvas of a given width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonLayout {
    pub settings: ButtonRect,
    pub rotate: ButtonRect,
    pub close: ButtonRect,
}

impl ButtonLayout {
    pub fn for_width(width: u32) -> Self {
        let w = width as f32;
        Self {
            settings: ButtonRect::square(BUTTON_MARGIN, BUTTON_MARGIN),
            rotate: ButtonRect::square(w - 70.0, BUTTON_MARGIN),
            close: ButtonRect::square(w - 35.0, BUTTON_MARGIN),
        }
    }

    pub fn buttons(&self) -> [(WidgetButton, ButtonRect); 3] {
        [
            (WidgetButton::Settings, self.settings),
            (WidgetButton::Rotate, self.rotate),
            (WidgetButton::Close, self.close),
        ]
    }

    pub fn hit(&self, x: f32, y: f32) -> Option<WidgetButton> {
        self.buttons()
            .into_iter()
            .find(|(_, rect)| rect.contains(x, y))
            .map(|(button, _)| button)
    }
}

/// Pointer state observed by the front end in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    pub primary_down: bool,
    /// A button was released this frame.
    pub released: bool,
    /// The pointer is over the window.
    pub inside: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Reconfiguring,
}

fn can_transition(from: Lifecycle, to: Lifecycle) -> bool {
    matches!(
        (from, to),
        (Lifecycle::Running, Lifecycle::Reconfiguring) | (Lifecycle::Reconfiguring, Lifecycle::Running)
    )
}

#[derive(Debug, Clone, Copy, Default)]
struct DragState {
    enabled: bool,
    anchor: Option<(f32, f32)>,
}

/// Background bitmap currently on display.
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: Arc<RgbaImage>,
    pub placeholder: bool,
    pub source: Option<BackgroundSource>,
    /// Increases every time a new composite is installed.
    pub revision: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconfigureReport {
    pub preset: SizePreset,
    pub canvas: (u32, u32),
    pub font_loaded: bool,
    pub local_background: bool,
}

/// Toolkit independent state of the clock window.
pub struct ClockWidget {
    store: SettingsStore,
    paths: AppPaths,
    masks: MaskProvider,
    font: Option<ClockFont>,
    preset: SizePreset,
    mask: GrayImage,
    position: (i32, i32),
    clock: Option<ClockView>,
    remote_urls: Vec<String>,
    background: BackgroundController,
    loader: BackgroundLoader,
    composite: Option<Composite>,
    composite_revision: u64,
    generation: u64,
    buttons: ButtonLayout,
    drag: DragState,
    lifecycle: Lifecycle,
}

impl ClockWidget {
    pub fn new(
        paths: AppPaths,
        store: SettingsStore,
        fetcher: Arc<dyn ImageFetcher>,
        now: NaiveTime,
    ) -> Self {
        let urls = REMOTE_URLS.iter().map(|u| u.to_string()).collect();
        Self::with_remote_urls(paths, store, fetcher, urls, now)
    }

    /// Like [`ClockWidget::new`] but rotating through `urls` online.
    pub fn with_remote_urls(
        paths: AppPaths,
        store: SettingsStore,
        fetcher: Arc<dyn ImageFetcher>,
        urls: Vec<String>,
        now: NaiveTime,
    ) -> Self {
        let masks = MaskProvider::new(paths.clone());
        let settings = store.settings().clone();
        let preset = settings.window_size;
        let mut widget = Self {
            font: load_font(&paths, &settings),
            mask: masks.mask_for(preset),
            position: (settings.window_x, settings.window_y),
            clock: None,
            background: BackgroundController::with_remote_urls(&settings, urls.clone()),
            remote_urls: urls,
            loader: BackgroundLoader::new(fetcher, masks.clone()),
            composite: None,
            composite_revision: 0,
            generation: 0,
            buttons: ButtonLayout::for_width(preset.dimensions().0),
            drag: DragState {
                enabled: !settings.lock_dragging,
                anchor: None,
            },
            lifecycle: Lifecycle::Running,
            masks,
            preset,
            paths,
            store,
        };
        widget.start_background();
        widget.rebuild_clock(now);
        widget
    }

    /// Called by the loader after each outcome is queued.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.loader.set_waker(waker);
    }

    pub fn settings(&self) -> &Settings {
        self.store.settings()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn preset(&self) -> SizePreset {
        self.preset
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.preset.dimensions()
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    pub fn clock(&self) -> Option<&ClockView> {
        self.clock.as_ref()
    }

    pub fn composite(&self) -> Option<&Composite> {
        self.composite.as_ref()
    }

    pub fn buttons(&self) -> &ButtonLayout {
        &self.buttons
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn background(&self) -> &BackgroundController {
        &self.background
    }

    pub fn font_loaded(&self) -> bool {
        self.font.is_some()
    }

    pub fn tick(&mut self, now: NaiveTime) -> TickChanges {
        match self.clock.as_mut() {
            Some(clock) => clock.tick(now),
            None => TickChanges::default(),
        }
    }

    /// Load the next background in the rotation on a worker thread.
    pub fn refresh_background(&mut self) {
        self.generation += 1;
        let job = self
            .background
            .refresh_job(&mut self.store, self.preset, self.generation);
        self.submit(job);
    }

    /// Install finished background work. Outcomes from an older generation
    /// are dropped. Returns `true` when a new composite was installed.
    pub fn poll_background(&mut self) -> bool {
        let mut installed = false;
        while let Some(outcome) = self.loader.try_recv() {
            installed |= self.accept(outcome);
        }
        installed
    }

    /// Block up to `timeout` for the next outcome. Used by tests and at
    /// startup.
    pub fn wait_for_background(&mut self, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.loader.recv_timeout(remaining) {
                Some(outcome) => {
                    if self.accept(outcome) {
                        return true;
                    }
                }
                None => return false,
            }
        }
    }

    pub fn drag_enabled(&self) -> bool {
        self.drag.enabled
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.anchor.is_some()
    }

    /// Start moving the window from `pointer` (canvas coordinates). Ignored
    /// while dragging is locked or when the pointer is over a button.
    pub fn begin_drag(&mut self, pointer: (f32, f32)) -> bool {
        if !self.drag.enabled || self.buttons.hit(pointer.0, pointer.1).is_some() {
            return false;
        }
        self.drag.anchor = Some(pointer);
        true
    }

    /// Record where the window moved to during a drag.
    pub fn drag_to(&mut self, window_pos: (i32, i32)) {
        if self.drag.anchor.is_none() || window_pos == self.position {
            return;
        }
        self.position = window_pos;
        if self.store.settings().remember_position {
            self.store.update(|s| {
                s.window_x = window_pos.0;
                s.window_y = window_pos.1;
            });
        }
    }

    pub fn end_drag(&mut self) {
        self.drag.anchor = None;
    }

    /// End a drag whose button release may have been swallowed by the OS
    /// move loop. Returns whether a drag was ended.
    pub fn settle_drag(&mut self, pointer: PointerSample) -> bool {
        if !self.is_dragging() {
            return false;
        }
        if pointer.primary_down && !pointer.released && pointer.inside {
            return false;
        }
        tracing::debug!(?pointer, position = ?self.position, "drag finished");
        self.end_drag();
        true
    }

    /// Track a move that did not come from a drag, e.g. the window manager
    /// placing the window. Nothing is persisted.
    pub fn observe_position(&mut self, window_pos: (i32, i32)) {
        if self.drag.anchor.is_none() {
            self.position = window_pos;
        }
    }

    /// Apply `new` to the live widget without restarting.
    ///
    /// Every step substitutes a default on failure, so the buttons and drag
    /// binding are always rebuilt.
    pub fn reconfigure(&mut self, new: Settings, now: NaiveTime) -> ReconfigureReport {
        self.transition(Lifecycle::Reconfiguring);

        self.store.replace(new.clone());
        self.font = load_font(&self.paths, &new);
        self.background = BackgroundController::with_remote_urls(&new, self.remote_urls.clone());
        self.preset = new.window_size;
        self.mask = self.masks.mask_for(self.preset);

        self.clock = None;
        self.composite = None;
        self.drag = DragState::default();

        self.start_background();
        self.rebuild_clock(now);

        self.buttons = ButtonLayout::for_width(self.canvas_size().0);
        self.drag.enabled = !new.lock_dragging;

        self.transition(Lifecycle::Running);
        let report = ReconfigureReport {
            preset: self.preset,
            canvas: self.canvas_size(),
            font_loaded: self.font.is_some(),
            local_background: self.background.is_local(),
        };
        tracing::info!(?report, "widget reconfigured");
        report
    }

    fn transition(&mut self, to: Lifecycle) {
        if !can_transition(self.lifecycle, to) {
            tracing::warn!(from = ?self.lifecycle, ?to, "unexpected lifecycle transition");
        }
        self.lifecycle = to;
    }

    // Shows the placeholder right away and loads the real background at the
    // current size, ignoring whatever was loaded before.
    fn start_background(&mut self) {
        self.generation += 1;
        let size = self.canvas_size();
        self.install(Arc::new(placeholder(size, &self.mask)), true, None);
        let job = self
            .background
            .initial_job(&mut self.store, self.preset, self.generation);
        self.submit(job);
    }

    fn submit(&self, job: Option<BackgroundJob>) {
        match job {
            Some(job) => {
                tracing::debug!(source = %job.source, generation = job.generation, "loading background");
                self.loader.submit(job);
            }
            None => tracing::warn!("no background source available"),
        }
    }

    fn accept(&mut self, outcome: BackgroundOutcome) -> bool {
        if outcome.generation != self.generation {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                "dropping stale background"
            );
            return false;
        }
        if outcome.image.dimensions() != self.canvas_size() {
            tracing::warn!(size = ?outcome.image.dimensions(), "background size mismatch; dropping");
            return false;
        }
        self.install(Arc::new(outcome.image), outcome.placeholder, Some(outcome.source));
        true
    }

    fn install(&mut self, image: Arc<RgbaImage>, placeholder: bool, source: Option<BackgroundSource>) {
        self.composite_revision += 1;
        self.composite = Some(Composite {
            image,
            placeholder,
            source,
            revision: self.composite_revision,
        });
    }

    fn rebuild_clock(&mut self, now: NaiveTime) {
        let settings = self.store.settings();
        self.clock = Some(ClockView::build(
            now,
            self.font.as_ref(),
            settings.font_rgb(),
            settings.font_size,
            self.canvas_size(),
        ));
    }
}

fn load_font(paths: &AppPaths, settings: &Settings) -> Option<ClockFont> {
    let path = paths.font_file();
    match ClockFont::load(&path, settings.font_size) {
        Ok(font) => {
            tracing::info!(path = %path.display(), size = settings.font_size, "clock font loaded");
            Some(font)
        }
        Err(e) => {
            tracing::warn!("clock font unavailable: {e:#}; using fallback clock");
            None
        }
    }
}
