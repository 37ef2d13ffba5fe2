use anyhow::anyhow;
use chrono::NaiveTime;
use image::DynamicImage;
use sec_clock::background::{BackgroundSource, ImageFetcher, REMOTE_URLS};
use sec_clock::compositor::PLACEHOLDER_RGB;
use sec_clock::mask::synthesize_mask;
use sec_clock::paths::AppPaths;
use sec_clock::settings::{Settings, SettingsStore, SizePreset};
use sec_clock::widget::{ClockWidget, Lifecycle, PointerSample, WidgetButton};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Every request times out.
#[derive(Default)]
struct TimeoutFetcher {
    calls: AtomicUsize,
}

impl ImageFetcher for TimeoutFetcher {
    fn fetch(&self, url: &str) -> anyhow::Result<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("operation timed out fetching {url}"))
    }
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap()
}

fn widget_at(preset: SizePreset) -> (TempDir, Arc<TimeoutFetcher>, ClockWidget) {
    let dir = tempdir().unwrap();
    let paths = AppPaths::new(dir.path());
    let mut store = SettingsStore::load(paths.settings_file());
    store.update(|s| s.window_size = preset);
    let fetcher = Arc::new(TimeoutFetcher::default());
    let widget = ClockWidget::new(paths, store, fetcher.clone(), noon());
    (dir, fetcher, widget)
}

fn assert_placeholder_silhouette(widget: &ClockWidget) {
    let composite = widget.composite().unwrap();
    assert!(composite.placeholder);
    let (w, h) = widget.canvas_size();
    assert_eq!(composite.image.dimensions(), (w, h));
    let mask = synthesize_mask(w, h);
    for (px, m) in composite.image.pixels().zip(mask.pixels()) {
        assert_eq!([px[0], px[1], px[2]], PLACEHOLDER_RGB);
        assert_eq!(px[3], m[0]);
    }
}

#[test]
fn small_to_large_rebuilds_geometry() {
    let (_dir, _fetcher, mut widget) = widget_at(SizePreset::Small);
    assert_eq!(widget.canvas_size(), (360, 203));
    assert_eq!(widget.buttons().close.x, 325.0);

    let new = Settings {
        window_size: SizePreset::Large,
        ..widget.settings().clone()
    };
    let report = widget.reconfigure(new, noon());

    assert_eq!(report.canvas, (600, 338));
    assert_eq!(widget.canvas_size(), (600, 338));
    assert_eq!(widget.mask().dimensions(), (600, 338));
    assert_eq!(widget.buttons().settings.x, 10.0);
    assert_eq!(widget.buttons().rotate.x, 530.0);
    assert_eq!(widget.buttons().close.x, 565.0);
    assert_eq!(widget.buttons().hit(570.0, 20.0), Some(WidgetButton::Close));
    assert_eq!(widget.lifecycle(), Lifecycle::Running);
    assert!(widget.clock().is_some());

    let persisted = SettingsStore::load(widget.store().path());
    assert_eq!(persisted.settings().window_size, SizePreset::Large);
}

#[test]
fn failed_fetches_leave_a_placeholder_after_reconfigure() {
    let (_dir, fetcher, mut widget) = widget_at(SizePreset::Small);
    let new = Settings {
        window_size: SizePreset::Large,
        ..widget.settings().clone()
    };
    widget.reconfigure(new, noon());

    // installed before the worker reports back
    assert_placeholder_silhouette(&widget);

    assert!(widget.wait_for_background(Duration::from_secs(5)));
    assert_placeholder_silhouette(&widget);

    for _ in 0..REMOTE_URLS.len() - 1 {
        widget.refresh_background();
        assert!(widget.wait_for_background(Duration::from_secs(5)));
        assert_placeholder_silhouette(&widget);
    }
    assert!(fetcher.calls.load(Ordering::SeqCst) >= REMOTE_URLS.len());
}

#[test]
fn stale_outcomes_are_dropped() {
    let (_dir, _fetcher, mut widget) = widget_at(SizePreset::Small);
    let new = Settings {
        window_size: SizePreset::Medium,
        ..widget.settings().clone()
    };
    widget.reconfigure(new, noon());

    // the small-sized job from construction must never replace the
    // medium-sized placeholder
    assert!(widget.wait_for_background(Duration::from_secs(5)));
    std::thread::sleep(Duration::from_millis(100));
    widget.poll_background();
    assert_eq!(
        widget.composite().unwrap().image.dimensions(),
        SizePreset::Medium.dimensions()
    );
}

#[test]
fn rotate_advances_and_persists_url() {
    let (_dir, _fetcher, mut widget) = widget_at(SizePreset::Medium);
    assert_eq!(widget.settings().current_bg_url, REMOTE_URLS[0]);

    widget.refresh_background();
    assert_eq!(widget.settings().current_bg_url, REMOTE_URLS[1]);
    assert!(widget.wait_for_background(Duration::from_secs(5)));
    let composite = widget.composite().unwrap();
    assert_eq!(
        composite.source,
        Some(BackgroundSource::Remote(REMOTE_URLS[1].to_string()))
    );
}

#[test]
fn locked_dragging_ignores_drags() {
    let (_dir, _fetcher, mut widget) = widget_at(SizePreset::Medium);
    assert!(widget.begin_drag((200.0, 150.0)));
    widget.drag_to((300, 400));
    widget.end_drag();
    assert_eq!(widget.position(), (300, 400));
    assert_eq!(
        (widget.settings().window_x, widget.settings().window_y),
        (300, 400)
    );

    // pressing a button never starts a drag
    assert!(!widget.begin_drag((20.0, 20.0)));

    let new = Settings {
        lock_dragging: true,
        ..widget.settings().clone()
    };
    widget.reconfigure(new, noon());
    assert!(!widget.drag_enabled());
    assert!(!widget.begin_drag((200.0, 150.0)));
    widget.drag_to((10, 10));
    assert_eq!(widget.position(), (300, 400));
}

#[test]
fn position_is_not_persisted_when_not_remembered() {
    let (_dir, _fetcher, mut widget) = widget_at(SizePreset::Medium);
    let new = Settings {
        remember_position: false,
        ..widget.settings().clone()
    };
    widget.reconfigure(new, noon());

    assert!(widget.begin_drag((200.0, 150.0)));
    widget.drag_to((700, 80));
    widget.end_drag();
    assert_eq!(widget.position(), (700, 80));
    assert_eq!(
        (widget.settings().window_x, widget.settings().window_y),
        (50, 50)
    );
}

#[test]
fn drag_ends_when_release_is_missed() {
    let (_dir, _fetcher, mut widget) = widget_at(SizePreset::Medium);
    let held = PointerSample {
        primary_down: true,
        released: false,
        inside: true,
    };

    assert!(widget.begin_drag((200.0, 150.0)));
    widget.drag_to((300, 400));
    assert!(!widget.settle_drag(held));
    assert!(widget.is_dragging());

    // button still reported down, but a release event arrived
    assert!(widget.settle_drag(PointerSample {
        released: true,
        ..held
    }));
    assert!(!widget.is_dragging());

    // button still reported down, but the pointer left the window
    assert!(widget.begin_drag((200.0, 150.0)));
    assert!(widget.settle_drag(PointerSample {
        inside: false,
        ..held
    }));

    // later window manager moves are not persisted as drags
    widget.drag_to((900, 900));
    widget.observe_position((900, 900));
    assert_eq!(widget.position(), (900, 900));
    assert_eq!(
        (widget.settings().window_x, widget.settings().window_y),
        (300, 400)
    );
    assert!(!widget.settle_drag(held));
}
