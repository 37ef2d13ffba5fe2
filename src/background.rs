use crate::compositor::{composite, placeholder};
use crate::mask::MaskProvider;
use crate::settings::{Settings, SettingsStore, SizePreset};
use anyhow::{Context, Result};
use image::{DynamicImage, RgbaImage};
use reqwest::blocking::Client;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Remote backgrounds cycled through when no custom image is configured.
pub const REMOTE_URLS: [&str; 3] = [
    "https://picsum.photos/800/600",
    "https://loremflickr.com/800/600/nature",
    "https://picsum.photos/seed/pic1/800/600",
];

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<DynamicImage>;
}

/// Blocking HTTP fetcher. Any non-success status or undecodable body is an
/// error; nothing is retried.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("sec-clock background fetcher")
            .build()?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<DynamicImage> {
        let resp = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request {url}"))?
            .error_for_status()
            .with_context(|| format!("status from {url}"))?;
        let bytes = resp.bytes().with_context(|| format!("read body from {url}"))?;
        image::load_from_memory(&bytes).with_context(|| format!("decode image from {url}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource {
    Local(PathBuf),
    Remote(String),
}

impl std::fmt::Display for BackgroundSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundSource::Local(path) => write!(f, "{}", path.display()),
            BackgroundSource::Remote(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundMode {
    /// User selected files. Only one is tracked today but the index is kept
    /// so more can be added later.
    Local { paths: Vec<PathBuf>, index: usize },
    Remote { urls: Vec<String>, cursor: usize },
}

/// Decides which background is active and hands out the work to load it.
#[derive(Debug, Clone)]
pub struct BackgroundController {
    mode: BackgroundMode,
}

impl BackgroundController {
    pub fn new(settings: &Settings) -> Self {
        Self::with_remote_urls(settings, REMOTE_URLS.iter().map(|u| u.to_string()).collect())
    }

    pub fn with_remote_urls(settings: &Settings, urls: Vec<String>) -> Self {
        let mode = match settings.custom_background() {
            Some(path) if path.exists() => {
                tracing::info!(path = %path.display(), "using custom background");
                BackgroundMode::Local {
                    paths: vec![path],
                    index: 0,
                }
            }
            other => {
                if let Some(path) = other {
                    tracing::warn!(path = %path.display(), "custom background missing; using online backgrounds");
                } else {
                    tracing::info!("using online backgrounds");
                }
                BackgroundMode::Remote { urls, cursor: 0 }
            }
        };
        Self { mode }
    }

    pub fn mode(&self) -> &BackgroundMode {
        &self.mode
    }

    pub fn is_local(&self) -> bool {
        matches!(self.mode, BackgroundMode::Local { .. })
    }

    pub fn current_source(&self) -> Option<BackgroundSource> {
        match &self.mode {
            BackgroundMode::Local { paths, index } => {
                paths.get(*index).cloned().map(BackgroundSource::Local)
            }
            BackgroundMode::Remote { urls, cursor } => {
                urls.get(*cursor).cloned().map(BackgroundSource::Remote)
            }
        }
    }

    /// Job for the first load after (re)initialization. A remote URL shown
    /// before is restored and fetched again; otherwise the cursor's URL is
    /// persisted as the current one.
    pub fn initial_job(
        &mut self,
        store: &mut SettingsStore,
        preset: SizePreset,
        generation: u64,
    ) -> Option<BackgroundJob> {
        if let BackgroundMode::Remote { urls, cursor } = &mut self.mode {
            let remembered = &store.settings().current_bg_url;
            match urls.iter().position(|u| u == remembered) {
                Some(idx) => {
                    *cursor = idx;
                    tracing::debug!(url = %remembered, "restoring previous online background");
                }
                None => {
                    if let Some(url) = urls.get(*cursor) {
                        store.set("current_bg_url", url.clone());
                    }
                }
            }
        }
        self.job(preset, generation)
    }

    /// Advance to the next background and return the job that loads it.
    pub fn refresh_job(
        &mut self,
        store: &mut SettingsStore,
        preset: SizePreset,
        generation: u64,
    ) -> Option<BackgroundJob> {
        match &mut self.mode {
            BackgroundMode::Local { paths, index } => {
                if !paths.is_empty() {
                    *index = (*index + 1) % paths.len();
                }
            }
            BackgroundMode::Remote { urls, cursor } => {
                if !urls.is_empty() {
                    *cursor = (*cursor + 1) % urls.len();
                    store.set("current_bg_url", urls[*cursor].clone());
                }
            }
        }
        self.job(preset, generation)
    }

    fn job(&self, preset: SizePreset, generation: u64) -> Option<BackgroundJob> {
        self.current_source().map(|source| BackgroundJob {
            source,
            preset,
            generation,
        })
    }
}

/// Self-contained load-and-composite work, safe to run off the UI thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJob {
    pub source: BackgroundSource,
    pub preset: SizePreset,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct BackgroundOutcome {
    pub generation: u64,
    pub source: BackgroundSource,
    pub image: RgbaImage,
    /// `true` when loading failed and the solid placeholder was used.
    pub placeholder: bool,
}

impl BackgroundJob {
    pub fn run(&self, fetcher: &dyn ImageFetcher, masks: &MaskProvider) -> BackgroundOutcome {
        let size = self.preset.dimensions();
        let mask = masks.mask_for(self.preset);
        let (image, placeholder_used) = match self.load(fetcher) {
            Ok(source) => {
                tracing::info!(source = %self.source, "background loaded");
                (composite(&source, size, &mask), false)
            }
            Err(e) => {
                tracing::warn!(source = %self.source, "background failed: {e:#}; using placeholder");
                (placeholder(size, &mask), true)
            }
        };
        BackgroundOutcome {
            generation: self.generation,
            source: self.source.clone(),
            image,
            placeholder: placeholder_used,
        }
    }

    fn load(&self, fetcher: &dyn ImageFetcher) -> Result<DynamicImage> {
        match &self.source {
            BackgroundSource::Local(path) => {
                image::open(path).with_context(|| format!("open {}", path.display()))
            }
            BackgroundSource::Remote(url) => fetcher.fetch(url),
        }
    }
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// Runs background jobs on worker threads and hands the results back over a
/// channel drained by the UI thread.
pub struct BackgroundLoader {
    fetcher: Arc<dyn ImageFetcher>,
    masks: MaskProvider,
    tx: Sender<BackgroundOutcome>,
    rx: Receiver<BackgroundOutcome>,
    waker: Option<Waker>,
}

impl BackgroundLoader {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, masks: MaskProvider) -> Self {
        let (tx, rx) = channel();
        Self {
            fetcher,
            masks,
            tx,
            rx,
            waker: None,
        }
    }

    /// Called from the worker after an outcome is queued, e.g. to request a
    /// repaint.
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker = Some(Arc::new(waker));
    }

    pub fn submit(&self, job: BackgroundJob) {
        let fetcher = Arc::clone(&self.fetcher);
        let masks = self.masks.clone();
        let tx = self.tx.clone();
        let waker = self.waker.clone();
        let spawned = std::thread::Builder::new()
            .name("background-loader".into())
            .spawn(move || {
                let outcome = job.run(fetcher.as_ref(), &masks);
                if tx.send(outcome).is_ok() {
                    if let Some(wake) = waker {
                        wake();
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::error!("failed to spawn background loader: {e}");
        }
    }

    pub fn try_recv(&self) -> Option<BackgroundOutcome> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<BackgroundOutcome> {
        self.rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::{BackgroundController, BackgroundMode, BackgroundSource, REMOTE_URLS};
    use crate::settings::{Settings, SettingsStore, SizePreset};

    fn store() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::load(dir.path().join("settings.json"));
        (dir, store)
    }

    #[test]
    fn remote_mode_restores_remembered_url() {
        let (_dir, mut store) = store();
        store.set("current_bg_url", REMOTE_URLS[1]);
        let mut controller = BackgroundController::new(store.settings());

        let job = controller
            .initial_job(&mut store, SizePreset::Medium, 1)
            .expect("job");
        assert_eq!(job.source, BackgroundSource::Remote(REMOTE_URLS[1].into()));
        assert!(matches!(
            controller.mode(),
            BackgroundMode::Remote { cursor: 1, .. }
        ));
    }

    #[test]
    fn unknown_remembered_url_starts_at_first_and_persists_it() {
        let (_dir, mut store) = store();
        store.set("current_bg_url", "https://example.com/old.png");
        let mut controller = BackgroundController::new(store.settings());

        controller.initial_job(&mut store, SizePreset::Medium, 1);
        assert_eq!(store.settings().current_bg_url, REMOTE_URLS[0]);
        let reloaded = SettingsStore::load(store.path());
        assert_eq!(reloaded.settings().current_bg_url, REMOTE_URLS[0]);
    }

    #[test]
    fn refresh_wraps_around_and_persists() {
        let (_dir, mut store) = store();
        store.set("current_bg_url", REMOTE_URLS[2]);
        let mut controller = BackgroundController::new(store.settings());
        controller.initial_job(&mut store, SizePreset::Small, 1);

        let job = controller
            .refresh_job(&mut store, SizePreset::Small, 2)
            .expect("job");
        assert_eq!(job.source, BackgroundSource::Remote(REMOTE_URLS[0].into()));
        assert_eq!(job.generation, 2);
        assert_eq!(store.settings().current_bg_url, REMOTE_URLS[0]);
    }

    #[test]
    fn existing_custom_image_selects_local_mode() {
        let (dir, mut store) = store();
        let path = dir.path().join("bg.png");
        image::RgbImage::new(4, 4).save(&path).expect("save");
        let settings = Settings {
            custom_bg_image: path.to_string_lossy().into_owned(),
            ..Settings::default()
        };
        let mut controller = BackgroundController::new(&settings);
        assert!(controller.is_local());

        let first = controller
            .initial_job(&mut store, SizePreset::Medium, 1)
            .expect("job");
        let again = controller
            .refresh_job(&mut store, SizePreset::Medium, 2)
            .expect("job");
        assert_eq!(first.source, BackgroundSource::Local(path.clone()));
        assert_eq!(again.source, BackgroundSource::Local(path));
        assert_eq!(store.settings().current_bg_url, "");
    }

    #[test]
    fn missing_custom_image_falls_back_to_remote() {
        let settings = Settings {
            custom_bg_image: "/definitely/not/here.png".into(),
            ..Settings::default()
        };
        assert!(!BackgroundController::new(&settings).is_local());
    }
}
