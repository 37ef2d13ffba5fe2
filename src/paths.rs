use crate::settings::SizePreset;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const LOG_FILE_NAME: &str = "secclock.log";
const FONT_FILE: &str = "Blooming.otf";
const ICON_FILE: &str = "SecClock.ico";

/// Fixed locations of every file the widget reads or writes. All of them
/// live next to the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn from_exe_path(exe_path: &Path) -> Result<Self> {
        let parent = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path has no parent: {}", exe_path.display()))?;
        Ok(Self::new(parent))
    }

    pub fn resolve() -> Result<Self> {
        let exe_path = std::env::current_exe().context("resolve current executable")?;
        Self::from_exe_path(&exe_path)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.base_dir.join("assets")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.base_dir.join("fonts")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join(SETTINGS_FILE_NAME)
    }

    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join(LOG_FILE_NAME)
    }

    pub fn font_file(&self) -> PathBuf {
        self.fonts_dir().join(FONT_FILE)
    }

    pub fn icon_file(&self) -> PathBuf {
        self.assets_dir().join(ICON_FILE)
    }

    pub fn mask_file(&self, preset: SizePreset) -> PathBuf {
        self.assets_dir()
            .join(format!("mask_{}.png", preset.name()))
    }

    /// Create the asset folders if they are missing. Failures are logged only.
    pub fn ensure_dirs(&self) {
        for dir in [self.assets_dir(), self.fonts_dir()] {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                tracing::warn!(dir = %dir.display(), "failed to create directory: {e}");
            }
        }
    }
}
