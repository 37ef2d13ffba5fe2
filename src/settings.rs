use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Resolution every size preset is scaled from.
pub const BASE_SIZE: (u32, u32) = (480, 270);
/// Accepted clock font sizes in pixels.
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 1..=400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePreset {
    Small,
    #[default]
    Medium,
    Large,
}

impl SizePreset {
    pub const ALL: [SizePreset; 3] = [SizePreset::Small, SizePreset::Medium, SizePreset::Large];

    pub fn name(self) -> &'static str {
        match self {
            SizePreset::Small => "small",
            SizePreset::Medium => "medium",
            SizePreset::Large => "large",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    fn scale(self) -> f32 {
        match self {
            SizePreset::Small => 0.75,
            SizePreset::Medium => 1.0,
            SizePreset::Large => 1.25,
        }
    }

    /// Pixel size of the widget for this preset.
    pub fn dimensions(self) -> (u32, u32) {
        let scale = self.scale();
        (
            (BASE_SIZE.0 as f32 * scale).round() as u32,
            (BASE_SIZE.1 as f32 * scale).round() as u32,
        )
    }
}

impl std::fmt::Display for SizePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Unknown preset names fall back to the default instead of failing the
// whole settings record.
impl<'de> Deserialize<'de> for SizePreset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(SizePreset::from_name(&name).unwrap_or_else(|| {
            tracing::warn!(preset = %name, "unknown window size preset; using medium");
            SizePreset::default()
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub font_size: u32,
    /// Clock text color as `#RRGGBB`.
    pub font_color: String,
    /// Path of a user selected background image. Empty when unset.
    pub custom_bg_image: String,
    pub remember_position: bool,
    pub lock_dragging: bool,
    pub run_on_startup: bool,
    pub window_x: i32,
    pub window_y: i32,
    pub window_size: SizePreset,
    /// Remote background shown last, so a restart shows the same picture.
    pub current_bg_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_size: 46,
            font_color: "#FFFFFF".into(),
            custom_bg_image: String::new(),
            remember_position: true,
            lock_dragging: false,
            run_on_startup: false,
            window_x: 50,
            window_y: 50,
            window_size: SizePreset::Medium,
            current_bg_url: String::new(),
        }
    }
}

impl Settings {
    /// Font color as RGB, white when the stored string cannot be parsed.
    pub fn font_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.font_color).unwrap_or_else(|| {
            tracing::warn!(color = %self.font_color, "invalid font color; using white");
            [255, 255, 255]
        })
    }

    pub fn custom_background(&self) -> Option<PathBuf> {
        let trimmed = self.custom_bg_image.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Returns a copy with `key` replaced, or `None` when the key is unknown
    /// or the value does not fit it.
    fn with_value(&self, key: &str, value: Value) -> Option<Settings> {
        let mut map = self.to_map();
        if !map.contains_key(key) {
            return None;
        }
        map.insert(key.to_string(), value);
        serde_json::from_value(Value::Object(map)).ok()
    }

    /// Merge a persisted record over the defaults, key by key.
    pub fn merged_over_defaults(loaded: Map<String, Value>) -> Settings {
        let mut merged = Settings::default();
        for (key, value) in loaded {
            match merged.with_value(&key, value) {
                Some(next) => merged = next,
                None => tracing::debug!(key = %key, "ignoring unknown or ill-typed setting"),
            }
        }
        let clamped = merged
            .font_size
            .clamp(*FONT_SIZE_RANGE.start(), *FONT_SIZE_RANGE.end());
        if clamped != merged.font_size {
            tracing::warn!(font_size = merged.font_size, clamped, "font size out of range");
            merged.font_size = clamped;
        }
        merged
    }
}

pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some([r, g, b])
        }
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        _ => None,
    }
}

pub fn format_hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// Settings record backed by a JSON file. Every mutation is written through
/// to disk immediately.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Load the record at `path`. A missing or malformed file yields the
    /// defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = read_settings(&path);
        Self { path, settings }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Current value of `key`, or `None` when the key is not a setting.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.settings.to_map().remove(key)
    }

    /// Update a single key and persist the record. Returns `false` when the
    /// key is unknown or the value has the wrong type.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> bool {
        match self.settings.with_value(key, value.into()) {
            Some(next) => {
                self.settings = next;
                self.save();
                true
            }
            None => {
                tracing::warn!(key = %key, "rejected setting update");
                false
            }
        }
    }

    /// Apply a typed mutation and persist once.
    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) -> bool {
        f(&mut self.settings);
        self.save()
    }

    pub fn replace(&mut self, settings: Settings) -> bool {
        self.settings = settings;
        self.save()
    }

    /// Write the record to disk. Failures are logged and reported as `false`.
    pub fn save(&self) -> bool {
        match write_settings(&self.path, &self.settings) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %self.path.display(), "failed to save settings: {e:#}");
                false
            }
        }
    }
}

fn read_settings(path: &Path) -> Settings {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            if path.exists() {
                tracing::warn!(path = %path.display(), "failed to read settings: {e}");
            }
            return Settings::default();
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Settings::merged_over_defaults(map),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "settings file is not an object; using defaults");
            Settings::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), "malformed settings file: {e}");
            Settings::default()
        }
    }
}

fn write_settings(path: &Path, settings: &Settings) -> anyhow::Result<()> {
    use anyhow::Context;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create settings folder {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(settings).context("serialize settings")?;
    std::fs::write(path, json).with_context(|| format!("write settings file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{format_hex_color, parse_hex_color, Settings, SettingsStore, SizePreset};
    use serde_json::json;

    #[test]
    fn presets_scale_from_base_resolution() {
        assert_eq!(SizePreset::Small.dimensions(), (360, 203));
        assert_eq!(SizePreset::Medium.dimensions(), (480, 270));
        assert_eq!(SizePreset::Large.dimensions(), (600, 338));
    }

    #[test]
    fn preset_names_round_trip() {
        for preset in SizePreset::ALL {
            assert_eq!(SizePreset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(SizePreset::from_name("huge"), None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SettingsStore::load(dir.path().join("settings.json"));
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn ill_typed_value_keeps_default_for_that_key_only() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            json!({"font_size": "big", "font_color": "#00FF00", "extra": 1}).to_string(),
        )
        .expect("write");

        let store = SettingsStore::load(&path);
        assert_eq!(store.settings().font_size, 46);
        assert_eq!(store.settings().font_color, "#00FF00");
        assert_eq!(store.get("extra"), None);
    }

    #[test]
    fn set_rejects_unknown_keys_and_wrong_types() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = SettingsStore::load(dir.path().join("settings.json"));
        assert!(!store.set("no_such_key", 1));
        assert!(!store.set("lock_dragging", "yes"));
        assert!(store.set("lock_dragging", true));
        assert_eq!(store.get("lock_dragging"), Some(json!(true)));
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#FF8000"), Some([255, 128, 0]));
        assert_eq!(parse_hex_color("ff8000"), Some([255, 128, 0]));
        assert_eq!(parse_hex_color("#fff"), Some([255, 255, 255]));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(format_hex_color([1, 2, 255]), "#0102FF");
    }

    #[test]
    fn invalid_color_falls_back_to_white() {
        let settings = Settings {
            font_color: "not a color".into(),
            ..Settings::default()
        };
        assert_eq!(settings.font_rgb(), [255, 255, 255]);
    }
}
