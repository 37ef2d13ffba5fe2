use crate::autostart;
use crate::settings::{format_hex_color, parse_hex_color, Settings, SizePreset, FONT_SIZE_RANGE};
use crate::widget::{ClockWidget, ReconfigureReport};
use eframe::egui;

pub const DIALOG_SIZE: [f32; 2] = [500.0, 650.0];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Font size must be a whole number, got {0:?}")]
    InvalidFontSize(String),
    #[error("Font size must be between {min} and {max}, got {value}")]
    FontSizeOutOfRange { value: u32, min: u32, max: u32 },
    #[error("Invalid window size selected: {0:?}")]
    InvalidPreset(String),
}

/// Editable text form of [`Settings`]. Values are only checked when the form
/// is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub window_size: String,
    pub font_size: String,
    pub font_color: String,
    pub custom_bg_image: String,
    pub remember_position: bool,
    pub lock_dragging: bool,
    pub run_on_startup: bool,
}

impl SettingsForm {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            window_size: settings.window_size.name().to_string(),
            font_size: settings.font_size.to_string(),
            font_color: settings.font_color.clone(),
            custom_bg_image: settings.custom_bg_image.clone(),
            remember_position: settings.remember_position,
            lock_dragging: settings.lock_dragging,
            run_on_startup: settings.run_on_startup,
        }
    }

    /// Fields not shown in the form (position, current background) are kept
    /// from `base`.
    pub fn to_settings(&self, base: &Settings) -> Result<Settings, FormError> {
        let window_size = SizePreset::from_name(self.window_size.trim())
            .ok_or_else(|| FormError::InvalidPreset(self.window_size.clone()))?;
        let font_size = self
            .font_size
            .trim()
            .parse::<u32>()
            .map_err(|_| FormError::InvalidFontSize(self.font_size.clone()))?;
        if !FONT_SIZE_RANGE.contains(&font_size) {
            return Err(FormError::FontSizeOutOfRange {
                value: font_size,
                min: *FONT_SIZE_RANGE.start(),
                max: *FONT_SIZE_RANGE.end(),
            });
        }
        Ok(Settings {
            window_size,
            font_size,
            font_color: self.font_color.trim().to_string(),
            custom_bg_image: self.custom_bg_image.trim().to_string(),
            remember_position: self.remember_position,
            lock_dragging: self.lock_dragging,
            run_on_startup: self.run_on_startup,
            ..base.clone()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Modal {
    Error(String),
    Info(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Apply,
    Ok,
    Cancel,
    OpenFile,
}

/// Settings window shown in its own native viewport.
#[derive(Default)]
pub struct SettingsDialog {
    pub open: bool,
    form: Option<SettingsForm>,
    modal: Option<Modal>,
    close_after_modal: bool,
}

impl SettingsDialog {
    pub fn open(&mut self, settings: &Settings) {
        self.open = true;
        self.form = Some(SettingsForm::from_settings(settings));
        self.modal = None;
        self.close_after_modal = false;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.form = None;
        self.modal = None;
        self.close_after_modal = false;
    }

    /// Validate the form and reconfigure `widget`. On a validation error
    /// nothing is applied and the error modal is shown.
    pub fn apply(&mut self, widget: &mut ClockWidget) -> Option<ReconfigureReport> {
        let form = self.form.as_ref()?;
        let new = match form.to_settings(widget.settings()) {
            Ok(new) => new,
            Err(e) => {
                tracing::warn!("settings rejected: {e}");
                self.modal = Some(Modal::Error(e.to_string()));
                return None;
            }
        };
        let run_on_startup = new.run_on_startup;
        let report = widget.reconfigure(new, chrono::Local::now().time());
        if let Err(e) = autostart::set_run_on_startup(run_on_startup) {
            tracing::error!("failed to update startup registration: {e:#}");
        }
        self.modal = Some(Modal::Info("Settings applied successfully!".into()));
        Some(report)
    }

    pub fn ui(&mut self, ctx: &egui::Context, widget: &mut ClockWidget) -> Option<ReconfigureReport> {
        if !self.open {
            return None;
        }
        if self.form.is_none() {
            self.form = Some(SettingsForm::from_settings(widget.settings()));
        }

        let (action, close_requested) = ctx.show_viewport_immediate(
            egui::ViewportId::from_hash_of("secclock_settings"),
            egui::ViewportBuilder::default()
                .with_title("SecClock Settings")
                .with_inner_size(DIALOG_SIZE)
                .with_resizable(false),
            |ctx, _class| {
                let action = egui::CentralPanel::default()
                    .show(ctx, |ui| self.contents(ui))
                    .inner;
                self.modal_ui(ctx);
                (action, ctx.input(|i| i.viewport().close_requested()))
            },
        );

        if close_requested {
            self.close();
            return None;
        }

        match action {
            Some(Action::Apply) => self.apply(widget),
            Some(Action::Ok) => {
                let report = self.apply(widget);
                if report.is_some() {
                    self.close_after_modal = true;
                }
                report
            }
            Some(Action::Cancel) => {
                self.close();
                None
            }
            Some(Action::OpenFile) => {
                let path = widget.store().path();
                if let Err(e) = open::that(path) {
                    tracing::warn!(path = %path.display(), "failed to open settings file: {e}");
                    self.modal = Some(Modal::Error(format!("Failed to open settings file: {e}")));
                }
                None
            }
            None => None,
        }
    }

    fn contents(&mut self, ui: &mut egui::Ui) -> Option<Action> {
        let blocked = self.modal.is_some();
        let form = self.form.as_mut()?;
        let mut action = None;
        ui.add_enabled_ui(!blocked, |ui| {
            ui.heading("Settings");
            ui.add_space(8.0);

            ui.label("Window size");
            egui::ComboBox::from_id_source("secclock_window_size")
                .selected_text(preset_label(&form.window_size))
                .show_ui(ui, |ui| {
                    for preset in SizePreset::ALL {
                        ui.selectable_value(
                            &mut form.window_size,
                            preset.name().to_string(),
                            preset_label(preset.name()),
                        );
                    }
                });
            ui.add_space(6.0);

            ui.label("Font size (20-100)")
                .on_hover_text(format!(
                    "Accepted range {}-{}",
                    FONT_SIZE_RANGE.start(),
                    FONT_SIZE_RANGE.end()
                ));
            ui.text_edit_singleline(&mut form.font_size);
            ui.add_space(6.0);

            ui.label("Font color");
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut form.font_color);
                let mut rgb = parse_hex_color(&form.font_color).unwrap_or([255, 255, 255]);
                if ui.color_edit_button_srgb(&mut rgb).changed() {
                    form.font_color = format_hex_color(rgb);
                }
            });
            ui.add_space(6.0);

            ui.label("Custom background image");
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut form.custom_bg_image);
                browse_button(ui, &mut form.custom_bg_image);
                if ui.button("Clear").clicked() {
                    form.custom_bg_image.clear();
                }
            });
            ui.add_space(6.0);

            ui.checkbox(&mut form.remember_position, "Remember window position");
            ui.checkbox(&mut form.lock_dragging, "Lock dragging");
            ui.checkbox(&mut form.run_on_startup, "Run on startup");

            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Apply").clicked() {
                    action = Some(Action::Apply);
                }
                if ui.button("OK").clicked() {
                    action = Some(Action::Ok);
                }
                if ui.button("Cancel").clicked() {
                    action = Some(Action::Cancel);
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Open settings file").clicked() {
                        action = Some(Action::OpenFile);
                    }
                });
            });

            ui.add_space(16.0);
            ui.vertical_centered(|ui| {
                ui.label(
                    egui::RichText::new("Made with love By VeeJay")
                        .italics()
                        .color(egui::Color32::from_gray(0xaa)),
                );
            });
        });
        action
    }

    fn modal_ui(&mut self, ctx: &egui::Context) {
        let Some(modal) = self.modal.clone() else {
            return;
        };
        let (title, text, color) = match &modal {
            Modal::Error(text) => ("Error", text, egui::Color32::from_rgb(0xff, 0x44, 0x44)),
            Modal::Info(text) => ("Success", text, egui::Color32::WHITE),
        };
        let mut dismissed = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.colored_label(color, text.as_str());
                ui.add_space(8.0);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.modal = None;
            if self.close_after_modal {
                self.close();
            }
        }
    }
}

#[cfg(target_os = "windows")]
fn browse_button(ui: &mut egui::Ui, path: &mut String) -> egui::Response {
    let response = ui.button("Browse");
    if response.clicked() {
        if let Some(picked) = rfd::FileDialog::new()
            .set_title("Select Background Image")
            .add_filter("Image files", &["jpg", "jpeg", "png", "bmp", "gif"])
            .pick_file()
        {
            *path = picked.display().to_string();
        }
    }
    response
}

#[cfg(not(target_os = "windows"))]
fn browse_button(ui: &mut egui::Ui, _path: &mut String) -> egui::Response {
    ui.add_enabled(false, egui::Button::new("Browse"))
        .on_disabled_hover_text("File picker is only available on Windows; type the path instead")
}

fn preset_label(name: &str) -> String {
    match SizePreset::from_name(name) {
        Some(preset) => {
            let (w, h) = preset.dimensions();
            format!("{name} ({w}x{h})")
        }
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{FormError, SettingsForm};
    use crate::settings::{Settings, SizePreset};

    #[test]
    fn valid_form_keeps_hidden_fields() {
        let base = Settings {
            window_x: 300,
            window_y: 40,
            current_bg_url: "https://picsum.photos/800/600".into(),
            ..Settings::default()
        };
        let mut form = SettingsForm::from_settings(&base);
        form.window_size = "large".into();
        form.font_size = " 60 ".into();
        form.lock_dragging = true;

        let settings = form.to_settings(&base).expect("valid form");
        assert_eq!(settings.window_size, SizePreset::Large);
        assert_eq!(settings.font_size, 60);
        assert!(settings.lock_dragging);
        assert_eq!((settings.window_x, settings.window_y), (300, 40));
        assert_eq!(settings.current_bg_url, base.current_bg_url);
    }

    #[test]
    fn non_numeric_font_size_is_rejected() {
        let base = Settings::default();
        let mut form = SettingsForm::from_settings(&base);
        form.font_size = "big".into();
        assert_eq!(
            form.to_settings(&base),
            Err(FormError::InvalidFontSize("big".into()))
        );
        form.font_size = "-4".into();
        assert!(form.to_settings(&base).is_err());
    }

    #[test]
    fn font_size_outside_range_is_rejected() {
        let base = Settings::default();
        let mut form = SettingsForm::from_settings(&base);
        for size in [0u32, 401, 4_000_000_000] {
            form.font_size = size.to_string();
            assert_eq!(
                form.to_settings(&base),
                Err(FormError::FontSizeOutOfRange {
                    value: size,
                    min: 1,
                    max: 400
                }),
                "size {size}"
            );
        }
        form.font_size = "400".into();
        assert_eq!(form.to_settings(&base).map(|s| s.font_size), Ok(400));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn browse_is_shown_disabled_without_file_picker() {
        let ctx = eframe::egui::Context::default();
        let mut path = String::from("/tmp/bg.png");
        let mut shown = None;
        let _ = ctx.run(Default::default(), |ctx| {
            eframe::egui::CentralPanel::default().show(ctx, |ui| {
                shown = Some(super::browse_button(ui, &mut path));
            });
        });
        let response = shown.expect("browse button laid out");
        assert!(!response.enabled);
        assert!(response.rect.width() > 0.0);
        assert_eq!(path, "/tmp/bg.png");
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let base = Settings::default();
        let mut form = SettingsForm::from_settings(&base);
        form.window_size = "huge".into();
        assert_eq!(
            form.to_settings(&base),
            Err(FormError::InvalidPreset("huge".into()))
        );
    }
}
