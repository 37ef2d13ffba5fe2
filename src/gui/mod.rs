pub mod settings_dialog;

pub use settings_dialog::{FormError, SettingsDialog, SettingsForm};

use crate::clock::ClockView;
use crate::compositor::to_color_image;
use crate::glyph::GlyphBitmap;
use crate::tray::TrayCommand;
use crate::visibility::{apply_visibility, is_parked};
use crate::widget::{ClockWidget, PointerSample, WidgetButton};
use eframe::egui;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

/// Clock refresh cadence.
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);

const BUTTON_FILL: egui::Color32 = egui::Color32::from_rgb(0x33, 0x33, 0x33);
const CLOSE_FILL: egui::Color32 = egui::Color32::from_rgb(0xff, 0x44, 0x44);

struct BackgroundTexture {
    revision: u64,
    handle: egui::TextureHandle,
}

struct SegmentTexture {
    bitmap: Arc<GlyphBitmap>,
    handle: egui::TextureHandle,
}

/// eframe front end of [`ClockWidget`].
pub struct ClockApp {
    widget: ClockWidget,
    settings_dialog: SettingsDialog,
    tray_commands: Option<Receiver<TrayCommand>>,
    tray_available: bool,
    background: Option<BackgroundTexture>,
    segments: HashMap<&'static str, SegmentTexture>,
    visible: bool,
    quitting: bool,
}

impl ClockApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        mut widget: ClockWidget,
        tray_commands: Option<Receiver<TrayCommand>>,
        tray_available: bool,
    ) -> Self {
        let ctx = cc.egui_ctx.clone();
        widget.set_waker(move || ctx.request_repaint());
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self {
            widget,
            settings_dialog: SettingsDialog::default(),
            tray_commands,
            tray_available,
            background: None,
            segments: HashMap::new(),
            visible: true,
            quitting: false,
        }
    }

    fn handle_tray(&mut self, ctx: &egui::Context) {
        let Some(rx) = self.tray_commands.as_ref() else {
            return;
        };
        let commands: Vec<TrayCommand> = rx.try_iter().collect();
        for command in commands {
            match command {
                TrayCommand::Show => self.show(ctx),
                TrayCommand::Settings => {
                    self.show(ctx);
                    self.settings_dialog.open(self.widget.settings());
                }
                TrayCommand::Exit => self.quit(ctx),
            }
        }
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if self.quitting || !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        if self.tray_available {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.hide(ctx);
        } else {
            self.quitting = true;
        }
    }

    fn show(&mut self, ctx: &egui::Context) {
        self.visible = true;
        apply_visibility(true, ctx, self.widget.position());
    }

    // Without a tray there is no way back to a hidden window, so closing quits.
    fn hide(&mut self, ctx: &egui::Context) {
        if !self.tray_available {
            self.quit(ctx);
            return;
        }
        self.widget.end_drag();
        self.visible = false;
        apply_visibility(false, ctx, self.widget.position());
    }

    fn quit(&mut self, ctx: &egui::Context) {
        tracing::info!("exiting");
        self.quitting = true;
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn track_position(&mut self, ctx: &egui::Context) {
        // parked offscreen while hidden
        if !self.visible {
            return;
        }
        let (outer, pointer) = ctx.input(|i| {
            (
                i.viewport().outer_rect,
                PointerSample {
                    primary_down: i.pointer.primary_down(),
                    released: i.pointer.any_released(),
                    inside: i.pointer.has_pointer(),
                },
            )
        });
        if let Some(pos) = outer
            .map(|rect| (rect.min.x.round() as i32, rect.min.y.round() as i32))
            .filter(|pos| !is_parked(*pos))
        {
            if self.widget.is_dragging() {
                self.widget.drag_to(pos);
            } else {
                self.widget.observe_position(pos);
            }
        }
        self.widget.settle_drag(pointer);
    }

    fn sync_background(&mut self, ctx: &egui::Context) {
        let Some(composite) = self.widget.composite() else {
            self.background = None;
            return;
        };
        if self
            .background
            .as_ref()
            .is_some_and(|t| t.revision == composite.revision)
        {
            return;
        }
        let image = to_color_image(&composite.image);
        match self.background.as_mut() {
            Some(texture) => {
                texture.handle.set(image, egui::TextureOptions::LINEAR);
                texture.revision = composite.revision;
            }
            None => {
                self.background = Some(BackgroundTexture {
                    revision: composite.revision,
                    handle: ctx.load_texture(
                        "secclock_background",
                        image,
                        egui::TextureOptions::LINEAR,
                    ),
                });
            }
        }
    }

    fn sync_segments(&mut self, ctx: &egui::Context) {
        let Some(ClockView::Segmented(clock)) = self.widget.clock() else {
            self.segments.clear();
            return;
        };
        for (name, segment) in clock.segments() {
            let stale = self
                .segments
                .get(name)
                .map_or(true, |t| !Arc::ptr_eq(&t.bitmap, segment.bitmap()));
            if !stale {
                continue;
            }
            let handle = ctx.load_texture(
                format!("secclock_{name}"),
                to_color_image(&segment.bitmap().image),
                egui::TextureOptions::LINEAR,
            );
            self.segments.insert(
                name,
                SegmentTexture {
                    bitmap: Arc::clone(segment.bitmap()),
                    handle,
                },
            );
        }
    }

    fn paint(&mut self, ui: &mut egui::Ui) -> Option<WidgetButton> {
        let origin = ui.max_rect().min;
        let (width, height) = self.widget.canvas_size();
        let canvas = egui::Rect::from_min_size(origin, egui::vec2(width as f32, height as f32));
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

        let drag = ui.interact(canvas, egui::Id::new("secclock_canvas"), egui::Sense::drag());
        if drag.drag_started() {
            if let Some(pointer) = drag.interact_pointer_pos() {
                let local = pointer - origin;
                if self.widget.begin_drag((local.x, local.y)) {
                    ui.ctx().send_viewport_cmd(egui::ViewportCommand::StartDrag);
                }
            }
        }

        let painter = ui.painter();
        if let Some(texture) = self.background.as_ref() {
            painter.image(texture.handle.id(), canvas, uv, egui::Color32::WHITE);
        }

        match self.widget.clock() {
            Some(ClockView::Segmented(clock)) => {
                for (name, segment) in clock.segments() {
                    let Some(texture) = self.segments.get(name) else {
                        continue;
                    };
                    let bitmap = segment.bitmap();
                    let center = origin + egui::vec2(segment.center().0, segment.center().1);
                    let rect = egui::Rect::from_center_size(
                        center,
                        egui::vec2(bitmap.width() as f32, bitmap.height() as f32),
                    );
                    painter.image(texture.handle.id(), rect, uv, egui::Color32::WHITE);
                }
            }
            Some(ClockView::Fallback(clock)) => {
                let [r, g, b] = clock.color;
                painter.text(
                    origin + egui::vec2(clock.center.0, clock.center.1),
                    egui::Align2::CENTER_CENTER,
                    &clock.text,
                    egui::FontId::proportional(clock.font_size as f32),
                    egui::Color32::from_rgb(r, g, b),
                );
            }
            None => {}
        }

        let mut clicked = None;
        for (button, rect) in self.widget.buttons().buttons() {
            let rect = egui::Rect::from_min_size(
                origin + egui::vec2(rect.x, rect.y),
                egui::vec2(rect.width, rect.height),
            );
            let response = ui.interact(
                rect,
                egui::Id::new(("secclock_button", button_label(button))),
                egui::Sense::click(),
            );
            let fill = match button {
                WidgetButton::Close => CLOSE_FILL,
                _ => BUTTON_FILL,
            };
            let painter = ui.painter();
            painter.rect_filled(rect, 4.0, fill);
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                button_label(button),
                egui::FontId::proportional(14.0),
                egui::Color32::WHITE,
            );
            if response.clicked() {
                clicked = Some(button);
            }
        }
        clicked
    }

    fn on_button(&mut self, ctx: &egui::Context, button: WidgetButton) {
        match button {
            WidgetButton::Settings => self.settings_dialog.open(self.widget.settings()),
            WidgetButton::Rotate => self.widget.refresh_background(),
            WidgetButton::Close => self.hide(ctx),
        }
    }
}

fn button_label(button: WidgetButton) -> &'static str {
    match button {
        WidgetButton::Settings => "⚙",
        WidgetButton::Rotate => "🔄",
        WidgetButton::Close => "✖",
    }
}

impl eframe::App for ClockApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_tray(ctx);
        self.handle_close_request(ctx);

        self.widget.tick(chrono::Local::now().time());
        self.widget.poll_background();
        self.track_position(ctx);
        self.sync_background(ctx);
        self.sync_segments(ctx);

        let clicked = egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.paint(ui))
            .inner;
        if let Some(button) = clicked {
            self.on_button(ctx, button);
        }

        if let Some(report) = self.settings_dialog.ui(ctx, &mut self.widget) {
            let (width, height) = report.canvas;
            ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(
                width as f32,
                height as f32,
            )));
        }

        // keeps running while hidden so tray commands are drained
        ctx.request_repaint_after(TICK_INTERVAL);
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 0.0]
    }
}
