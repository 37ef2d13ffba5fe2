use eframe::egui;

/// Where a hidden window is parked. Far outside any monitor layout.
pub const OFFSCREEN_POS: (f32, f32) = (-32_000.0, -32_000.0);

/// The part of [`egui::Context`] used to move the window around.
pub trait ViewportCtx {
    fn send_viewport_cmd(&self, cmd: egui::ViewportCommand);
    fn request_repaint(&self);
}

impl ViewportCtx for egui::Context {
    fn send_viewport_cmd(&self, cmd: egui::ViewportCommand) {
        egui::Context::send_viewport_cmd(self, cmd);
    }

    fn request_repaint(&self) {
        egui::Context::request_repaint(self);
    }
}

/// Whether `pos` is the parked position, e.g. a frame that still reports
/// the old position right after a show.
pub fn is_parked(pos: (i32, i32)) -> bool {
    pos.0 <= OFFSCREEN_POS.0 as i32 / 2 && pos.1 <= OFFSCREEN_POS.1 as i32 / 2
}

/// Show the window at `restore`, or hide it by parking it offscreen.
///
/// The viewport always stays `Visible(true)`: an invisible viewport stops
/// receiving frames on Windows, and tray commands are drained from `update`.
pub fn apply_visibility(visible: bool, ctx: &impl ViewportCtx, restore: (i32, i32)) {
    let target = if visible {
        egui::pos2(restore.0 as f32, restore.1 as f32)
    } else {
        egui::pos2(OFFSCREEN_POS.0, OFFSCREEN_POS.1)
    };
    tracing::debug!(visible, x = target.x, y = target.y, "applying visibility");
    ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(target));
    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
    if visible {
        ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
    }
    ctx.request_repaint();
}
