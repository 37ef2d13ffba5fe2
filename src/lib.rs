pub mod autostart;
pub mod background;
pub mod clock;
pub mod compositor;
pub mod glyph;
pub mod gui;
pub mod logging;
pub mod mask;
pub mod paths;
pub mod settings;
pub mod tray;
pub mod visibility;
pub mod widget;
