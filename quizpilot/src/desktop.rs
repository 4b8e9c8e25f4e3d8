use {
    crate::types::{ScreenPoint, ScreenRegion},
    image::RgbaImage,
    std::{thread::sleep, time::Duration},
};

/// Everything the automation needs from the host desktop.
///
/// All blocking waits go through [`Desktop::pause`] so that polling loops can
/// be driven by a scripted desktop in tests.
pub trait Desktop {
    fn click(&mut self, point: ScreenPoint) -> anyhow::Result<()>;
    fn multi_click(&mut self, point: ScreenPoint, count: u32) -> anyhow::Result<()>;
    fn move_pointer(&mut self, point: ScreenPoint) -> anyhow::Result<()>;
    /// Triggers the platform paste shortcut in the focused input.
    fn paste(&mut self) -> anyhow::Result<()>;
    /// Triggers the platform copy shortcut for the current selection.
    fn copy(&mut self) -> anyhow::Result<()>;
    fn capture_region(&mut self, region: ScreenRegion) -> anyhow::Result<RgbaImage>;
    fn capture_screen(&mut self) -> anyhow::Result<RgbaImage>;
    fn set_clipboard_image(&mut self, image: &RgbaImage) -> anyhow::Result<()>;
    fn set_clipboard_text(&mut self, text: &str) -> anyhow::Result<()>;
    fn clipboard_text(&mut self) -> anyhow::Result<String>;
    fn pause(&mut self, duration: Duration);
}

impl Desktop for uidrive::Context {
    fn click(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        self.click_at(point.x, point.y)
    }

    fn multi_click(&mut self, point: ScreenPoint, count: u32) -> anyhow::Result<()> {
        self.multi_click_at(point.x, point.y, count)
    }

    fn move_pointer(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        self.mouse_move_global(point.x, point.y)
    }

    fn paste(&mut self) -> anyhow::Result<()> {
        uidrive::Context::paste(self)
    }

    fn copy(&mut self) -> anyhow::Result<()> {
        uidrive::Context::copy(self)
    }

    fn capture_region(&mut self, region: ScreenRegion) -> anyhow::Result<RgbaImage> {
        uidrive::Context::capture_region(self, region.x, region.y, region.width, region.height)
    }

    fn capture_screen(&mut self) -> anyhow::Result<RgbaImage> {
        self.capture_full_screen()
    }

    fn set_clipboard_image(&mut self, image: &RgbaImage) -> anyhow::Result<()> {
        uidrive::Context::set_clipboard_image(self, image)
    }

    fn set_clipboard_text(&mut self, text: &str) -> anyhow::Result<()> {
        uidrive::Context::set_clipboard_text(self, text)
    }

    fn clipboard_text(&mut self) -> anyhow::Result<String> {
        uidrive::Context::clipboard_text(self)
    }

    fn pause(&mut self, duration: Duration) {
        sleep(duration);
    }
}
