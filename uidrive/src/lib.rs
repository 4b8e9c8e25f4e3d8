pub use enigo::{Button, Key};

use {
    anyhow::{bail, Context as _},
    arboard::{Clipboard, ImageData},
    enigo::{Coordinate, Direction, Enigo, Keyboard, Mouse},
    image::{imageops, RgbaImage},
    std::{
        borrow::Cow,
        sync::{Arc, Mutex, MutexGuard, PoisonError},
        thread::sleep,
        time::Duration,
    },
    tracing::trace,
};

/// Delay after each injected input event so that the target application can process it.
const INPUT_SETTLE_DURATION: Duration = Duration::from_millis(50);
/// Delay between the clicks of a multi-click gesture. Must stay below the
/// system double-click interval.
const MULTI_CLICK_INTERVAL: Duration = Duration::from_millis(40);

// Modifier used by the platform's copy/paste shortcuts.
#[cfg(target_os = "macos")]
const SHORTCUT_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const SHORTCUT_MODIFIER: Key = Key::Control;

struct ContextData {
    enigo: Mutex<Enigo>,
    // Must outlive any text or image we put on the clipboard: on X11 the
    // contents are served by this process.
    clipboard: Mutex<Clipboard>,
}

#[derive(Clone)]
pub struct Context(Arc<ContextData>);

impl Context {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&enigo::Settings::default())
            .context("failed to initialize input injection")?;
        let clipboard = Clipboard::new().context("failed to open the system clipboard")?;
        Ok(Self(Arc::new(ContextData {
            enigo: Mutex::new(enigo),
            clipboard: Mutex::new(clipboard),
        })))
    }

    fn enigo(&self) -> MutexGuard<'_, Enigo> {
        self.0.enigo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clipboard(&self) -> MutexGuard<'_, Clipboard> {
        self.0
            .clipboard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mouse_move_global(&self, x: i32, y: i32) -> anyhow::Result<()> {
        self.enigo().move_mouse(x, y, Coordinate::Abs)?;
        sleep(INPUT_SETTLE_DURATION);
        Ok(())
    }

    pub fn mouse_click(&self, button: Button) -> anyhow::Result<()> {
        self.enigo().button(button, Direction::Click)?;
        sleep(INPUT_SETTLE_DURATION);
        Ok(())
    }

    pub fn mouse_left_click(&self) -> anyhow::Result<()> {
        self.mouse_click(Button::Left)
    }

    /// Moves the pointer to the global position and clicks the left button there.
    pub fn click_at(&self, x: i32, y: i32) -> anyhow::Result<()> {
        trace!(x, y, "click");
        self.mouse_move_global(x, y)?;
        self.mouse_left_click()
    }

    /// Clicks `count` times in quick succession, e.g. 3 to select a paragraph.
    pub fn multi_click_at(&self, x: i32, y: i32, count: u32) -> anyhow::Result<()> {
        trace!(x, y, count, "multi click");
        self.mouse_move_global(x, y)?;
        let mut enigo = self.enigo();
        for i in 0..count {
            if i > 0 {
                sleep(MULTI_CLICK_INTERVAL);
            }
            enigo.button(Button::Left, Direction::Click)?;
        }
        drop(enigo);
        sleep(INPUT_SETTLE_DURATION);
        Ok(())
    }

    pub fn cursor_position(&self) -> anyhow::Result<(i32, i32)> {
        Ok(self.enigo().location()?)
    }

    pub fn key_combination(&self, keys: &[Key]) -> anyhow::Result<()> {
        let mut enigo = self.enigo();
        for key in keys {
            enigo.key(*key, Direction::Press)?;
        }
        for key in keys.iter().rev() {
            enigo.key(*key, Direction::Release)?;
        }
        drop(enigo);
        sleep(INPUT_SETTLE_DURATION);
        Ok(())
    }

    /// Presses the platform paste shortcut (Ctrl+V, or Cmd+V on macOS).
    pub fn paste(&self) -> anyhow::Result<()> {
        self.key_combination(&[SHORTCUT_MODIFIER, Key::Unicode('v')])
    }

    /// Presses the platform copy shortcut (Ctrl+C, or Cmd+C on macOS).
    pub fn copy(&self) -> anyhow::Result<()> {
        self.key_combination(&[SHORTCUT_MODIFIER, Key::Unicode('c')])
    }

    pub fn capture_full_screen(&self) -> anyhow::Result<RgbaImage> {
        let image = xcap::Monitor::all()?
            .first()
            .context("no monitors found")?
            .capture_image()?;
        Ok(image)
    }

    /// Captures a rectangle of the primary monitor given in monitor pixels.
    ///
    /// Unlike cropping by hand, a rectangle that doesn't fit on the screen is
    /// reported as an error instead of silently producing a smaller image.
    pub fn capture_region(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> anyhow::Result<RgbaImage> {
        let screen = self.capture_full_screen()?;
        let fits_x = x.checked_add(width).is_some_and(|r| r <= screen.width());
        let fits_y = y.checked_add(height).is_some_and(|b| b <= screen.height());
        if !fits_x || !fits_y {
            bail!(
                "region {}x{} at ({}, {}) doesn't fit on the {}x{} screen",
                width,
                height,
                x,
                y,
                screen.width(),
                screen.height(),
            );
        }
        Ok(imageops::crop_imm(&screen, x, y, width, height).to_image())
    }

    pub fn clipboard_text(&self) -> anyhow::Result<String> {
        Ok(self.clipboard().get_text()?)
    }

    pub fn set_clipboard_text(&self, text: &str) -> anyhow::Result<()> {
        self.clipboard().set_text(text)?;
        Ok(())
    }

    pub fn set_clipboard_image(&self, image: &RgbaImage) -> anyhow::Result<()> {
        let data = ImageData {
            width: image.width() as usize,
            height: image.height() as usize,
            bytes: Cow::Borrowed(image.as_raw()),
        };
        self.clipboard()
            .set_image(data)
            .context("failed to put image on the clipboard")?;
        Ok(())
    }
}
