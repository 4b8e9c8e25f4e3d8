//! Global keyboard hotkeys.
//!
//! `rdev::listen` blocks its thread for the rest of the process, so a single
//! listener thread forwards key presses to whoever holds the [`KeyEvents`].

use {
    crate::cancel::CancellationToken,
    anyhow::Context as _,
    rdev::{EventType, Key},
    std::{
        sync::mpsc::{self, Receiver, RecvTimeoutError},
        thread::{self, JoinHandle},
        time::Duration,
    },
    tracing::{error, warn},
};

/// Resolves a configured key name such as `"f9"` or `"escape"`.
pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim().to_ascii_lowercase();
    let key = match name.as_str() {
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "pause" => Key::Pause,
        "home" => Key::Home,
        "end" => Key::End,
        "insert" => Key::Insert,
        "delete" => Key::Delete,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        _ => return None,
    };
    Some(key)
}

pub struct KeyEvents {
    receiver: Receiver<Key>,
}

impl KeyEvents {
    /// Starts the global key listener.
    pub fn listen() -> Self {
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = rdev::listen(move |event| {
                if let EventType::KeyPress(key) = event.event_type {
                    // The receiver is gone once nobody waits for keys anymore.
                    let _ = sender.send(key);
                }
            });
            if let Err(err) = result {
                error!("global key listener failed: {:?}", err);
            }
        });
        Self { receiver }
    }

    /// Blocks until one of `keys` is pressed and returns it.
    pub fn wait_for_any(&self, keys: &[Key]) -> anyhow::Result<Key> {
        loop {
            let key = self
                .receiver
                .recv()
                .context("global key listener has stopped")?;
            if keys.contains(&key) {
                return Ok(key);
            }
        }
    }

    pub fn wait_for(&self, key: Key) -> anyhow::Result<()> {
        self.wait_for_any(&[key]).map(|_| ())
    }

    /// Returns `true` if `key` was pressed within `timeout`.
    pub fn pressed_within(&self, key: Key, timeout: Duration) -> anyhow::Result<bool> {
        match self.receiver.recv_timeout(timeout) {
            Ok(pressed) => Ok(pressed == key),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                anyhow::bail!("global key listener has stopped")
            }
        }
    }

    /// Cancels `token` when `stop_key` is pressed. Consumes the listener.
    pub fn cancel_on(self, stop_key: Key, token: CancellationToken) -> JoinHandle<()> {
        thread::spawn(move || match self.wait_for(stop_key) {
            Ok(()) => {
                warn!("emergency stop requested, finishing the current step");
                token.cancel();
            }
            Err(err) => error!("stop hotkey is unavailable: {:?}", err),
        })
    }
}

#[test]
fn parses_key_names() {
    assert_eq!(parse_key("F9"), Some(Key::F9));
    assert_eq!(parse_key(" esc "), Some(Key::Escape));
    assert_eq!(parse_key("escape"), Some(Key::Escape));
    assert_eq!(parse_key("hyper"), None);
}
