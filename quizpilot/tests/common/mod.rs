#![allow(dead_code)]

use {
    image::{Rgba, RgbaImage},
    quizpilot::{CancellationToken, Desktop, ScreenPoint, ScreenRegion},
    std::{
        collections::{HashMap, VecDeque},
        time::Duration,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum Clip {
    Empty,
    Text(String),
    Image(RgbaImage),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Click(ScreenPoint),
    MultiClick(ScreenPoint, u32),
    Move(ScreenPoint),
    /// Paste with whatever was on the clipboard at that moment.
    Paste(Clip),
    Copy,
    Capture(ScreenRegion),
}

/// A desktop whose captures and copied text follow a script.
///
/// Every region plays back its queued frames in order and keeps returning the
/// last one once the queue is down to a single frame. Pauses only add up.
pub struct ScriptedDesktop {
    frames: HashMap<ScreenRegion, VecDeque<RgbaImage>>,
    responses: VecDeque<String>,
    clipboard: Clip,
    cancel_on_copy: Option<CancellationToken>,
    pub events: Vec<Event>,
    pub paused: Duration,
}

impl ScriptedDesktop {
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            responses: VecDeque::new(),
            clipboard: Clip::Empty,
            cancel_on_copy: None,
            events: Vec::new(),
            paused: Duration::ZERO,
        }
    }

    pub fn with_frames(mut self, region: ScreenRegion, frames: Vec<RgbaImage>) -> Self {
        self.frames.entry(region).or_default().extend(frames);
        self
    }

    /// Text that each consecutive copy puts on the clipboard.
    pub fn with_responses(mut self, responses: &[&str]) -> Self {
        self.responses
            .extend(responses.iter().map(|s| s.to_string()));
        self
    }

    /// Cancels `token` as soon as the response is copied for the first time.
    pub fn with_cancel_on_copy(mut self, token: CancellationToken) -> Self {
        self.cancel_on_copy = Some(token);
        self
    }

    pub fn copies(&self) -> usize {
        self.events.iter().filter(|event| **event == Event::Copy).count()
    }

    pub fn clicks(&self) -> Vec<ScreenPoint> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Click(point) => Some(*point),
                _ => None,
            })
            .collect()
    }

    pub fn captures_of(&self, region: ScreenRegion) -> usize {
        self.events
            .iter()
            .filter(|event| **event == Event::Capture(region))
            .count()
    }
}

impl Desktop for ScriptedDesktop {
    fn click(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        self.events.push(Event::Click(point));
        Ok(())
    }

    fn multi_click(&mut self, point: ScreenPoint, count: u32) -> anyhow::Result<()> {
        self.events.push(Event::MultiClick(point, count));
        Ok(())
    }

    fn move_pointer(&mut self, point: ScreenPoint) -> anyhow::Result<()> {
        self.events.push(Event::Move(point));
        Ok(())
    }

    fn paste(&mut self) -> anyhow::Result<()> {
        self.events.push(Event::Paste(self.clipboard.clone()));
        Ok(())
    }

    fn copy(&mut self) -> anyhow::Result<()> {
        self.events.push(Event::Copy);
        if let Some(token) = &self.cancel_on_copy {
            token.cancel();
        }
        let next = if self.responses.len() > 1 {
            self.responses.pop_front()
        } else {
            self.responses.front().cloned()
        };
        self.clipboard = Clip::Text(next.unwrap_or_default());
        Ok(())
    }

    fn capture_region(&mut self, region: ScreenRegion) -> anyhow::Result<RgbaImage> {
        self.events.push(Event::Capture(region));
        let queue = self.frames.entry(region).or_default();
        let frame = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(frame.unwrap_or_else(|| solid(region.width, region.height, GRAY)))
    }

    fn capture_screen(&mut self) -> anyhow::Result<RgbaImage> {
        Ok(solid(32, 18, GRAY))
    }

    fn set_clipboard_image(&mut self, image: &RgbaImage) -> anyhow::Result<()> {
        self.clipboard = Clip::Image(image.clone());
        Ok(())
    }

    fn set_clipboard_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.clipboard = Clip::Text(text.into());
        Ok(())
    }

    fn clipboard_text(&mut self) -> anyhow::Result<String> {
        match &self.clipboard {
            Clip::Text(text) => Ok(text.clone()),
            _ => Ok(String::new()),
        }
    }

    fn pause(&mut self, duration: Duration) {
        self.paused += duration;
    }
}

pub const GRAY: Rgba<u8> = Rgba([128, 128, 128, 255]);
pub const BLUE: Rgba<u8> = Rgba([30, 90, 220, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub fn solid(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

/// A copy of `image` with the first `count` pixels (row-major) changed.
pub fn with_changed_pixels(image: &RgbaImage, count: u32) -> RgbaImage {
    let mut image = image.clone();
    let width = image.width();
    for i in 0..count {
        let pixel = image.get_pixel_mut(i % width, i / width);
        pixel.0[0] = pixel.0[0].wrapping_add(1);
    }
    image
}
