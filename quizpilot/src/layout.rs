use {
    crate::{desktop::Desktop, similarity::similarity, types::ScreenRegion},
    anyhow::Context as _,
    image::RgbaImage,
    serde::{Deserialize, Serialize},
    std::time::Duration,
    strum::Display,
};

/// Sentinel similarity below which the layout counts as shifted.
pub const SHIFT_THRESHOLD: f64 = 0.95;

/// Which of the two configured coordinate sets is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CoordinateSet {
    /// Layout of the first question.
    First,
    /// Layout after the content moved down following the first question.
    Shifted,
}

pub struct ShiftCheck {
    pub before: RgbaImage,
    pub after: RgbaImage,
    pub similarity: f64,
    pub shifted: bool,
}

/// Detects the one-time relocation of the quiz controls after the first question.
///
/// The shift flag is a latch: once set it stays set for the rest of the run.
pub struct LayoutShiftDetector {
    sentinel: ScreenRegion,
    settle: Duration,
    baseline: Option<RgbaImage>,
    shifted: bool,
}

impl LayoutShiftDetector {
    pub fn new(sentinel: ScreenRegion, settle: Duration) -> Self {
        Self {
            sentinel,
            settle,
            baseline: None,
            shifted: false,
        }
    }

    pub fn has_shifted(&self) -> bool {
        self.shifted
    }

    pub fn baseline(&self) -> Option<&RgbaImage> {
        self.baseline.as_ref()
    }

    /// Captures the sentinel region unless it was captured already.
    pub fn capture_baseline(&mut self, desktop: &mut dyn Desktop) -> anyhow::Result<()> {
        if self.baseline.is_none() {
            self.baseline = Some(desktop.capture_region(self.sentinel)?);
        }
        Ok(())
    }

    /// Waits for the screen to settle, then compares the sentinel with the baseline.
    pub fn check(&mut self, desktop: &mut dyn Desktop) -> anyhow::Result<ShiftCheck> {
        let before = self
            .baseline
            .clone()
            .context("sentinel baseline was not captured before advancing")?;
        desktop.pause(self.settle);
        let after = desktop.capture_region(self.sentinel)?;
        let similarity = similarity(&before, &after);
        if similarity < SHIFT_THRESHOLD {
            self.shifted = true;
        }
        Ok(ShiftCheck {
            before,
            after,
            similarity,
            shifted: self.shifted,
        })
    }

    /// Coordinate set to use now. An override always wins over detection.
    pub fn active_set(&self, override_set: Option<CoordinateSet>) -> CoordinateSet {
        match override_set {
            Some(set) => set,
            None if self.shifted => CoordinateSet::Shifted,
            None => CoordinateSet::First,
        }
    }
}
