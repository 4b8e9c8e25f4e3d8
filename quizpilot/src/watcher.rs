//! Readiness detection by polling a screen region.
//!
//! The assistant UI gives no explicit "done" signal, so readiness is inferred
//! either from the region matching a known reference image or from the region
//! no longer changing.

use {
    crate::{cancel::CancellationToken, desktop::Desktop, similarity::similarity, types::ScreenRegion},
    image::RgbaImage,
    std::time::Duration,
    tracing::trace,
};

/// Minimum similarity (exclusive) to a reference image for a match.
pub const REFERENCE_MATCH_THRESHOLD: f64 = 0.85;
/// Minimum similarity (inclusive) between consecutive captures for the region
/// to count as unchanged.
pub const STABILITY_THRESHOLD: f64 = 0.98;
/// Number of consecutive unchanged checks required. A single frozen frame in
/// the middle of a transition is not enough.
pub const REQUIRED_STABLE_CHECKS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WaitOutcome {
    Confirmed { elapsed: Duration, checks: u32 },
    TimedOut { elapsed: Duration, checks: u32 },
    Cancelled,
}

impl WaitOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Polls one region at a fixed interval until it is ready or the timeout runs out.
///
/// Elapsed time is accounted as `checks * interval` rather than measured, so
/// the number of checks for a given timeout is fixed.
pub struct RegionWatcher<'a> {
    region: ScreenRegion,
    interval: Duration,
    timeout: Duration,
    token: &'a CancellationToken,
}

impl<'a> RegionWatcher<'a> {
    pub fn new(
        region: ScreenRegion,
        interval: Duration,
        timeout: Duration,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            region,
            interval,
            timeout,
            token,
        }
    }

    /// Waits until a capture of the region is more than
    /// [`REFERENCE_MATCH_THRESHOLD`] similar to `reference`.
    pub fn wait_for_match(
        &self,
        desktop: &mut dyn Desktop,
        reference: &RgbaImage,
    ) -> anyhow::Result<WaitOutcome> {
        let mut elapsed = Duration::ZERO;
        let mut checks = 0;
        while elapsed < self.timeout {
            if self.token.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }
            desktop.pause(self.interval);
            elapsed += self.interval;
            checks += 1;

            let current = desktop.capture_region(self.region)?;
            let value = similarity(reference, &current);
            trace!(checks, value, "reference match check");
            if value > REFERENCE_MATCH_THRESHOLD {
                return Ok(WaitOutcome::Confirmed { elapsed, checks });
            }
        }
        Ok(WaitOutcome::TimedOut { elapsed, checks })
    }

    /// Waits until [`REQUIRED_STABLE_CHECKS`] consecutive captures are at least
    /// [`STABILITY_THRESHOLD`] similar to the capture before them.
    pub fn wait_for_stable(&self, desktop: &mut dyn Desktop) -> anyhow::Result<WaitOutcome> {
        let mut previous = desktop.capture_region(self.region)?;
        let mut stable_count = 0;
        let mut elapsed = Duration::ZERO;
        let mut checks = 0;
        while elapsed < self.timeout {
            if self.token.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }
            desktop.pause(self.interval);
            elapsed += self.interval;
            checks += 1;

            let current = desktop.capture_region(self.region)?;
            let value = similarity(&previous, &current);
            trace!(checks, value, stable_count, "stability check");
            if value >= STABILITY_THRESHOLD {
                stable_count += 1;
                if stable_count >= REQUIRED_STABLE_CHECKS {
                    return Ok(WaitOutcome::Confirmed { elapsed, checks });
                }
            } else {
                stable_count = 0;
            }
            previous = current;
        }
        Ok(WaitOutcome::TimedOut { elapsed, checks })
    }
}
