//! Driving the chat assistant through its UI: submitting a question image and
//! reading the answer back.

use {
    crate::{
        answer::{is_plausible_answer, AnswerFormat},
        cancel::CancellationToken,
        config::{AssistantConfig, Config, RetryPolicy, TimingConfig},
        desktop::Desktop,
        reference::ReferenceImages,
        similarity::similarity,
        watcher::{RegionWatcher, WaitOutcome, REFERENCE_MATCH_THRESHOLD},
    },
    image::RgbaImage,
    std::time::Duration,
    tracing::{debug, info, warn},
};

/// Pause after pasting the reminder prompt, before the clipboard is reused.
const PROMPT_PASTE_DELAY: Duration = Duration::from_millis(300);
/// Pause after clicking the send button before the pointer is moved away.
const SEND_CLICK_DELAY: Duration = Duration::from_millis(300);
/// Pause after moving the pointer off the send button so the hover effect fades.
const HOVER_CLEAR_DELAY: Duration = Duration::from_millis(200);
/// Horizontal distance the pointer is moved away from the send button.
const HOVER_CLEAR_OFFSET: i32 = -100;
/// Pauses around the copy shortcut when reading the response.
const SELECT_DELAY: Duration = Duration::from_millis(200);
const COPY_DELAY: Duration = Duration::from_millis(200);
/// Distance from the response area's bottom-right corner where it is clicked.
/// Clicking near the top would hit the assistant's collapsible analysis header.
const RESPONSE_CLICK_INSET: u32 = 5;
/// Without a "sent" reference, a send click is confirmed when the button
/// region is at most this similar to its pre-click capture.
const SEND_CHANGE_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Confirmed { attempts: u32 },
    /// Retries exhausted; the run continues as if the message was sent.
    Unconfirmed { attempts: u32 },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Answer { text: String, attempts: u32 },
    NoResponse { attempts: u32 },
    Cancelled,
}

pub struct Assistant<'a> {
    config: &'a AssistantConfig,
    timing: &'a TimingConfig,
    retry: &'a RetryPolicy,
    format: AnswerFormat,
    references: &'a ReferenceImages,
    token: &'a CancellationToken,
}

impl<'a> Assistant<'a> {
    pub fn new(
        config: &'a Config,
        references: &'a ReferenceImages,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            config: &config.assistant,
            timing: &config.timing,
            retry: &config.send_retry,
            format: config.answer_format,
            references,
            token,
        }
    }

    /// Puts the reminder prompt and the question image into the input field and sends them.
    ///
    /// The prompt travels through the clipboard too, so the image has to be put
    /// back on the clipboard after the prompt is pasted.
    pub fn submit_question(
        &self,
        desktop: &mut dyn Desktop,
        question: &RgbaImage,
    ) -> anyhow::Result<SendOutcome> {
        info!("pasting question image into the assistant input");
        desktop.set_clipboard_image(question)?;
        desktop.click(self.config.input_field)?;
        desktop.pause(self.timing.after_click);

        desktop.set_clipboard_text(&self.config.prompt)?;
        desktop.paste()?;
        desktop.pause(PROMPT_PASTE_DELAY);

        desktop.set_clipboard_image(question)?;
        debug!("image reloaded to clipboard");
        desktop.paste()?;
        desktop.pause(self.timing.after_paste);

        match self.wait_until_ready(desktop)? {
            WaitOutcome::Confirmed { elapsed, .. } => {
                info!("send button ready after {:.1?}", elapsed + self.timing.upload_initial_delay);
            }
            WaitOutcome::TimedOut { elapsed, .. } => {
                warn!(
                    "send button not ready after {:.1?}, proceeding anyway",
                    elapsed + self.timing.upload_initial_delay
                );
            }
            WaitOutcome::Cancelled => return Ok(SendOutcome::Cancelled),
        }

        self.send_until_confirmed(desktop)
    }

    /// Waits for the image upload to finish by watching the send button.
    pub fn wait_until_ready(&self, desktop: &mut dyn Desktop) -> anyhow::Result<WaitOutcome> {
        info!("waiting for the image upload (watching the send button)");
        desktop.pause(self.timing.upload_initial_delay);
        let watcher = RegionWatcher::new(
            self.config.send_button_region(),
            self.timing.ready_check_interval,
            self.timing
                .ready_timeout
                .saturating_sub(self.timing.upload_initial_delay),
            self.token,
        );
        match &self.references.ready {
            Some(reference) => watcher.wait_for_match(desktop, reference),
            None => {
                debug!("no ready reference, waiting for the button to stop changing");
                watcher.wait_for_stable(desktop)
            }
        }
    }

    /// Clicks the send button until the button shows the "sent" state.
    ///
    /// Re-clicking is harmless while the message is still unsent, so the click
    /// is simply repeated under the configured retry policy.
    pub fn send_until_confirmed(&self, desktop: &mut dyn Desktop) -> anyhow::Result<SendOutcome> {
        let region = self.config.send_button_region();
        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            if self.token.is_cancelled() {
                return Ok(SendOutcome::Cancelled);
            }
            let before = match self.references.sent {
                Some(_) => None,
                None => Some(desktop.capture_region(region)?),
            };

            info!("clicking send button (attempt {}/{})", attempt, max_attempts);
            desktop.click(self.config.send_button)?;
            desktop.pause(SEND_CLICK_DELAY);
            desktop.move_pointer(self.config.send_button.offset(HOVER_CLEAR_OFFSET, 0))?;
            desktop.pause(HOVER_CLEAR_DELAY);
            let after = desktop.capture_region(region)?;

            let confirmed = match (&self.references.sent, &before) {
                (Some(reference), _) => {
                    let value = similarity(reference, &after);
                    debug!("attempt {}: sent state match {:.2}", attempt, value);
                    value > REFERENCE_MATCH_THRESHOLD
                }
                (None, Some(before)) => {
                    let value = similarity(before, &after);
                    debug!("attempt {}: button similarity to pre-click {:.2}", attempt, value);
                    value <= SEND_CHANGE_THRESHOLD
                }
                (None, None) => false,
            };
            if confirmed {
                info!("message sent on attempt {}", attempt);
                return Ok(SendOutcome::Confirmed { attempts: attempt });
            }
            if attempt < max_attempts {
                desktop.pause(self.retry.delay_after(attempt));
            }
        }
        warn!(
            "send could not be confirmed after {} attempts, proceeding anyway",
            max_attempts
        );
        Ok(SendOutcome::Unconfirmed {
            attempts: max_attempts,
        })
    }

    /// Copies the response text repeatedly until it contains a plausible answer.
    pub fn poll_response(&self, desktop: &mut dyn Desktop) -> anyhow::Result<ResponseOutcome> {
        info!("waiting for the assistant's response");
        desktop.pause(self.timing.response_initial_delay);
        let interval = self.timing.response_poll_interval;
        let max_attempts = self.timing.response_max_attempts;
        for attempt in 1..=max_attempts {
            if self.token.is_cancelled() {
                return Ok(ResponseOutcome::Cancelled);
            }
            desktop.pause(interval);
            let text = self.read_response(desktop).unwrap_or_else(|err| {
                warn!("failed to copy the response: {:?}", err);
                String::new()
            });
            if is_plausible_answer(&text, self.format) {
                info!(
                    "valid response after {:.1?}: {:?}",
                    interval * attempt,
                    text
                );
                return Ok(ResponseOutcome::Answer {
                    text,
                    attempts: attempt,
                });
            }
            if attempt % 4 == 0 {
                info!(
                    "[{:.1?}] waiting for a valid response (got: {:?})",
                    interval * attempt,
                    text
                );
            }
        }
        warn!("no valid response after {:.1?}", interval * max_attempts);
        Ok(ResponseOutcome::NoResponse {
            attempts: max_attempts,
        })
    }

    /// Selects the last paragraph of the response area and copies it.
    fn read_response(&self, desktop: &mut dyn Desktop) -> anyhow::Result<String> {
        let point = self
            .config
            .response_area
            .bottom_right_inset(RESPONSE_CLICK_INSET);
        desktop.multi_click(point, 3)?;
        desktop.pause(SELECT_DELAY);
        desktop.copy()?;
        desktop.pause(COPY_DELAY);
        Ok(desktop.clipboard_text()?.trim().to_string())
    }
}
