use {
    crate::{
        answer::{extract_answer, AnswerLetter, Extraction},
        assistant::{Assistant, ResponseOutcome, SendOutcome},
        cancel::CancellationToken,
        config::{Config, UnparseablePolicy},
        desktop::Desktop,
        journal::{ScreenshotJournal, ShotCategory},
        layout::{CoordinateSet, LayoutShiftDetector},
        reference::{load_image, ReferenceImages},
    },
    itertools::Itertools,
    std::{
        backtrace::BacktraceStatus,
        iter,
        path::{Path, PathBuf},
    },
    strum::Display,
    tracing::{error, info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CycleStep {
    Capture,
    Send,
    AwaitResponse,
    Parse,
    SelectAnswer,
    Advance,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("option {letter} has no coordinates in the {set} layout")]
    InvalidOption {
        letter: AnswerLetter,
        set: CoordinateSet,
    },
    #[error("could not parse an answer from the response {response:?}")]
    UnparseableResponse { response: String },
    #[error("stopped during the {0} step")]
    Cancelled(CycleStep),
    #[error("{step} step failed")]
    Step {
        step: CycleStep,
        #[source]
        source: anyhow::Error,
    },
}

trait InStep<T> {
    fn in_step(self, step: CycleStep) -> Result<T, CycleError>;
}

impl<T> InStep<T> for anyhow::Result<T> {
    fn in_step(self, step: CycleStep) -> Result<T, CycleError> {
        self.map_err(|source| CycleError::Step { step, source })
    }
}

/// State carried from one question to the next for the whole run.
pub struct CycleState {
    pub question_count: u32,
    pub layout: LayoutShiftDetector,
}

impl CycleState {
    pub fn screen_has_shifted(&self) -> bool {
        self.layout.has_shifted()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub question: u32,
    pub send: SendOutcome,
    /// `None` if no valid response arrived in time.
    pub response: Option<String>,
    pub extraction: Extraction,
    pub layout: CoordinateSet,
}

impl CycleReport {
    pub fn answer(&self) -> AnswerLetter {
        self.extraction.letter
    }
}

/// Answers one question per [`run_cycle`](Self::run_cycle) call:
/// capture, send, await response, parse, select answer, advance.
pub struct QuestionCycleController<D> {
    desktop: D,
    config: Config,
    references: ReferenceImages,
    journal: ScreenshotJournal,
    token: CancellationToken,
    state: CycleState,
}

impl<D: Desktop> QuestionCycleController<D> {
    pub fn new(
        desktop: D,
        config: Config,
        references: ReferenceImages,
        token: CancellationToken,
    ) -> anyhow::Result<Self> {
        let journal = ScreenshotJournal::new(&config.screenshots.dir, config.screenshots.enabled)?;
        let layout = LayoutShiftDetector::new(config.layout.sentinel, config.timing.shift_settle);
        Ok(Self {
            desktop,
            config,
            references,
            journal,
            token,
            state: CycleState {
                question_count: 0,
                layout,
            },
        })
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    fn shift_detection_enabled(&self) -> bool {
        self.config.layout.override_set.is_none()
    }

    /// Runs one full question cycle.
    ///
    /// A failure is logged together with a screenshot of the whole screen; the
    /// process keeps running and the caller decides what to do next.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        if self.token.is_cancelled() {
            return Err(CycleError::Cancelled(CycleStep::Capture));
        }
        self.state.question_count += 1;
        let question = self.state.question_count;
        info!("{}", "=".repeat(60));
        info!("processing question #{}", question);
        info!("{}", "=".repeat(60));

        let result = self.run_steps(question);
        match &result {
            Ok(report) => info!(
                "question #{} completed with answer {}",
                question,
                report.answer()
            ),
            Err(CycleError::Cancelled(step)) => {
                warn!("question #{} stopped during the {} step", question, step);
            }
            Err(err) => {
                let chain = iter::successors(Some(err as &dyn std::error::Error), |e| (*e).source())
                    .join(": ");
                error!("question #{} failed: {}", question, chain);
                if let CycleError::Step { source, .. } = err {
                    if source.backtrace().status() == BacktraceStatus::Captured {
                        error!("backtrace:\n{}", source.backtrace());
                    }
                }
                self.journal.capture(
                    &mut self.desktop,
                    ShotCategory::Errors,
                    &format!("error_q{}", question),
                );
            }
        }
        result
    }

    fn run_steps(&mut self, question: u32) -> Result<CycleReport, CycleError> {
        let image_path = self.capture_question(question).in_step(CycleStep::Capture)?;
        let send = self.send_question(question, &image_path)?;
        let response = self.await_response(question)?;
        let extraction = self.parse_answer(response.as_deref().unwrap_or_default())?;
        let layout = self.select_answer(question, extraction.letter)?;
        self.advance(question).in_step(CycleStep::Advance)?;
        Ok(CycleReport {
            question,
            send,
            response,
            extraction,
            layout,
        })
    }

    fn capture_question(&mut self, question: u32) -> anyhow::Result<PathBuf> {
        info!("capturing the question area {}", self.config.question_area);
        let image = self.desktop.capture_region(self.config.question_area)?;
        let path = self.journal.store_transient(&image)?;
        self.journal.save(
            ShotCategory::Questions,
            &format!("question_{}", question),
            &image,
        );
        Ok(path)
    }

    fn send_question(
        &mut self,
        question: u32,
        image_path: &Path,
    ) -> Result<SendOutcome, CycleError> {
        let image = load_image(image_path).in_step(CycleStep::Send)?;
        let assistant = Assistant::new(&self.config, &self.references, &self.token);
        let outcome = assistant
            .submit_question(&mut self.desktop, &image)
            .in_step(CycleStep::Send)?;
        if outcome == SendOutcome::Cancelled {
            return Err(CycleError::Cancelled(CycleStep::Send));
        }
        info!("question sent to the assistant");
        self.journal.capture(
            &mut self.desktop,
            ShotCategory::AssistantInput,
            &format!("input_{}", question),
        );
        Ok(outcome)
    }

    fn await_response(&mut self, question: u32) -> Result<Option<String>, CycleError> {
        let assistant = Assistant::new(&self.config, &self.references, &self.token);
        let outcome = assistant
            .poll_response(&mut self.desktop)
            .in_step(CycleStep::AwaitResponse)?;
        let response = match outcome {
            ResponseOutcome::Answer { text, .. } => {
                info!("assistant response (length: {}): {:?}", text.len(), text);
                Some(text)
            }
            ResponseOutcome::NoResponse { .. } => {
                warn!(
                    "empty or invalid response from the assistant; response area is {}",
                    self.config.assistant.response_area
                );
                warn!("if this keeps happening, calibrate a larger response area");
                None
            }
            ResponseOutcome::Cancelled => {
                return Err(CycleError::Cancelled(CycleStep::AwaitResponse));
            }
        };
        self.journal.capture(
            &mut self.desktop,
            ShotCategory::AssistantResponse,
            &format!("response_{}", question),
        );
        Ok(response)
    }

    fn parse_answer(&self, response: &str) -> Result<Extraction, CycleError> {
        info!("parsing answer from {:?}", response);
        let extraction = extract_answer(response, self.config.answer_format);
        if extraction.is_default()
            && self.config.unparseable_response == UnparseablePolicy::FailCycle
        {
            return Err(CycleError::UnparseableResponse {
                response: response.into(),
            });
        }
        Ok(extraction)
    }

    fn select_answer(
        &mut self,
        question: u32,
        letter: AnswerLetter,
    ) -> Result<CoordinateSet, CycleError> {
        info!("selecting answer {}", letter);
        // The baseline is taken before the answer is clicked so that the
        // selection highlight doesn't count as a layout shift.
        if self.shift_detection_enabled() && question == 1 {
            self.state
                .layout
                .capture_baseline(&mut self.desktop)
                .in_step(CycleStep::SelectAnswer)?;
        }

        let set = self.state.layout.active_set(self.config.layout.override_set);
        let point = *self
            .config
            .answer_options
            .get(set)
            .get(&letter)
            .ok_or(CycleError::InvalidOption { letter, set })?;
        info!("using {} coordinates for question #{}", set, question);

        self.desktop
            .click(point)
            .in_step(CycleStep::SelectAnswer)?;
        self.desktop.pause(self.config.timing.after_click);
        info!("answer {} selected", letter);
        self.journal.capture(
            &mut self.desktop,
            ShotCategory::Answers,
            &format!("selected_{}_q{}", letter, question),
        );
        Ok(set)
    }

    fn advance(&mut self, question: u32) -> anyhow::Result<()> {
        info!("clicking the next button");
        let detect_shift = self.shift_detection_enabled() && question == 1;
        if detect_shift {
            self.state.layout.capture_baseline(&mut self.desktop)?;
        }

        let set = self.state.layout.active_set(self.config.layout.override_set);
        let point = *self.config.next_button.get(set);
        info!("using {} coordinates for question #{}", set, question);
        self.desktop.click(point)?;
        self.desktop.pause(self.config.timing.between_questions);
        info!("moved to the next question");
        self.journal.capture(
            &mut self.desktop,
            ShotCategory::Questions,
            &format!("after_next_q{}", question),
        );

        if detect_shift {
            let check = self.state.layout.check(&mut self.desktop)?;
            self.journal
                .save(ShotCategory::ScreenShift, "before_shift_q1", &check.before);
            self.journal
                .save(ShotCategory::ScreenShift, "after_shift_q2", &check.after);
            if check.shifted {
                info!(
                    "screen shift detected (similarity: {:.2}), using shifted coordinates from now on",
                    check.similarity
                );
            } else {
                info!(
                    "no screen shift detected (similarity: {:.2}), keeping first-question coordinates",
                    check.similarity
                );
            }
        }
        Ok(())
    }
}
