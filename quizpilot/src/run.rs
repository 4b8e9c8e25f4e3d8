use {
    crate::{
        controller::{CycleError, QuestionCycleController},
        desktop::Desktop,
    },
    strum::Display,
    tracing::{error, info, warn},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RunOutcome {
    /// The question budget was used up.
    Completed,
    /// The stop hotkey or Ctrl-C was pressed.
    Interrupted,
    /// A cycle failed; the run stops instead of skipping the question.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: u32,
    pub outcome: RunOutcome,
}

/// Runs question cycles until `budget` questions are answered (forever if
/// `None`), the controller's token is cancelled, or a cycle fails.
pub fn run_automation<D: Desktop>(
    controller: &mut QuestionCycleController<D>,
    budget: Option<u32>,
) -> RunSummary {
    let mut completed = 0;
    let outcome = loop {
        if budget.is_some_and(|budget| completed >= budget) {
            break RunOutcome::Completed;
        }
        if controller.token().is_cancelled() {
            break RunOutcome::Interrupted;
        }
        match controller.run_cycle() {
            Ok(_) => {
                completed += 1;
                if budget.is_none_or(|budget| completed < budget) {
                    info!(
                        "progress: {} questions completed, next question in {:.1?}",
                        completed,
                        controller.config().timing.between_questions
                    );
                }
            }
            Err(CycleError::Cancelled(_)) => break RunOutcome::Interrupted,
            Err(_) => {
                error!("error occurred, stopping automation");
                break RunOutcome::Failed;
            }
        }
    };
    match outcome {
        RunOutcome::Completed => info!("automation complete: processed {} questions", completed),
        RunOutcome::Interrupted => warn!("automation stopped after {} questions", completed),
        RunOutcome::Failed => error!("automation failed after {} questions", completed),
    }
    RunSummary { completed, outcome }
}
