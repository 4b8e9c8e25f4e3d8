//! Answers an on-screen multiple-choice quiz by relaying each question, as an
//! image, to a chat assistant open next to it and clicking the option the
//! assistant names.
//!
//! Everything happens through simulated input and screen captures at fixed
//! coordinates, see [`desktop::Desktop`]. UI readiness is inferred by polling
//! screen regions, see [`watcher`].

pub mod answer;
pub mod assistant;
pub mod cancel;
pub mod config;
pub mod controller;
pub mod desktop;
pub mod hotkey;
pub mod journal;
pub mod layout;
pub mod logging;
pub mod reference;
pub mod run;
pub mod similarity;
pub mod types;
pub mod watcher;

pub use crate::{
    answer::{extract_answer, AnswerFormat, AnswerLetter},
    cancel::CancellationToken,
    config::Config,
    controller::{CycleError, CycleReport, QuestionCycleController},
    desktop::Desktop,
    run::{run_automation, RunOutcome, RunSummary},
    types::{ScreenPoint, ScreenRegion},
};
