mod common;

use {
    common::{solid, ScriptedDesktop, BLUE, GRAY, WHITE},
    quizpilot::{
        answer::ExtractionMethod,
        assistant::SendOutcome,
        config::UnparseablePolicy,
        controller::CycleStep,
        layout::CoordinateSet,
        reference::ReferenceImages,
        run_automation, AnswerLetter, CancellationToken, Config, CycleError,
        QuestionCycleController, RunOutcome, RunSummary, ScreenRegion,
    },
    tempfile::TempDir,
};

fn test_config(dir: &TempDir, screenshots: bool) -> Config {
    let mut config = Config::default();
    config.question_area = ScreenRegion::new(40, 180, 16, 12);
    config.screenshots.enabled = screenshots;
    config.screenshots.dir = dir.path().join("screenshots");
    config.timing.response_max_attempts = 6;
    config
}

fn references(config: &Config) -> ReferenceImages {
    let region = config.assistant.send_button_region();
    ReferenceImages {
        ready: Some(solid(region.width, region.height, WHITE)),
        sent: Some(solid(region.width, region.height, BLUE)),
    }
}

/// Send button that is ready at once and shows "sent" after the first click.
fn quick_send(config: &Config) -> Vec<image::RgbaImage> {
    let region = config.assistant.send_button_region();
    vec![
        solid(region.width, region.height, WHITE),
        solid(region.width, region.height, BLUE),
    ]
}

fn count_files(dir: &std::path::Path) -> usize {
    fs_err::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn first_question_then_shifted_layout() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, true);
    let send_region = config.assistant.send_button_region();
    let sentinel = config.layout.sentinel;
    let (w, h) = (send_region.width, send_region.height);
    let desktop = ScriptedDesktop::new()
        .with_frames(
            send_region,
            vec![
                // Question 1: ready, then sent on the second click.
                solid(w, h, WHITE),
                solid(w, h, GRAY),
                solid(w, h, BLUE),
                // Question 2: ready, then sent on the first click.
                solid(w, h, WHITE),
                solid(w, h, BLUE),
            ],
        )
        .with_frames(sentinel, vec![solid(20, 20, GRAY), solid(20, 20, BLUE)])
        .with_responses(&["", "A B B", "C"]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let report = controller.run_cycle().unwrap();
    assert_eq!(report.question, 1);
    assert_eq!(report.send, SendOutcome::Confirmed { attempts: 2 });
    assert_eq!(report.response.as_deref(), Some("A B B"));
    assert_eq!(report.answer(), AnswerLetter::B);
    assert_eq!(report.layout, CoordinateSet::First);
    assert_eq!(controller.state().question_count, 1);
    assert!(controller.state().screen_has_shifted());

    let option_b = config.answer_options.first[&AnswerLetter::B];
    let clicks = controller.desktop().clicks();
    let tail = &clicks[clicks.len() - 2..];
    assert_eq!(tail, [option_b, config.next_button.first]);

    let report = controller.run_cycle().unwrap();
    assert_eq!(report.question, 2);
    assert_eq!(report.send, SendOutcome::Confirmed { attempts: 1 });
    assert_eq!(report.answer(), AnswerLetter::C);
    assert_eq!(report.layout, CoordinateSet::Shifted);
    assert!(controller.state().screen_has_shifted());
    let clicks = controller.desktop().clicks();
    let tail = &clicks[clicks.len() - 2..];
    assert_eq!(
        tail,
        [
            config.answer_options.shifted[&AnswerLetter::C],
            config.next_button.shifted
        ]
    );
    // The sentinel is only compared around the first transition.
    assert_eq!(controller.desktop().captures_of(sentinel), 2);

    let root = dir.path().join("screenshots");
    assert!(root.join("temp_question.png").is_file());
    assert_eq!(count_files(&root.join("screen_shift")), 2);
    assert_eq!(count_files(&root.join("answers")), 2);
    assert_eq!(count_files(&root.join("errors")), 0);
}

#[test]
fn unchanged_sentinel_keeps_first_layout() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, false);
    let mut frames = quick_send(&config);
    frames.extend(quick_send(&config));
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), frames)
        .with_responses(&["D"]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    controller.run_cycle().unwrap();
    assert!(!controller.state().screen_has_shifted());
    let report = controller.run_cycle().unwrap();
    assert_eq!(report.layout, CoordinateSet::First);
    assert_eq!(
        controller.desktop().clicks().last(),
        Some(&config.next_button.first)
    );
}

#[test]
fn override_skips_shift_detection() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, false);
    config.layout.override_set = Some(CoordinateSet::Shifted);
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["A"]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let report = controller.run_cycle().unwrap();
    assert_eq!(report.layout, CoordinateSet::Shifted);
    assert_eq!(controller.desktop().captures_of(config.layout.sentinel), 0);
    assert_eq!(
        controller.desktop().clicks().last(),
        Some(&config.next_button.shifted)
    );
}

#[test]
fn missing_option_fails_cycle() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, true);
    config.answer_options.first.remove(&AnswerLetter::D);
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["D"]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let err = controller.run_cycle().unwrap_err();
    assert!(matches!(
        err,
        CycleError::InvalidOption {
            letter: AnswerLetter::D,
            set: CoordinateSet::First,
        }
    ));
    assert_eq!(controller.state().question_count, 1);
    assert!(!controller
        .desktop()
        .clicks()
        .contains(&config.next_button.first));
    assert_eq!(
        count_files(&dir.path().join("screenshots").join("errors")),
        1
    );
}

#[test]
fn no_response_defaults_to_a() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, false);
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["..."]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let report = controller.run_cycle().unwrap();
    assert_eq!(report.response, None);
    assert_eq!(report.extraction.method, ExtractionMethod::Defaulted);
    assert!(controller
        .desktop()
        .clicks()
        .contains(&config.answer_options.first[&AnswerLetter::A]));
}

#[test]
fn no_response_fails_cycle_when_configured() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, false);
    config.unparseable_response = UnparseablePolicy::FailCycle;
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["..."]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let err = controller.run_cycle().unwrap_err();
    assert!(matches!(err, CycleError::UnparseableResponse { .. }));
    assert!(!controller
        .desktop()
        .clicks()
        .contains(&config.answer_options.first[&AnswerLetter::A]));
}

#[test]
fn run_stops_at_budget() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, false);
    let mut frames = Vec::new();
    for _ in 0..3 {
        frames.extend(quick_send(&config));
    }
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), frames)
        .with_responses(&["B"]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let summary = run_automation(&mut controller, Some(2));
    assert_eq!(
        summary,
        RunSummary {
            completed: 2,
            outcome: RunOutcome::Completed
        }
    );
    assert_eq!(controller.state().question_count, 2);
}

#[test]
fn run_with_cancelled_token_does_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, false);
    let token = CancellationToken::new();
    token.cancel();
    let mut controller =
        QuestionCycleController::new(ScriptedDesktop::new(), config.clone(), references(&config), token)
            .unwrap();

    let summary = run_automation(&mut controller, None);
    assert_eq!(
        summary,
        RunSummary {
            completed: 0,
            outcome: RunOutcome::Interrupted
        }
    );
    assert!(controller.desktop().events.is_empty());
    assert_eq!(controller.state().question_count, 0);
    assert!(matches!(
        controller.run_cycle(),
        Err(CycleError::Cancelled(_))
    ));
}

#[test]
fn run_stops_on_failed_cycle() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir, false);
    config.answer_options.first.clear();
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["B"]);
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), CancellationToken::new())
            .unwrap();

    let summary = run_automation(&mut controller, None);
    assert_eq!(
        summary,
        RunSummary {
            completed: 0,
            outcome: RunOutcome::Failed
        }
    );
}

#[test]
fn stop_while_awaiting_response_ends_cycle() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, true);
    let token = CancellationToken::new();
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["Thinking..."])
        .with_cancel_on_copy(token.clone());
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), token).unwrap();

    let err = controller.run_cycle().unwrap_err();
    assert!(matches!(
        err,
        CycleError::Cancelled(CycleStep::AwaitResponse)
    ));
    // The stop is seen at the next poll, before another copy.
    assert_eq!(controller.desktop().copies(), 1);
    assert_eq!(controller.desktop().clicks().len(), 2);
    assert_eq!(
        count_files(&dir.path().join("screenshots").join("errors")),
        0
    );
}

#[test]
fn run_interrupted_mid_cycle() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, false);
    let token = CancellationToken::new();
    let desktop = ScriptedDesktop::new()
        .with_frames(config.assistant.send_button_region(), quick_send(&config))
        .with_responses(&["Thinking..."])
        .with_cancel_on_copy(token.clone());
    let mut controller =
        QuestionCycleController::new(desktop, config.clone(), references(&config), token).unwrap();

    let summary = run_automation(&mut controller, None);
    assert_eq!(
        summary,
        RunSummary {
            completed: 0,
            outcome: RunOutcome::Interrupted
        }
    );
    assert_eq!(controller.state().question_count, 1);
    assert!(!controller
        .desktop()
        .clicks()
        .contains(&config.next_button.first));
}
