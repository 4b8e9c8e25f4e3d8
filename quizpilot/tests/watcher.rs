mod common;

use {
    common::{solid, with_changed_pixels, ScriptedDesktop, BLUE, GRAY},
    quizpilot::{
        watcher::{RegionWatcher, WaitOutcome},
        CancellationToken, ScreenRegion,
    },
    std::time::Duration,
};

const REGION: ScreenRegion = ScreenRegion::new(100, 100, 10, 10);
const INTERVAL: Duration = Duration::from_millis(500);

#[test]
fn reference_match_above_threshold_is_immediate() {
    let reference = solid(10, 10, GRAY);
    let mut desktop =
        ScriptedDesktop::new().with_frames(REGION, vec![with_changed_pixels(&reference, 14)]);
    let token = CancellationToken::new();
    let watcher = RegionWatcher::new(REGION, INTERVAL, INTERVAL, &token);

    let outcome = watcher.wait_for_match(&mut desktop, &reference).unwrap();
    assert_eq!(
        outcome,
        WaitOutcome::Confirmed {
            elapsed: INTERVAL,
            checks: 1
        }
    );
}

#[test]
fn reference_match_below_threshold_times_out() {
    let reference = solid(10, 10, GRAY);
    let mut desktop =
        ScriptedDesktop::new().with_frames(REGION, vec![with_changed_pixels(&reference, 16)]);
    let token = CancellationToken::new();
    let watcher = RegionWatcher::new(REGION, INTERVAL, INTERVAL, &token);

    let outcome = watcher.wait_for_match(&mut desktop, &reference).unwrap();
    assert_eq!(
        outcome,
        WaitOutcome::TimedOut {
            elapsed: INTERVAL,
            checks: 1
        }
    );
}

#[test]
fn reference_match_with_other_shape_never_matches() {
    let reference = solid(10, 10, GRAY);
    let mut desktop = ScriptedDesktop::new().with_frames(REGION, vec![solid(10, 12, GRAY)]);
    let token = CancellationToken::new();
    let watcher = RegionWatcher::new(REGION, INTERVAL, Duration::from_secs(2), &token);

    let outcome = watcher.wait_for_match(&mut desktop, &reference).unwrap();
    assert!(!outcome.is_confirmed());
    assert_eq!(desktop.captures_of(REGION), 4);
}

#[test]
fn stable_on_third_consecutive_stable_check() {
    let changing = solid(10, 10, GRAY);
    let settled = solid(10, 10, BLUE);
    let mut desktop = ScriptedDesktop::new().with_frames(
        REGION,
        vec![
            changing,
            settled.clone(),
            settled.clone(),
            // Noise below 2% still counts as unchanged.
            with_changed_pixels(&settled, 1),
            with_changed_pixels(&settled, 1),
            solid(10, 10, GRAY),
        ],
    );
    let token = CancellationToken::new();
    let watcher = RegionWatcher::new(REGION, INTERVAL, Duration::from_secs(10), &token);

    let outcome = watcher.wait_for_stable(&mut desktop).unwrap();
    // Check 1 sees the change, checks 2-4 are stable.
    assert_eq!(
        outcome,
        WaitOutcome::Confirmed {
            elapsed: INTERVAL * 4,
            checks: 4
        }
    );
    assert_eq!(desktop.captures_of(REGION), 5);
}

#[test]
fn change_resets_stable_count() {
    let a = solid(10, 10, GRAY);
    let b = solid(10, 10, BLUE);
    let mut desktop = ScriptedDesktop::new().with_frames(
        REGION,
        vec![a.clone(), a.clone(), a, b.clone(), b.clone(), b.clone(), b],
    );
    let token = CancellationToken::new();
    let watcher = RegionWatcher::new(REGION, INTERVAL, Duration::from_secs(10), &token);

    let outcome = watcher.wait_for_stable(&mut desktop).unwrap();
    assert_eq!(
        outcome,
        WaitOutcome::Confirmed {
            elapsed: INTERVAL * 6,
            checks: 6
        }
    );
}

#[test]
fn never_stable_times_out() {
    let a = solid(10, 10, GRAY);
    let b = solid(10, 10, BLUE);
    let frames = (0..10)
        .map(|i| if i % 2 == 0 { a.clone() } else { b.clone() })
        .collect();
    let mut desktop = ScriptedDesktop::new().with_frames(REGION, frames);
    let token = CancellationToken::new();
    let watcher = RegionWatcher::new(REGION, INTERVAL, Duration::from_secs(2), &token);

    let outcome = watcher.wait_for_stable(&mut desktop).unwrap();
    assert_eq!(
        outcome,
        WaitOutcome::TimedOut {
            elapsed: Duration::from_secs(2),
            checks: 4
        }
    );
    assert_eq!(desktop.paused, Duration::from_secs(2));
}

#[test]
fn cancelled_token_stops_polling() {
    let reference = solid(10, 10, GRAY);
    let mut desktop = ScriptedDesktop::new();
    let token = CancellationToken::new();
    token.cancel();
    let watcher = RegionWatcher::new(REGION, INTERVAL, Duration::from_secs(10), &token);

    assert_eq!(
        watcher.wait_for_match(&mut desktop, &reference).unwrap(),
        WaitOutcome::Cancelled
    );
    assert_eq!(desktop.captures_of(REGION), 0);
    assert_eq!(desktop.paused, Duration::ZERO);
}
