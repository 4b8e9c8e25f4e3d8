use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative whole-run stop signal.
///
/// Checked at the start of every cycle and before every polling iteration,
/// so a stop request takes effect within one polling interval plus the
/// duration of the desktop action in flight.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[test]
fn clones_share_state() {
    let token = CancellationToken::new();
    let handle = token.clone();
    assert!(!token.is_cancelled());
    handle.cancel();
    assert!(token.is_cancelled());
}
