//! Tracks the most recently started analysis run
//!
//! Every run gets a fresh [`RunToken`]; starting a new run replaces the current token
//! atomically. Results produced under a token that is no longer current belong to a
//! superseded run and are dropped at the checkpoints in the pipeline. In-flight work is
//! never aborted, only discarded when it finishes.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Identity of one analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken(u64);

impl RunToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RunToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Holds at most one current run. `0` means "no run".
#[derive(Debug)]
pub struct RunSupervisor {
    next: AtomicU64,
    current: AtomicU64,
}

impl Default for RunSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSupervisor {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            current: AtomicU64::new(0),
        }
    }

    /// Issue a new token and make it current, superseding any earlier run
    pub fn begin(&self) -> RunToken {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        self.current.store(id, Ordering::SeqCst);
        RunToken(id)
    }

    pub fn is_current(&self, token: RunToken) -> bool {
        self.current.load(Ordering::SeqCst) == token.0
    }

    pub fn current(&self) -> Option<RunToken> {
        match self.current.load(Ordering::SeqCst) {
            0 => None,
            id => Some(RunToken(id)),
        }
    }

    /// Clear the current run; every outstanding token becomes stale
    pub fn reset(&self) {
        self.current.store(0, Ordering::SeqCst);
    }

    /// Pass `candidate` through only if `token` is still the current run
    pub fn checkpoint<T>(&self, token: RunToken, stage: &str, candidate: T) -> Option<T> {
        if self.is_current(token) {
            Some(candidate)
        } else {
            info!(
                run = %token,
                current = ?self.current().map(|t| t.to_string()),
                stage = stage,
                "Discarding result of superseded run"
            );
            None
        }
    }
}
