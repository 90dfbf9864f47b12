//! Background-work guard: keeps the host process alive while file work is
//! in flight.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Opaque handle returned by [`BackgroundWork::begin`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct WorkToken(u64);

impl WorkToken {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host hook bracketing every asynchronous operation. Called from any
/// thread, with overlapping tokens from concurrent operations.
pub trait BackgroundWork: Send + Sync {
    fn begin(&self) -> WorkToken;

    fn end(&self, token: WorkToken);
}

/// For hosts that are never suspended.
#[derive(Debug, Default)]
pub struct NoBackgroundWork;

impl BackgroundWork for NoBackgroundWork {
    fn begin(&self) -> WorkToken {
        WorkToken(0)
    }

    fn end(&self, _token: WorkToken) {}
}

/// Counts outstanding tokens so a host can wait for quiescence.
#[derive(Debug, Default)]
pub struct TrackedWork {
    next: AtomicU64,
    active: Mutex<HashSet<u64>>,
    idle: Condvar,
}

impl TrackedWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Blocks until no token is outstanding. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        while !active.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            active = match self.idle.wait_timeout(active, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

impl BackgroundWork for TrackedWork {
    fn begin(&self) -> WorkToken {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id);
        WorkToken(id)
    }

    fn end(&self, token: WorkToken) {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        active.remove(&token.0);
        if active.is_empty() {
            self.idle.notify_all();
        }
    }
}

/// Ends its token when dropped.
pub(crate) struct GuardSpan {
    work: Arc<dyn BackgroundWork>,
    token: Option<WorkToken>,
}

impl GuardSpan {
    pub(crate) fn begin(work: Arc<dyn BackgroundWork>) -> Self {
        let token = work.begin();
        Self {
            work,
            token: Some(token),
        }
    }
}

impl Drop for GuardSpan {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.work.end(token);
        }
    }
}
