//! Fixed-window login throttle (scenario 6, error kind `Throttled`).
//!
//! Deliberately not a general-purpose rate-limiting middleware — that
//! would be a reusable layer sitting in front of every route, whereas this
//! is a specific per-identity login-attempt counter owned by the login
//! handler itself.

use std::time::{Duration, Instant};

use dashmap::DashMap;

const WINDOW: Duration = Duration::from_secs(60);
const MAX_FAILURES: u32 = 6;

struct Window {
    failures: u32,
    started_at: Instant,
}

/// Counts failed login attempts per identity (email) in a 60 s fixed
/// window. Not shared across identities, so one user's lockout never
/// affects another's.
#[derive(Default)]
pub struct LoginThrottle {
    windows: DashMap<String, Window>,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `identity` has already exceeded the attempt
    /// budget for the current window and must be refused before the
    /// password is even checked.
    pub fn is_throttled(&self, identity: &str) -> bool {
        match self.windows.get(identity) {
            Some(window) if window.started_at.elapsed() < WINDOW => window.failures >= MAX_FAILURES,
            _ => false,
        }
    }

    /// Records one failed attempt, resetting the window if the previous
    /// one has expired.
    pub fn record_failure(&self, identity: &str) {
        let mut entry = self.windows.entry(identity.to_string()).or_insert_with(|| Window {
            failures: 0,
            started_at: Instant::now(),
        });
        if entry.started_at.elapsed() >= WINDOW {
            entry.failures = 0;
            entry.started_at = Instant::now();
        }
        entry.failures += 1;
    }

    /// Clears the window on a successful login, so a user who just mistyped
    /// their password a few times isn't left with a partially-spent budget.
    pub fn record_success(&self, identity: &str) {
        self.windows.remove(identity);
    }
}
