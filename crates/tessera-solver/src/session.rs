//! Per-attempt-series session state.
//!
//! One `Session` spans a whole series of challenge attempts on a page.
//! The retry counter is monotonic for the session's lifetime; the variant
//! flag and captured token are scoped to a single top-level solve and are
//! cleared again on every retry transition.

use crate::error::{Result, SolverError};
use crate::observer::ObserverEvent;
use std::time::Duration;
use tessera_core::{ChallengeToken, SolverConfig};

/// Mutable state of one challenge attempt series.
#[derive(Debug)]
pub struct Session {
    retry_count: u32,
    retry_limit: u32,
    dynamic: bool,
    token: Option<ChallengeToken>,
    click_interval: Option<Duration>,
}

impl Session {
    /// Create a session from solver settings.
    #[must_use]
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            retry_count: 0,
            retry_limit: config.retry_limit,
            dynamic: false,
            token: None,
            click_interval: config.click_interval_ms.map(Duration::from_millis),
        }
    }

    /// Clear the variant flag and captured token. Called at solve entry
    /// and on every retry transition; never mid-cycle.
    pub fn reset(&mut self) {
        self.dynamic = false;
        self.token = None;
    }

    /// Count a retry against the limit.
    ///
    /// # Errors
    /// Returns [`SolverError::RetryLimitExceeded`] once the configured
    /// limit is reached. The counter never silently absorbs the bound.
    pub fn note_retry(&mut self) -> Result<()> {
        self.retry_count += 1;
        if self.retry_count >= self.retry_limit {
            return Err(SolverError::RetryLimitExceeded {
                limit: self.retry_limit,
            });
        }
        Ok(())
    }

    /// Fold an observer event into the session.
    ///
    /// Variant hints are last-writer-wins; a token is write-once per
    /// session (held until the next [`reset`](Self::reset)). Tokens that
    /// fail validation are dropped.
    pub fn apply(&mut self, event: ObserverEvent) {
        match event {
            ObserverEvent::VariantHint { dynamic } => self.dynamic = dynamic,
            ObserverEvent::Token(raw) => {
                if self.token.is_some() {
                    return;
                }
                match ChallengeToken::new(raw) {
                    Ok(token) => self.token = Some(token),
                    Err(e) => tracing::debug!("ignoring unusable observed token: {}", e),
                }
            }
        }
    }

    /// Number of retries taken so far.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Whether the running challenge is the dynamic variant.
    #[must_use]
    pub fn dynamic(&self) -> bool {
        self.dynamic
    }

    /// The token captured from network traffic, if any.
    #[must_use]
    pub fn token(&self) -> Option<&ChallengeToken> {
        self.token.as_ref()
    }

    /// Configured pacing delay between tile clicks.
    #[must_use]
    pub fn click_interval(&self) -> Option<Duration> {
        self.click_interval
    }
}
