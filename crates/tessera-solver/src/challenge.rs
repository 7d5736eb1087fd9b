//! The challenge resolution state machine.
//!
//! Drives the full interaction sequence against a tile challenge: open the
//! checkbox, wait for the challenge surface, read the prompt, let the grid
//! stabilize, click what the classifier reports, submit, and recover the
//! success token from either the page's response accessors or the network
//! observer. Failed cycles are restarted up to the configured retry limit.
//!
//! The original recursive retry shape is flattened into an explicit loop:
//! every restart passes through [`Session::note_retry`], so the bound can
//! never be bypassed by a deep call chain.

use crate::error::{Result, SolverError};
use crate::observer::ObserverEvent;
use crate::session::Session;
use crate::tiles::{run_detection, TilePass};
use crate::NetworkObserver;
use std::sync::Arc;
use std::time::Duration;
use tessera_browser::{FrameHandle, PageHandle};
use tessera_core::{ChallengeOutcome, ChallengeToken, GridSize, SolverConfig};
use tessera_detector::TileClassifier;
use tokio::sync::mpsc::UnboundedReceiver;

/// Iframe hosting the tile grid and prompt.
const CHALLENGE_FRAME_SELECTOR: &str = "iframe[src*='bframe']";
/// Iframe hosting the initial checkbox.
const ANCHOR_FRAME_SELECTOR: &str = "iframe[title='reCAPTCHA']";
/// Checkbox control inside the anchor frame.
const CHECKBOX_SELECTOR: &str = ".recaptcha-checkbox-border";
/// Prompt label inside the challenge frame.
const PROMPT_SELECTOR: &str = "strong";
/// One grid tile.
const TILE_SELECTOR: &str = "[class='rc-imageselect-tile']";
/// Submit control.
const VERIFY_BUTTON_SELECTOR: &str = "#recaptcha-verify-button";
/// Reload control for cycle restarts.
const RELOAD_BUTTON_SELECTOR: &str = "#recaptcha-reload-button";

/// In-page accessors for the provider-exposed response token.
const RESPONSE_ACCESSORS: [&str; 2] = [
    "grecaptcha.getResponse()",
    "grecaptcha.enterprise.getResponse()",
];

// Fixed wait bounds. Only the retry limit and the inter-click pacing delay
// are caller-configurable.
const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(10);
const CHECKBOX_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_DELAY: Duration = Duration::from_secs(2);
const GRID_POLL_ATTEMPTS: usize = 10;
const GRID_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DYNAMIC_POLL_DELAY: Duration = Duration::from_secs(5);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);
const TOKEN_POLL_ATTEMPTS: usize = 5;
const TOKEN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How one cycle concluded, as seen by the outer solve loop.
enum CycleOutcome {
    /// A token was recovered
    Solved(ChallengeToken),
    /// Structural absence: the challenge never rendered and retrying
    /// cannot fix that
    Abandoned,
    /// Transient miss: restart the whole cycle, counting against the
    /// retry limit
    Retry,
}

/// Challenge resolution state machine.
///
/// Borrows the page for the lifetime of the solver; acquires no resources
/// of its own. One instance covers one attempt series - [`solve`](Self::solve)
/// may be called repeatedly and every call starts from clean per-solve state.
pub struct ChallengeSolver {
    page: Arc<dyn PageHandle>,
    classifier: Arc<dyn TileClassifier>,
    session: Session,
    events: UnboundedReceiver<ObserverEvent>,
}

impl ChallengeSolver {
    /// Create a solver draining observer events from `events`.
    #[must_use]
    pub fn new(
        page: Arc<dyn PageHandle>,
        classifier: Arc<dyn TileClassifier>,
        config: &SolverConfig,
        events: UnboundedReceiver<ObserverEvent>,
    ) -> Self {
        Self {
            page,
            classifier,
            session: Session::new(config),
            events,
        }
    }

    /// Create a solver together with the [`NetworkObserver`] to wire into
    /// the page's response stream.
    #[must_use]
    pub fn with_observer(
        page: Arc<dyn PageHandle>,
        classifier: Arc<dyn TileClassifier>,
        config: &SolverConfig,
    ) -> (Self, NetworkObserver) {
        let (observer, events) = NetworkObserver::channel();
        (Self::new(page, classifier, config, events), observer)
    }

    /// Number of cycle retries taken so far in this attempt series.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.session.retry_count()
    }

    /// Resolve the challenge on the page.
    ///
    /// Returns the recovered token, or [`ChallengeOutcome::Unsolved`] when
    /// the challenge never rendered.
    ///
    /// # Errors
    /// Returns [`SolverError::RetryLimitExceeded`] once the configured
    /// number of cycle restarts is exhausted; callers must treat that as
    /// an abort.
    pub async fn solve(&mut self) -> Result<ChallengeOutcome> {
        // Fresh per-solve state: a token captured during a previous solve
        // must not leak into this one.
        self.discard_pending_events();
        self.session.reset();

        // Best-effort: some challenges auto-expand without a checkbox.
        self.click_checkbox().await;

        if !self.challenge_visible().await {
            tracing::error!("challenge is not visible");
            return Ok(ChallengeOutcome::Unsolved);
        }

        // Let the grid render before the first read.
        tokio::time::sleep(SETTLE_DELAY).await;

        loop {
            match self.run_cycle().await? {
                CycleOutcome::Solved(token) => return Ok(ChallengeOutcome::Solved(token)),
                CycleOutcome::Abandoned => return Ok(ChallengeOutcome::Unsolved),
                CycleOutcome::Retry => {
                    self.session.note_retry()?;
                    self.discard_pending_events();
                    self.session.reset();
                    self.click_reload().await?;
                }
            }
        }
    }

    /// One full detection/verification cycle.
    async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let frame = match self.page.frame(CHALLENGE_FRAME_SELECTOR).await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("challenge frame lookup failed: {}", e);
                return self.conclude_without_prompt().await;
            }
        };

        if frame
            .wait_visible(PROMPT_SELECTOR, VISIBILITY_TIMEOUT)
            .await
            .is_err()
        {
            return self.conclude_without_prompt().await;
        }

        let prompt = match frame.text_content(PROMPT_SELECTOR).await {
            Ok(Some(prompt)) if !prompt.is_empty() => prompt,
            Ok(_) => {
                return Err(SolverError::InvalidState(
                    "challenge prompt did not load".to_string(),
                ))
            }
            Err(e) => {
                tracing::debug!("prompt read failed: {}", e);
                return self.conclude_without_prompt().await;
            }
        };
        tracing::info!("challenge prompt: '{}'", prompt);

        let grid = self.await_grid(frame.as_ref()).await;
        let area = grid.is_area();

        // Initial pass. Area grids start directly in verify semantics.
        let mut pass = run_detection(
            self.page.as_ref(),
            self.classifier.as_ref(),
            &prompt,
            area,
            area,
            self.session.click_interval(),
        )
        .await?;

        if pass == TilePass::RetryCycle {
            return Ok(CycleOutcome::Retry);
        }

        // Dynamic variants replace clicked tiles with fresh ones; keep
        // re-running verify passes until one reports progress. No iteration
        // cap of its own: only detector convergence or a captured token
        // ends this loop.
        self.drain_events();
        if self.session.dynamic() && !area {
            loop {
                if self.session.token().is_some() {
                    break;
                }
                tokio::time::sleep(DYNAMIC_POLL_DELAY).await;
                pass = run_detection(
                    self.page.as_ref(),
                    self.classifier.as_ref(),
                    &prompt,
                    area,
                    true,
                    self.session.click_interval(),
                )
                .await?;
                self.drain_events();
                if pass != TilePass::NotYet {
                    break;
                }
            }
        }

        // A token captured during detection makes submission redundant.
        if let Some(token) = self.session.token() {
            return Ok(CycleOutcome::Solved(token.clone()));
        }

        self.submit(frame.as_ref()).await;

        for _ in 0..TOKEN_POLL_ATTEMPTS {
            self.drain_events();
            if let Some(token) = self.session.token() {
                return Ok(CycleOutcome::Solved(token.clone()));
            }
            if let Some(token) = self.check_result().await {
                return Ok(CycleOutcome::Solved(token));
            }
            tokio::time::sleep(TOKEN_POLL_INTERVAL).await;
        }

        Ok(CycleOutcome::Retry)
    }

    /// Poll the grid until it reaches a valid tile count, then classify it.
    /// Works off the last-seen count if the grid never stabilizes.
    async fn await_grid(&self, frame: &dyn FrameHandle) -> GridSize {
        let mut count = frame.count(TILE_SELECTOR).await.unwrap_or(0);
        for _ in 0..GRID_POLL_ATTEMPTS {
            if count == 9 || count == 16 {
                break;
            }
            tokio::time::sleep(GRID_POLL_INTERVAL).await;
            count = frame.count(TILE_SELECTOR).await.unwrap_or(0);
        }
        GridSize::from_tile_count(count)
    }

    /// The prompt never resolved. A token may nonetheless exist already;
    /// otherwise this is a structural absence and is not retried.
    async fn conclude_without_prompt(&mut self) -> Result<CycleOutcome> {
        self.drain_events();
        if let Some(token) = self.session.token() {
            return Ok(CycleOutcome::Solved(token.clone()));
        }
        if let Some(token) = self.check_result().await {
            return Ok(CycleOutcome::Solved(token));
        }
        tracing::error!("challenge frame did not load");
        Ok(CycleOutcome::Abandoned)
    }

    /// Click the verify control. A timeout with the challenge still on
    /// screen is only a warning: the token may still arrive on the wire.
    async fn submit(&self, frame: &dyn FrameHandle) {
        if let Err(e) = frame.click(VERIFY_BUTTON_SELECTOR, SUBMIT_TIMEOUT).await {
            if e.is_timeout() && self.challenge_visible().await {
                tracing::warn!("could not submit challenge; verify control did not respond");
            } else {
                tracing::debug!("submit click failed: {}", e);
            }
        }
    }

    /// Click the reload control ahead of a cycle restart.
    async fn click_reload(&self) -> Result<()> {
        tracing::info!("reloading challenge and retrying");
        let frame = self.page.frame(CHALLENGE_FRAME_SELECTOR).await?;
        frame.click(RELOAD_BUTTON_SELECTOR, SUBMIT_TIMEOUT).await?;
        Ok(())
    }

    /// Read the provider-exposed response token from the page, trying the
    /// standard accessor first and the enterprise one second. Evaluation
    /// failures and empty values both count as "no token yet".
    async fn check_result(&self) -> Option<ChallengeToken> {
        for accessor in RESPONSE_ACCESSORS {
            if let Ok(value) = self.page.evaluate(accessor).await {
                if let Some(raw) = value.as_str() {
                    if let Ok(token) = ChallengeToken::new(raw) {
                        return Some(token);
                    }
                }
            }
        }
        None
    }

    /// Whether the challenge surface is currently visible.
    async fn challenge_visible(&self) -> bool {
        match self.page.frame(CHALLENGE_FRAME_SELECTOR).await {
            Ok(frame) => frame
                .wait_visible(PROMPT_SELECTOR, VISIBILITY_TIMEOUT)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Best-effort checkbox click; absence is not fatal.
    async fn click_checkbox(&self) {
        match self.page.frame(ANCHOR_FRAME_SELECTOR).await {
            Ok(frame) => {
                if frame.click(CHECKBOX_SELECTOR, CHECKBOX_TIMEOUT).await.is_err() {
                    tracing::debug!("checkbox not clickable; challenge may auto-expand");
                }
            }
            Err(_) => tracing::debug!("anchor frame not present"),
        }
    }

    /// Fold all pending observer events into the session.
    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.session.apply(event);
        }
    }

    /// Throw away observations from before the current solve/retry scope.
    fn discard_pending_events(&mut self) {
        while self.events.try_recv().is_ok() {}
    }
}
