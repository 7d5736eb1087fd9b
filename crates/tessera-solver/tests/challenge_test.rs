//! Scenario tests for the challenge state machine.
//!
//! All collaborators are scripted behind the page/classifier seams and the
//! tokio clock is paused, so every timed wait in the solver elapses
//! instantly and deterministically.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tessera_browser::{BrowserError, FrameHandle, PageHandle};
use tessera_core::{ChallengeOutcome, ChallengeToken, SolverConfig};
use tessera_detector::{Detection, TileClassifier};
use tessera_solver::{ChallengeSolver, SolverError};

const VERIFY_URL: &str = "https://www.google.com/recaptcha/api2/userverify?k=xyz";
const RELOAD_URL: &str = "https://www.google.com/recaptcha/api2/reload?k=xyz";

const VERIFY_BUTTON: &str = "#recaptcha-verify-button";
const RELOAD_BUTTON: &str = "#recaptcha-reload-button";

fn config(retry_limit: u32) -> SolverConfig {
    SolverConfig {
        retry_limit,
        click_interval_ms: None,
    }
}

fn success_body(token: &str) -> String {
    format!(r#"["uvresp","{token}",null,120]"#)
}

/// Pop the next scripted value; the last entry repeats forever.
fn scripted<T: Copy>(queue: &mut VecDeque<T>, default: T) -> T {
    match queue.len() {
        0 => default,
        1 => *queue.front().expect("non-empty"),
        _ => queue.pop_front().expect("non-empty"),
    }
}

#[derive(Default)]
struct FrameState {
    prompt: Option<String>,
    /// Scripted results for prompt-visibility waits
    visible: VecDeque<bool>,
    /// Scripted tile counts
    tile_counts: VecDeque<usize>,
    /// Selectors clicked inside the frame, in order
    clicks: Vec<String>,
    submit_fails: bool,
}

struct MockFrame(Arc<Mutex<FrameState>>);

#[async_trait]
impl FrameHandle for MockFrame {
    async fn wait_visible(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> tessera_browser::Result<()> {
        let visible = scripted(&mut self.0.lock().unwrap().visible, true);
        if visible {
            Ok(())
        } else {
            Err(BrowserError::Timeout(selector.to_string()))
        }
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> tessera_browser::Result<()> {
        let mut state = self.0.lock().unwrap();
        state.clicks.push(selector.to_string());
        if selector == VERIFY_BUTTON && state.submit_fails {
            return Err(BrowserError::Timeout(selector.to_string()));
        }
        Ok(())
    }

    async fn text_content(&self, _selector: &str) -> tessera_browser::Result<Option<String>> {
        Ok(self.0.lock().unwrap().prompt.clone())
    }

    async fn count(&self, _selector: &str) -> tessera_browser::Result<usize> {
        Ok(scripted(&mut self.0.lock().unwrap().tile_counts, 9))
    }
}

struct PageState {
    frame: Option<Arc<Mutex<FrameState>>>,
    /// Token returned by the in-page response accessors, if any
    eval_token: Option<String>,
    point_clicks: Vec<(f64, f64)>,
}

struct MockPage(Arc<Mutex<PageState>>);

#[async_trait]
impl PageHandle for MockPage {
    async fn frame(&self, selector: &str) -> tessera_browser::Result<Box<dyn FrameHandle>> {
        match &self.0.lock().unwrap().frame {
            Some(frame) => Ok(Box::new(MockFrame(frame.clone()))),
            None => Err(BrowserError::FrameNotFound(selector.to_string())),
        }
    }

    async fn evaluate(&self, expression: &str) -> tessera_browser::Result<serde_json::Value> {
        if expression.starts_with("grecaptcha") {
            match &self.0.lock().unwrap().eval_token {
                Some(token) => Ok(serde_json::Value::String(token.clone())),
                None => Err(BrowserError::Evaluation(
                    "grecaptcha is not defined".to_string(),
                )),
            }
        } else {
            Ok(serde_json::Value::Null)
        }
    }

    async fn screenshot(&self) -> tessera_browser::Result<Vec<u8>> {
        Ok(vec![0u8; 32])
    }

    async fn click_point(&self, x: f64, y: f64) -> tessera_browser::Result<()> {
        self.0.lock().unwrap().point_clicks.push((x, y));
        Ok(())
    }
}

#[derive(Default)]
struct ClassifierState {
    script: VecDeque<Detection>,
    calls: usize,
    area_flags: Vec<bool>,
}

struct MockClassifier(Arc<Mutex<ClassifierState>>);

#[async_trait]
impl TileClassifier for MockClassifier {
    async fn detect(
        &self,
        _prompt: &str,
        _image: &[u8],
        area_grid: bool,
    ) -> tessera_detector::Result<Detection> {
        let mut state = self.0.lock().unwrap();
        state.calls += 1;
        state.area_flags.push(area_grid);
        let detection = match state.script.len() {
            0 => Detection::empty(),
            1 => state.script.front().expect("non-empty").clone(),
            _ => state.script.pop_front().expect("non-empty"),
        };
        Ok(detection)
    }
}

fn matches_at(coords: &[(f64, f64)]) -> Detection {
    Detection {
        matches: vec![true; coords.len()],
        coordinates: coords.to_vec(),
    }
}

struct Harness {
    frame: Arc<Mutex<FrameState>>,
    page: Arc<Mutex<PageState>>,
    classifier: Arc<Mutex<ClassifierState>>,
}

impl Harness {
    fn new(prompt: &str) -> Self {
        let frame = Arc::new(Mutex::new(FrameState {
            prompt: Some(prompt.to_string()),
            ..FrameState::default()
        }));
        let page = Arc::new(Mutex::new(PageState {
            frame: Some(frame.clone()),
            eval_token: None,
            point_clicks: Vec::new(),
        }));
        Self {
            frame,
            page,
            classifier: Arc::new(Mutex::new(ClassifierState::default())),
        }
    }

    fn solver(&self, config: &SolverConfig) -> (ChallengeSolver, tessera_solver::NetworkObserver) {
        ChallengeSolver::with_observer(
            Arc::new(MockPage(self.page.clone())),
            Arc::new(MockClassifier(self.classifier.clone())),
            config,
        )
    }

    fn frame_clicks(&self, selector: &str) -> usize {
        self.frame
            .lock()
            .unwrap()
            .clicks
            .iter()
            .filter(|c| c.as_str() == selector)
            .count()
    }
}

// Standard 9-tile grid, three detected tiles, token arrives over the
// network shortly after submission.
#[tokio::test(start_paused = true)]
async fn solves_standard_grid_with_network_token() {
    let harness = Harness::new("bicycles");
    harness
        .classifier
        .lock()
        .unwrap()
        .script
        .push_back(matches_at(&[(10.0, 20.0), (30.0, 40.0), (50.0, 60.0)]));

    let (mut solver, observer) = harness.solver(&config(15));
    let task = tokio::spawn(async move {
        let outcome = solver.solve().await;
        (outcome, solver)
    });

    // Challenge settles at t=2s and submits immediately; the verification
    // response lands between the second and third token polls.
    tokio::time::sleep(Duration::from_millis(3500)).await;
    observer.handle_response(VERIFY_URL, &success_body("net-token"));

    let (outcome, solver) = task.await.expect("solver task");
    assert_eq!(
        outcome.expect("solve"),
        ChallengeOutcome::Solved(ChallengeToken::new("net-token").expect("token"))
    );
    assert_eq!(solver.retries(), 0);
    assert_eq!(harness.page.lock().unwrap().point_clicks.len(), 3);
    assert_eq!(harness.frame_clicks(VERIFY_BUTTON), 1);
}

// Dynamic variant: after the initial click pass, verify passes keep
// reporting "not yet passed" and the loop keeps polling without ever
// restarting the outer cycle; it exits once a pass reports progress.
#[tokio::test(start_paused = true)]
async fn dynamic_variant_polls_until_detector_converges() {
    let harness = Harness::new("fire hydrants");
    {
        let mut classifier = harness.classifier.lock().unwrap();
        classifier.script.push_back(matches_at(&[(10.0, 10.0)]));
        classifier.script.push_back(Detection::empty());
        classifier.script.push_back(Detection::empty());
        classifier.script.push_back(Detection::empty());
        classifier.script.push_back(matches_at(&[(70.0, 80.0)]));
    }
    harness.page.lock().unwrap().eval_token = Some("page-token".to_string());

    let (mut solver, observer) = harness.solver(&config(15));
    let task = tokio::spawn(async move {
        let outcome = solver.solve().await;
        (outcome, solver)
    });

    // Reload response marks the challenge dynamic while the grid settles.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    observer.handle_response(RELOAD_URL, r#"["rresp","dynamic",["data"]]"#);

    let (outcome, solver) = task.await.expect("solver task");
    assert_eq!(
        outcome.expect("solve"),
        ChallengeOutcome::Solved(ChallengeToken::new("page-token").expect("token"))
    );
    assert_eq!(solver.retries(), 0);
    assert_eq!(harness.classifier.lock().unwrap().calls, 5);
    assert_eq!(harness.frame_clicks(RELOAD_BUTTON), 0);
}

// Dynamic variant where the detector never converges: a verification
// token arriving over the network ends the loop directly, with no
// submit click and no retry.
#[tokio::test(start_paused = true)]
async fn dynamic_loop_short_circuits_on_network_token() {
    let harness = Harness::new("boats");
    {
        let mut classifier = harness.classifier.lock().unwrap();
        classifier.script.push_back(matches_at(&[(10.0, 10.0)]));
        // Repeats forever: every verify pass reports "not yet passed"
        classifier.script.push_back(Detection::empty());
    }

    let (mut solver, observer) = harness.solver(&config(15));
    let task = tokio::spawn(async move {
        let outcome = solver.solve().await;
        (outcome, solver)
    });

    // Reload response marks the challenge dynamic while the grid settles;
    // the success response lands between the first and second verify pass.
    tokio::time::sleep(Duration::from_millis(1000)).await;
    observer.handle_response(RELOAD_URL, r#"["rresp","dynamic",["data"]]"#);
    tokio::time::sleep(Duration::from_millis(8000)).await;
    observer.handle_response(VERIFY_URL, &success_body("mid-loop-token"));

    let (outcome, solver) = task.await.expect("solver task");
    assert_eq!(
        outcome.expect("solve"),
        ChallengeOutcome::Solved(ChallengeToken::new("mid-loop-token").expect("token"))
    );
    assert_eq!(solver.retries(), 0);
    // The token made submission redundant
    assert_eq!(harness.frame_clicks(VERIFY_BUTTON), 0);
    assert_eq!(harness.classifier.lock().unwrap().calls, 3);
}

// Zero matches on a non-verify pass: one full retry, with the reload
// control clicked before the cycle restarts.
#[tokio::test(start_paused = true)]
async fn empty_detection_triggers_reload_and_retry() {
    let harness = Harness::new("crosswalks");
    {
        let mut classifier = harness.classifier.lock().unwrap();
        classifier.script.push_back(Detection::empty());
        classifier.script.push_back(matches_at(&[(5.0, 5.0)]));
    }
    harness.page.lock().unwrap().eval_token = Some("tok-c".to_string());

    let (mut solver, _observer) = harness.solver(&config(15));
    let outcome = solver.solve().await.expect("solve");

    assert_eq!(
        outcome,
        ChallengeOutcome::Solved(ChallengeToken::new("tok-c").expect("token"))
    );
    assert_eq!(solver.retries(), 1);
    assert_eq!(harness.frame_clicks(RELOAD_BUTTON), 1);
    // The verify control plays no part in the restart; its single click
    // is the second cycle's submission
    assert_eq!(harness.frame_clicks(VERIFY_BUTTON), 1);
}

// The challenge label never becomes visible and no token exists anywhere:
// structural absence, reported as unsolved without any retry.
#[tokio::test(start_paused = true)]
async fn invisible_challenge_is_unsolved() {
    let harness = Harness::new("bridges");
    harness.frame.lock().unwrap().visible.push_back(false);

    let (mut solver, _observer) = harness.solver(&config(15));
    let outcome = solver.solve().await.expect("solve");

    assert_eq!(outcome, ChallengeOutcome::Unsolved);
    assert_eq!(solver.retries(), 0);
    assert_eq!(harness.classifier.lock().unwrap().calls, 0);
}

// The frame is gone by the time the cycle looks for it; the structural
// check still honors a token that already surfaced via the page API.
#[tokio::test(start_paused = true)]
async fn vanished_frame_still_yields_available_token() {
    let harness = Harness::new("stairs");
    {
        let mut frame = harness.frame.lock().unwrap();
        frame.visible.push_back(true); // visibility check at solve entry
        frame.visible.push_back(false); // prompt wait inside the cycle
    }
    harness.page.lock().unwrap().eval_token = Some("late-token".to_string());

    let (mut solver, _observer) = harness.solver(&config(15));
    let outcome = solver.solve().await.expect("solve");

    assert_eq!(
        outcome,
        ChallengeOutcome::Solved(ChallengeToken::new("late-token").expect("token"))
    );
    assert_eq!(harness.classifier.lock().unwrap().calls, 0);
}

// Retry limit of 1: the first failed cycle exhausts the budget and the
// fatal error surfaces instead of another attempt.
#[tokio::test(start_paused = true)]
async fn retry_limit_exhaustion_is_fatal() {
    let harness = Harness::new("traffic lights");
    // Classifier never finds anything; script stays empty.

    let (mut solver, _observer) = harness.solver(&config(1));
    let err = solver.solve().await.expect_err("must exhaust retries");

    assert!(matches!(err, SolverError::RetryLimitExceeded { limit: 1 }));
    // The budget ran out before the reload control was touched
    assert_eq!(harness.frame_clicks(RELOAD_BUTTON), 0);
}

// 16-tile grid: verify semantics from the first pass, so an empty
// detection submits instead of restarting the cycle.
#[tokio::test(start_paused = true)]
async fn area_grid_uses_verify_semantics_from_first_pass() {
    let harness = Harness::new("motorcycles");
    harness.frame.lock().unwrap().tile_counts.push_back(16);

    let (mut solver, _observer) = harness.solver(&config(1));
    let err = solver.solve().await.expect_err("no token anywhere");

    assert!(matches!(err, SolverError::RetryLimitExceeded { limit: 1 }));
    // Empty verify detection went on to submit rather than reload
    assert_eq!(harness.frame_clicks(VERIFY_BUTTON), 1);
    assert_eq!(harness.frame_clicks(RELOAD_BUTTON), 0);
    assert_eq!(harness.classifier.lock().unwrap().area_flags, vec![true]);
}

// A grid that never stabilizes to 9 or 16 tiles is classified off the
// last-seen count after the polls run out.
#[tokio::test(start_paused = true)]
async fn unstable_grid_falls_back_to_standard_variant() {
    let harness = Harness::new("chimneys");
    harness.frame.lock().unwrap().tile_counts.push_back(7);
    harness
        .classifier
        .lock()
        .unwrap()
        .script
        .push_back(matches_at(&[(9.0, 9.0)]));
    harness.page.lock().unwrap().eval_token = Some("tok-u".to_string());

    let (mut solver, _observer) = harness.solver(&config(15));
    let outcome = solver.solve().await.expect("solve");

    assert!(outcome.is_solved());
    assert_eq!(harness.classifier.lock().unwrap().area_flags, vec![false]);
}

// A resolved frame with an empty prompt is an invalid state, not a retry.
#[tokio::test(start_paused = true)]
async fn empty_prompt_is_invalid_state() {
    let harness = Harness::new("");
    let (mut solver, _observer) = harness.solver(&config(15));
    let err = solver.solve().await.expect_err("empty prompt");
    assert!(matches!(err, SolverError::InvalidState(_)));
}

// A submit click timeout with the challenge still visible is only a
// warning; the token can still arrive through the observer.
#[tokio::test(start_paused = true)]
async fn failed_submit_still_recovers_network_token() {
    let harness = Harness::new("buses");
    harness.frame.lock().unwrap().submit_fails = true;
    harness
        .classifier
        .lock()
        .unwrap()
        .script
        .push_back(matches_at(&[(1.0, 1.0)]));

    let (mut solver, observer) = harness.solver(&config(15));
    let task = tokio::spawn(async move {
        let outcome = solver.solve().await;
        (outcome, solver)
    });

    tokio::time::sleep(Duration::from_millis(3500)).await;
    observer.handle_response(VERIFY_URL, &success_body("wire-token"));

    let (outcome, _solver) = task.await.expect("solver task");
    assert_eq!(
        outcome.expect("solve"),
        ChallengeOutcome::Solved(ChallengeToken::new("wire-token").expect("token"))
    );
}

// A second solve on the same session is a fresh attempt: a token left
// over from earlier traffic must not satisfy it.
#[tokio::test(start_paused = true)]
async fn second_solve_ignores_stale_token() {
    let harness = Harness::new("palm trees");
    harness
        .classifier
        .lock()
        .unwrap()
        .script
        .push_back(matches_at(&[(2.0, 2.0)]));
    harness.page.lock().unwrap().eval_token = Some("first-token".to_string());

    let (mut solver, observer) = harness.solver(&config(1));
    let outcome = solver.solve().await.expect("first solve");
    assert_eq!(
        outcome,
        ChallengeOutcome::Solved(ChallengeToken::new("first-token").expect("token"))
    );

    // Stale observation from the first attempt's traffic
    observer.handle_response(VERIFY_URL, &success_body("stale-token"));
    harness.page.lock().unwrap().eval_token = None;
    harness.classifier.lock().unwrap().script.clear();

    let err = solver.solve().await.expect_err("independent attempt");
    assert!(matches!(err, SolverError::RetryLimitExceeded { limit: 1 }));
}
