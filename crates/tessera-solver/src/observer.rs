//! Passive network observer for challenge provider traffic.
//!
//! The provider's verification endpoint sometimes issues the success token
//! only on the wire, without ever exposing it to the page. The observer
//! watches reload/verification responses, learns whether the running
//! challenge is the dynamic variant, and recovers tokens directly from
//! verification bodies. It runs as a background callback and therefore
//! never raises: everything it cannot parse is logged and dropped.

use regex::Regex;
use std::sync::OnceLock;
use tessera_browser::{extract_domain, ResponseEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Hosts the challenge provider serves from. Subdomains count.
const PROVIDER_HOSTS: [&str; 2] = ["google.com", "recaptcha.net"];

/// URL marker of a grid reload request.
const RELOAD_MARKER: &str = "reload";

/// URL marker of a verification request.
const VERIFY_MARKER: &str = "userverify";

/// Body markers meaning the challenge continues; their absence from a
/// verification response marks it as a success response.
const CONTINUATION_MARKERS: [&str; 2] = ["rresp", "bgdata"];

/// Body marker of the dynamic challenge variant.
const DYNAMIC_MARKER: &str = "dynamic";

fn token_pattern() -> &'static Regex {
    static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
    TOKEN_REGEX.get_or_init(|| {
        Regex::new(r#""uvresp"\s*,\s*"([^"]+)""#).expect("valid regex")
    })
}

/// Observation posted by the observer for the state machine to drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    /// The most recent reload/verification response said whether the
    /// challenge is the dynamic variant. Last hint wins.
    VariantHint {
        /// True when the response body carries the dynamic marker
        dynamic: bool,
    },

    /// A success token recovered from a verification response body.
    Token(String),
}

/// Whether a URL belongs to the challenge provider's reload/verification
/// traffic. Everything else is ignored by the observer.
#[must_use]
pub fn is_challenge_request(url: &str) -> bool {
    let Ok(host) = extract_domain(url) else {
        return false;
    };
    let provider = PROVIDER_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")));
    provider && (url.contains(RELOAD_MARKER) || url.contains(VERIFY_MARKER))
}

/// Extract the success token from a verification response body.
///
/// Returns `None` and logs at debug level when the body looked like a
/// success response but the token field was absent.
#[must_use]
pub fn extract_token(body: &str) -> Option<String> {
    match token_pattern().captures(body) {
        Some(caps) => Some(caps[1].to_string()),
        None => {
            tracing::debug!("verification response looked successful but carried no token");
            None
        }
    }
}

/// Observer half of the network-event channel.
///
/// Feed it observed responses via [`handle_response`](Self::handle_response)
/// (or wire a page's response stream with [`run`](Self::run)); the state
/// machine drains the paired receiver at its poll points.
#[derive(Debug, Clone)]
pub struct NetworkObserver {
    tx: UnboundedSender<ObserverEvent>,
}

impl NetworkObserver {
    /// Create an observer together with the receiver the state machine
    /// will drain.
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<ObserverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Process one observed response. Infallible and non-blocking.
    pub fn handle_response(&self, url: &str, body: &str) {
        if !is_challenge_request(url) {
            return;
        }

        // Reflects the most recent reload, not history.
        let _ = self.tx.send(ObserverEvent::VariantHint {
            dynamic: body.contains(DYNAMIC_MARKER),
        });

        if url.contains(VERIFY_MARKER)
            && !CONTINUATION_MARKERS.iter().any(|m| body.contains(m))
        {
            if let Some(token) = extract_token(body) {
                tracing::debug!("recovered success token from verification response");
                let _ = self.tx.send(ObserverEvent::Token(token));
            }
        }
    }

    /// Drain a page's response stream into this observer as a background
    /// task. The task ends when the stream closes.
    #[must_use]
    pub fn run(self, mut responses: UnboundedReceiver<ResponseEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = responses.recv().await {
                self.handle_response(&event.url, &event.body);
            }
        })
    }
}
