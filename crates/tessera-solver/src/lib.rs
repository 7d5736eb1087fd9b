//! Tessera Solver - the challenge resolution state machine.
//!
//! This crate coordinates everything with real decision logic: the
//! [`ChallengeSolver`] drives UI interaction cycles against a tile
//! challenge while the [`NetworkObserver`] concurrently watches provider
//! traffic for the success token the UI alone may never expose.
//!
//! # Wiring
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tessera_browser::{spawn_response_forwarder, BrowserEngine, CdpPage};
//! use tessera_core::AppConfig;
//! use tessera_detector::RemoteClassifier;
//! use tessera_solver::{observer, ChallengeSolver};
//! use tokio::sync::mpsc;
//!
//! let config = AppConfig::load_with_env()?;
//! let engine = BrowserEngine::with_settings(&config.browser).await?;
//! let page = engine.open_page("https://example.com/signup").await?;
//!
//! let classifier = Arc::new(RemoteClassifier::new(&config.detector)?);
//! let (mut solver, network_observer) = ChallengeSolver::with_observer(
//!     Arc::new(CdpPage::new(page.clone())),
//!     classifier,
//!     &config.solver,
//! );
//!
//! let (tx, rx) = mpsc::unbounded_channel();
//! spawn_response_forwarder(&page, tx, observer::is_challenge_request).await?;
//! network_observer.run(rx);
//!
//! let outcome = solver.solve().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod challenge;
pub mod error;
pub mod observer;
pub mod session;
pub mod tiles;

pub use challenge::ChallengeSolver;
pub use error::{Result, SolverError};
pub use observer::{NetworkObserver, ObserverEvent};
pub use session::Session;
pub use tiles::TilePass;
