//! Browser automation boundary for the Tessera challenge solver.
//!
//! Defines the [`PageHandle`]/[`FrameHandle`] seam the solver works
//! against, plus a chromiumoxide-backed engine and adapter.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod cdp;
#[allow(missing_docs)]
pub mod engine;
#[allow(missing_docs)]
pub mod error;
pub mod handle;

pub use cdp::{spawn_response_forwarder, CdpFrame, CdpPage};
pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use handle::{extract_domain, FrameHandle, PageHandle, ResponseEvent};
