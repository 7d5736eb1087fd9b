//! Tessera Detector - tile classifier boundary.
//!
//! The challenge solver consumes image classification through the
//! [`TileClassifier`] trait; [`RemoteClassifier`] is the HTTP-backed
//! implementation for an external classification service.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod classifier;
pub mod error;
pub mod remote;

pub use classifier::{Detection, TileClassifier};
pub use error::{DetectorError, Result};
pub use remote::RemoteClassifier;
