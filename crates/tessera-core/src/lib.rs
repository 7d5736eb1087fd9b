//! Tessera Core - Foundation crate for the Tessera challenge-resolution engine.
//!
//! This crate provides shared types, error handling, and configuration
//! management that all other Tessera crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`ChallengeToken`, `GridSize`, `ChallengeOutcome`)
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{AppConfig, GridSize};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.solver.retry_limit, 15);
//! assert!(GridSize::from_tile_count(16).is_area());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, DetectorConfig, SolverConfig};
pub use error::{ConfigError, ConfigResult, Result, TesseraError};
pub use types::{ChallengeOutcome, ChallengeToken, GridSize};
