//! Shared types used across the Tessera workspace.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::TesseraError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for the opaque success credential issued by the challenge
/// provider once a challenge is solved.
///
/// Tokens must be non-empty; an empty token means "no token" and is
/// represented as `None` at the call sites, never as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeToken(String);

impl ChallengeToken {
    /// Create a new `ChallengeToken` from a string.
    ///
    /// # Errors
    /// Returns error if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, TesseraError> {
        let token = token.into();
        if token.is_empty() {
            return Err(TesseraError::Validation(
                "challenge token must not be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the token and return the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChallengeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid size of a tile challenge.
///
/// Standard challenges present a 3x3 grid; area challenges present a 4x4
/// grid and use verify-mode semantics from the first detection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridSize {
    /// 3x3 grid (9 tiles)
    Standard,
    /// 4x4 grid (16 tiles)
    Area,
}

impl GridSize {
    /// Classify a grid from an observed tile count.
    ///
    /// Selects [`GridSize::Area`] iff the count is exactly 16; any other
    /// count (including counts that never stabilized to 9 or 16) is
    /// treated as a standard grid.
    #[must_use]
    pub fn from_tile_count(count: usize) -> Self {
        if count == 16 {
            Self::Area
        } else {
            Self::Standard
        }
    }

    /// Number of tiles in this grid.
    #[must_use]
    pub fn tile_count(self) -> usize {
        match self {
            Self::Standard => 9,
            Self::Area => 16,
        }
    }

    /// Whether this is the 4x4 area variant.
    #[must_use]
    pub fn is_area(self) -> bool {
        matches!(self, Self::Area)
    }
}

/// Outcome of a challenge resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeOutcome {
    /// The challenge was solved and a token recovered
    Solved(ChallengeToken),

    /// The challenge never rendered or never produced a token; structural
    /// failures land here rather than being retried
    Unsolved,
}

impl ChallengeOutcome {
    /// Check if the outcome carries a token.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved(_))
    }

    /// Get the token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&ChallengeToken> {
        match self {
            Self::Solved(token) => Some(token),
            Self::Unsolved => None,
        }
    }
}
