//! Structured `(success, message)` results
//!
//! Restore and scheduler operations report through [`Outcome`] instead of
//! returning errors, so unattended callers always get a message to record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GastroError;

/// Result of an operation that must never fail loudly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

impl Outcome {
    /// A successful outcome
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<String, GastroError>> for Outcome {
    fn from(result: Result<String, GastroError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
