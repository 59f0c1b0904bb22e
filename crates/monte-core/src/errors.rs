//! Structured error types shared across the Monte Carlo crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MonteError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (field paths, indices, sampler names).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the run-management engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MonteError {
    /// Invalid fixture, generator or run configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// State generation errors.
    #[error("generator error: {0}")]
    Generator(ErrorInfo),
    /// Invalid values produced by sampling or analysis functions.
    #[error("sampling error: {0}")]
    Sampling(ErrorInfo),
    /// Failures reported by the stochastic kernel.
    #[error("kernel error: {0}")]
    Kernel(ErrorInfo),
    /// Randomness and seeding errors.
    #[error("rng error: {0}")]
    Rng(ErrorInfo),
    /// Serialization, schema and filesystem errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MonteError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MonteError::Config(info)
            | MonteError::Generator(info)
            | MonteError::Sampling(info)
            | MonteError::Kernel(info)
            | MonteError::Rng(info)
            | MonteError::Serde(info) => info,
        }
    }

    /// Attaches an extra context entry, keeping the error family.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            MonteError::Config(info) => MonteError::Config(info.with_context(key, value)),
            MonteError::Generator(info) => MonteError::Generator(info.with_context(key, value)),
            MonteError::Sampling(info) => MonteError::Sampling(info.with_context(key, value)),
            MonteError::Kernel(info) => MonteError::Kernel(info.with_context(key, value)),
            MonteError::Rng(info) => MonteError::Rng(info.with_context(key, value)),
            MonteError::Serde(info) => MonteError::Serde(info.with_context(key, value)),
        }
    }

    /// Shorthand for a configuration error pointing at `field`.
    pub fn config(code: &str, message: impl Into<String>, field: impl Into<String>) -> Self {
        MonteError::Config(ErrorInfo::new(code, message).with_context("field", field))
    }
}
