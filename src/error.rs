// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{error::Error, fmt};

use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum RecordLockError {
    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("{kind} not found in record {record}")]
    ElementNotFound { kind: &'static str, record: String },

    #[error("{kind} {key:?} already exists in record {record}")]
    ElementExists {
        kind: &'static str,
        key: String,
        record: String,
    },

    #[error("lock already acquired: {0}")]
    AlreadyAcquired(String),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("provider error: {0}")]
    ProviderError(Box<dyn Error + Send + Sync>),

    #[error("invalid import specifier, expecting 1 slash (\"record/key\"), got {0}")]
    InvalidImport(usize),

    #[error("provider does not guarantee exclusive token creation, locking would be advisory")]
    NonExclusiveProvider,
}

impl RecordLockError {
    /// Whether the operation may succeed if attempted again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecordLockError::AlreadyAcquired(_))
    }

    pub(crate) fn provider(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        RecordLockError::ProviderError(error.into())
    }
}

pub type Result<T> = std::result::Result<T, RecordLockError>;

/// Every validation failure found for one sub-element, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    context: String,
    errors: Vec<String>,
}

impl ValidationErrors {
    pub(crate) fn new(context: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            context: context.into(),
            errors,
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "found error/s in {}", self.context)?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{sep}{error}")?;
        }
        Ok(())
    }
}
