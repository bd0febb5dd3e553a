//! Error types for todo validation.
//!
//! # Design
//! Validation never stops at the first problem. Every check runs and each
//! failure is recorded as a `FieldError`, so callers can report all bad
//! fields of a request at once. Enum parse failures get their own small
//! error types because serde surfaces them through `TryFrom`.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the offending value came from in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLocation {
    Body,
    Query,
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub location: FieldLocation,
}

impl FieldError {
    pub fn body(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            location: FieldLocation::Body,
        }
    }

    pub fn query(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            location: FieldLocation::Query,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One or more fields failed validation. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed ({} field error(s))", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }

    /// Returns `Ok(value)` if nothing was collected, otherwise the errors.
    pub(crate) fn check<T>(errors: Vec<FieldError>, value: T) -> Result<T, Self> {
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(Self { errors })
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

/// A priority outside {1, 2, 3}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Priority must be 1, 2, or 3")]
pub struct InvalidPriority(pub u8);

/// A sharing permission outside {read, write, admin}.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Permission must be one of read, write, admin")]
pub struct InvalidPermission(pub String);
