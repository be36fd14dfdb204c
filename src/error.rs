use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that escape the composer API.
///
/// Ordinary composition problems (unsatisfied, ambiguous or circular imports)
/// are never reported through this type; they are recorded on join points
/// and surface through [`CompositionResult`](crate::CompositionResult).
#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("type information unavailable for '{type_name}': {reason}")]
    StorageFailure { type_name: String, reason: String },

    #[error("composition invariant violated: {0}")]
    Invariant(String),
}

/// Failure reported by a [`TypeServices`](crate::TypeServices) collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type '{0}' could not be resolved")]
    Unresolved(String),
}

/// Classification of a recorded composition error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StorageFailure,
    UnsatisfiedImport,
    CircularPrerequisite,
    AmbiguousImport,
    /// Labels metadata warnings on exports. The import itself records
    /// `UnsatisfiedImport` when metadata rejected every candidate.
    IncompatibleMetadata,
    TypeMismatch,
    MissingConstructor,
    MissingCollectionGetter,
    NullCollection,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::StorageFailure => "storage failure",
            ErrorKind::UnsatisfiedImport => "unsatisfied import",
            ErrorKind::CircularPrerequisite => "circular prerequisite",
            ErrorKind::AmbiguousImport => "ambiguous import",
            ErrorKind::IncompatibleMetadata => "incompatible metadata",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::MissingConstructor => "missing constructor",
            ErrorKind::MissingCollectionGetter => "missing collection getter",
            ErrorKind::NullCollection => "null collection",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An error recorded on a join point or a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
