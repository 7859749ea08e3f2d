//! Conflict Classifier
//!
//! Decides whether a failed store interaction is a serialization conflict
//! (discard the attempt and retry it) or a terminal failure (propagate).

use super::error::{StoreError, StoreErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Retry the enclosing attempt from the beginning
    Conflict,
    /// Abort and surface to the caller
    Terminal,
}

/// Only the store's serialization-failure signal is retryable. Connectivity
/// problems, constraint violations and everything else are terminal.
pub fn classify(err: &StoreError) -> Classification {
    match err.kind {
        StoreErrorKind::Conflict => Classification::Conflict,
        StoreErrorKind::NotFound
        | StoreErrorKind::ConstraintViolation
        | StoreErrorKind::Transient
        | StoreErrorKind::Fatal => Classification::Terminal,
    }
}
