//! Error taxonomy for the tutoring core.
//!
//! Decision and resolution paths raise immediately instead of returning
//! partial output. Every variant maps to one recovery posture: configuration
//! problems are fatal and never guessed around, missing registry ids are
//! fatal for that call only, and validation failures are safe to retry once
//! the offending bindings or response are corrected.

use crate::registry::RegistryKind;
use thiserror::Error;

/// Errors surfaced by the decision engine, template resolution, and the
/// registry.
#[derive(Debug, Error)]
pub enum TutorError {
    /// An unknown section, topic, or curriculum reference. Fatal; the engine
    /// never advances past a reference it cannot resolve.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A lookup for an id that was never registered. Fatal for the current
    /// resolution call; there is no fallback to a default payload.
    #[error("{kind} '{id}' is not registered")]
    NotFound { kind: RegistryKind, id: String },

    /// A template validator rejected the current bindings, or a resolved
    /// response violated the formatting contract.
    #[error("validation failed for '{template_id}': {message}")]
    Validation { template_id: String, message: String },

    /// A model reply could not be parsed into the agent response schema.
    #[error("malformed agent response: {0}")]
    MalformedResponse(String),
}

impl TutorError {
    /// Shorthand for a [`TutorError::NotFound`] with owned id.
    pub fn not_found(kind: RegistryKind, id: impl Into<String>) -> Self {
        TutorError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a [`TutorError::Validation`].
    pub fn validation(template_id: impl Into<String>, message: impl Into<String>) -> Self {
        TutorError::Validation {
            template_id: template_id.into(),
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TutorError>;
