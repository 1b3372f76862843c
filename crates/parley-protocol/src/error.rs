//! Error types for parley-protocol

use crate::event::EventKind;
use serde::Serialize;
use thiserror::Error;

/// Result type alias using parley-protocol Error
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a frame that could not be turned into an event.
///
/// Each kind maps to exactly one user-facing text, see [`FailureKind::user_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The payload is not valid JSON
    MalformedPayload,
    /// The payload is valid JSON but not an object
    UnexpectedShape,
    /// A required field is missing or empty
    IncompleteEvent,
}

impl FailureKind {
    /// The fixed text shown to the user for this failure
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::MalformedPayload => {
                "⚠️ We encountered a communication issue. Please refresh the page and try again."
            }
            FailureKind::UnexpectedShape => {
                "⚠️ Sorry, we received some unexpected data. Please try again in a moment."
            }
            FailureKind::IncompleteEvent => {
                "⚠️ Oops! We received an incomplete message. Some information might be missing."
            }
        }
    }
}

/// Errors produced while decoding a single frame
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The payload could not be parsed as JSON
    #[error("malformed payload for '{event}': {source}")]
    MalformedPayload {
        event: EventKind,
        source: serde_json::Error,
    },

    /// The payload parsed, but to something other than an object
    #[error("unexpected payload for '{event}': expected object, got {found}")]
    UnexpectedShape {
        event: EventKind,
        found: &'static str,
    },

    /// A field required by this event type is absent
    #[error("incomplete '{event}' event: missing {missing}")]
    IncompleteEvent {
        event: EventKind,
        missing: &'static str,
    },
}

impl DecodeError {
    /// Get the failure classification
    pub fn kind(&self) -> FailureKind {
        match self {
            DecodeError::MalformedPayload { .. } => FailureKind::MalformedPayload,
            DecodeError::UnexpectedShape { .. } => FailureKind::UnexpectedShape,
            DecodeError::IncompleteEvent { .. } => FailureKind::IncompleteEvent,
        }
    }

    /// The event type the failing frame was labelled with
    pub fn event(&self) -> EventKind {
        match self {
            DecodeError::MalformedPayload { event, .. }
            | DecodeError::UnexpectedShape { event, .. }
            | DecodeError::IncompleteEvent { event, .. } => *event,
        }
    }
}

/// Errors that can occur when talking to a conversation stream
#[derive(Error, Debug)]
pub enum Error {
    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
