//! Error classification: converts a failed call into a wire envelope and a
//! reply status.
//!
//! Declared exceptions cross the wire with their name and message. Framework
//! errors map onto the reserved names. Everything else collapses into an
//! opaque `InternalError` unless the API runs in debug mode.

use switchboard_core::error::{INTERNAL_ERROR, MALFORMED_REQUEST, UNKNOWN_OPERATION};
use switchboard_core::{CallError, ExceptionRegistry, ProtocolError, WireResponse};

use super::operation::ReplyStatus;

/// Message sent for internal failures outside debug mode.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Error";

/// Result of classifying one failed call.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: ReplyStatus,
    pub envelope: WireResponse,
}

impl Classification {
    fn new(status: ReplyStatus, name: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: WireResponse::error(name, message),
        }
    }

    /// True when the failure was not one the API declared or the framework
    /// recognises, i.e. a server-side bug.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.status == ReplyStatus::InternalError
    }
}

/// Classifies `err` raised while serving a call against `exceptions`.
///
/// An exception minted by another registry counts as undeclared.
#[must_use]
pub fn classify_error(err: &CallError, exceptions: &ExceptionRegistry, debug: bool) -> Classification {
    match err {
        CallError::Exception(exception) if exceptions.declares(exception) => {
            Classification::new(ReplyStatus::Ok, exception.name(), exception.message())
        }
        CallError::Protocol(ProtocolError::MalformedBody { reason }) => {
            Classification::new(ReplyStatus::MalformedRequest, MALFORMED_REQUEST, reason.as_str())
        }
        CallError::Protocol(ProtocolError::BodyTooLarge { .. }) => {
            Classification::new(ReplyStatus::PayloadTooLarge, MALFORMED_REQUEST, err.to_string())
        }
        CallError::Protocol(ProtocolError::UnknownOperation { .. }) => {
            Classification::new(ReplyStatus::UnknownOperation, UNKNOWN_OPERATION, err.to_string())
        }
        CallError::Exception(exception) if debug => {
            Classification::new(ReplyStatus::InternalError, exception.name(), exception.message())
        }
        _ if debug => Classification::new(ReplyStatus::InternalError, INTERNAL_ERROR, err.to_string()),
        _ => Classification::new(ReplyStatus::InternalError, INTERNAL_ERROR, INTERNAL_ERROR_MESSAGE),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
