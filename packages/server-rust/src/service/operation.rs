//! Reply produced by one dispatched call.

use bytes::Bytes;

/// Outcome class of a reply; the HTTP binding maps it onto a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Success or a declared exception. Both carry a normal envelope.
    Ok,
    MalformedRequest,
    UnknownOperation,
    PayloadTooLarge,
    InternalError,
}

impl ReplyStatus {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            ReplyStatus::Ok => 200,
            ReplyStatus::MalformedRequest => 400,
            ReplyStatus::UnknownOperation => 404,
            ReplyStatus::PayloadTooLarge => 413,
            ReplyStatus::InternalError => 500,
        }
    }
}

/// Encoded reply for one call.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: ReplyStatus,
    pub body: Bytes,
    pub content_type: &'static str,
}
