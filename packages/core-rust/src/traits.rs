use async_trait::async_trait;
use bytes::Bytes;

use crate::context::Context;
use crate::error::{CallError, ProtocolError, TransportError};
use crate::types::Fields;
use crate::wire::WireResponse;

/// Request-scope plugin. Wraps raw body handling and everything inside it.
///
/// Implementations call [`Context::process_request`] to run the rest of the
/// pipeline; code before the call is the pre-half, code after it the
/// post-half. Returning without calling it skips the handler entirely.
#[async_trait]
pub trait RequestPlugin: Send + Sync {
    async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError>;
}

/// Operation-scope plugin. Runs with the request container already decoded.
///
/// Implementations call [`Context::process_operation`] to continue.
#[async_trait]
pub trait OperationPlugin: Send + Sync {
    async fn on_operation(&self, ctx: &mut Context<'_>) -> Result<(), CallError>;
}

/// The fixed stages a [`Context`] runs underneath its plugins.
///
/// `before_operation` and `after_operation` bracket the operation scope (the
/// service decodes and encodes bodies there); `invoke` is the innermost stage
/// (the handler on a service, the round trip on a client).
#[async_trait]
pub trait Terminal: Send + Sync {
    async fn before_operation(&self, _ctx: &mut Context<'_>) -> Result<(), CallError> {
        Ok(())
    }

    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<(), CallError>;

    async fn after_operation(&self, _ctx: &mut Context<'_>) -> Result<(), CallError> {
        Ok(())
    }
}

/// Encodes containers and response envelopes to and from transport bodies.
pub trait WireCodec: Send + Sync + std::fmt::Debug {
    /// MIME type sent alongside encoded bodies.
    fn content_type(&self) -> &'static str;

    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedBody` if the fields cannot be encoded.
    fn encode_fields(&self, fields: &Fields) -> Result<Bytes, ProtocolError>;

    /// Decodes a request body. An empty body decodes to empty fields.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedBody` for undecodable input.
    fn decode_fields(&self, body: &[u8]) -> Result<Fields, ProtocolError>;

    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedBody` if the envelope cannot be encoded.
    fn encode_response(&self, response: &WireResponse) -> Result<Bytes, ProtocolError>;

    /// # Errors
    ///
    /// Returns `ProtocolError::MalformedBody` for undecodable input.
    fn decode_response(&self, body: &[u8]) -> Result<WireResponse, ProtocolError>;
}

/// Raw reply read back from a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    /// HTTP-style status code.
    pub status: u16,
    pub body: Bytes,
}

/// Carries one encoded request to the service and brings the reply back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(
        &self,
        operation: &str,
        body: Bytes,
    ) -> Result<TransportReply, TransportError>;
}
