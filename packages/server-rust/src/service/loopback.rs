//! In-process transport: hands encoded requests straight to a [`Service`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use switchboard_core::{Transport, TransportError, TransportReply};

use super::router::Service;

/// Transport that skips the network and calls [`Service::handle`] directly.
///
/// Bodies still go through both codecs, so a client built on it sees the same
/// envelopes it would over HTTP.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    service: Arc<Service>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }

    #[must_use]
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn round_trip(
        &self,
        operation: &str,
        body: Bytes,
    ) -> Result<TransportReply, TransportError> {
        let reply = self.service.handle(operation, body).await;
        Ok(TransportReply {
            status: reply.status.code(),
            body: reply.body,
        })
    }
}
