//! HTTP transport built on `reqwest`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use switchboard_core::{ApiDescription, Endpoint, SetupError, Transport, TransportError, TransportReply};

/// Posts encoded requests to the URL the API description's endpoint names.
///
/// The description's `timeout` bounds each round trip.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Endpoint,
    version: String,
    content_type: &'static str,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns `SetupError::Transport` if the HTTP client cannot be built.
    pub fn new(api: &ApiDescription, content_type: &'static str) -> Result<Self, SetupError> {
        let http = reqwest::Client::builder()
            .timeout(api.timeout_duration())
            .build()
            .map_err(|e| SetupError::Transport {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            version: api.version.clone(),
            content_type,
        })
    }

    /// URL `operation` is posted to.
    #[must_use]
    pub fn url(&self, operation: &str) -> String {
        self.endpoint.client_url(&self.version, operation)
    }
}

fn transport_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Io(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(
        &self,
        operation: &str,
        body: Bytes,
    ) -> Result<TransportReply, TransportError> {
        let url = self.url(operation);
        tracing::debug!(%url, size = body.len(), "posting call");

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, self.content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| transport_error(&e))?;
        Ok(TransportReply { status, body })
    }
}
