//! Client side of an API: encodes calls, runs them through the plugin chain
//! and rebuilds declared exceptions from error envelopes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use switchboard_core::error::{MALFORMED_REQUEST, UNKNOWN_OPERATION};
use switchboard_core::{
    ApiDescription, CallError, CallInfo, Context, ExceptionRegistry, Fields, JsonCodec,
    OperationPlugin, PluginChain, ProtocolError, RequestPlugin, SetupError, Terminal, Transport,
    TransportReply, WireCodec, WireResponse,
};

use crate::transport::HttpTransport;

// ---------------------------------------------------------------------------
// ClientBuilder
// ---------------------------------------------------------------------------

/// Collects plugins, codec and transport for one API description.
pub struct ClientBuilder {
    api: ApiDescription,
    exceptions: Arc<ExceptionRegistry>,
    chain: PluginChain,
    codec: Arc<dyn WireCodec>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// # Errors
    ///
    /// Returns `SetupError::ReservedException` if the description declares a
    /// reserved exception name.
    pub fn new(api: ApiDescription) -> Result<Self, SetupError> {
        let exceptions = Arc::new(ExceptionRegistry::new(&api.exceptions)?);
        Ok(Self {
            api,
            exceptions,
            chain: PluginChain::new(),
            codec: Arc::new(JsonCodec),
            transport: None,
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiDescription {
        &self.api
    }

    /// Exception kinds callers match failures against.
    #[must_use]
    pub fn exceptions(&self) -> Arc<ExceptionRegistry> {
        Arc::clone(&self.exceptions)
    }

    pub fn with_codec(&mut self, codec: impl WireCodec + 'static) -> &mut Self {
        self.codec = Arc::new(codec);
        self
    }

    /// Replaces the default HTTP transport.
    pub fn with_transport(&mut self, transport: impl Transport + 'static) -> &mut Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn request_plugin(&mut self, plugin: impl RequestPlugin + 'static) -> &mut Self {
        self.chain.push_request(Arc::new(plugin));
        self
    }

    pub fn operation_plugin(&mut self, plugin: impl OperationPlugin + 'static) -> &mut Self {
        self.chain.push_operation(Arc::new(plugin));
        self
    }

    /// Freezes the registrations into a [`Client`]. Without an explicit
    /// transport, calls go over HTTP to the description's endpoint.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::Transport` if the default HTTP transport cannot
    /// be built.
    pub fn build(self) -> Result<Client, SetupError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.api, self.codec.content_type())?),
        };
        Ok(Client {
            inner: Arc::new(Inner {
                api: self.api,
                exceptions: self.exceptions,
                chain: self.chain,
                codec: self.codec,
                transport,
                call_ids: AtomicU64::new(1),
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

struct Inner {
    api: ApiDescription,
    exceptions: Arc<ExceptionRegistry>,
    chain: PluginChain,
    codec: Arc<dyn WireCodec>,
    transport: Arc<dyn Transport>,
    call_ids: AtomicU64,
}

/// Calls the operations of one API. Cheap to clone; clones share plugins,
/// codec and transport, and may call concurrently.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// # Errors
    ///
    /// See [`ClientBuilder::new`].
    pub fn builder(api: ApiDescription) -> Result<ClientBuilder, SetupError> {
        ClientBuilder::new(api)
    }

    #[must_use]
    pub fn api(&self) -> &ApiDescription {
        &self.inner.api
    }

    #[must_use]
    pub fn exceptions(&self) -> &ExceptionRegistry {
        &self.inner.exceptions
    }

    /// Handle bound to the declared operation `name`.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::UnknownOperation` if `name` is not declared.
    pub fn operation(&self, name: &str) -> Result<OperationHandle, SetupError> {
        if !self.inner.api.declares_operation(name) {
            return Err(SetupError::UnknownOperation {
                name: name.to_string(),
            });
        }
        Ok(OperationHandle {
            client: self.clone(),
            name: Arc::from(name),
        })
    }

    /// Calls `operation` with `request` and returns the response fields.
    ///
    /// # Errors
    ///
    /// - `CallError::Exception` for a declared exception raised remotely
    /// - `CallError::Remote` for an error envelope naming an undeclared exception
    /// - `CallError::Protocol` for an undeclared operation (checked before any
    ///   plugin runs) or an unreadable reply
    /// - `CallError::Transport` if the round trip fails
    /// - anything a plugin raises
    pub async fn call(&self, operation: &str, request: Fields) -> Result<Fields, CallError> {
        let inner = &*self.inner;
        if !inner.api.declares_operation(operation) {
            return Err(ProtocolError::UnknownOperation {
                name: operation.to_string(),
            }
            .into());
        }

        let call_id = inner.call_ids.fetch_add(1, Ordering::Relaxed);
        let terminal = InvokeTerminal {
            codec: inner.codec.as_ref(),
            transport: inner.transport.as_ref(),
            debug: inner.api.debug,
        };
        let info = CallInfo::new(operation, call_id, Arc::clone(&inner.exceptions));
        let mut ctx = Context::new(info, &inner.chain, &terminal).with_request(request);

        let result = ctx.run().await;
        if let Err(err) = &result {
            tracing::debug!(operation, call_id, error = %err, "call failed");
        }
        let (_, response) = ctx.into_response();
        result.map(|()| response)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("version", &self.inner.api.version)
            .field("chain", &self.inner.chain)
            .field("codec", &self.inner.codec)
            .finish_non_exhaustive()
    }
}

/// A [`Client`] bound to one declared operation.
#[derive(Debug, Clone)]
pub struct OperationHandle {
    client: Client,
    name: Arc<str>,
}

impl OperationHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    ///
    /// See [`Client::call`].
    pub async fn call(&self, request: Fields) -> Result<Fields, CallError> {
        self.client.call(&self.name, request).await
    }
}

// ---------------------------------------------------------------------------
// InvokeTerminal
// ---------------------------------------------------------------------------

/// Client-side innermost stage: encode, round trip, decode.
struct InvokeTerminal<'c> {
    codec: &'c dyn WireCodec,
    transport: &'c dyn Transport,
    debug: bool,
}

impl InvokeTerminal<'_> {
    /// Declared names become `Exception`; anything else stays `Remote`.
    fn rebuild(exceptions: &ExceptionRegistry, name: String, message: String) -> CallError {
        match exceptions.raise_by_name(&name, message.as_str()) {
            Ok(exception) => CallError::Exception(exception),
            Err(_) => CallError::Remote { name, message },
        }
    }

    fn status_error(&self, ctx: &Context<'_>, reply: &TransportReply) -> CallError {
        match self.codec.decode_response(&reply.body) {
            Ok(WireResponse::Error {
                exception_name,
                message,
            }) => match exception_name.as_str() {
                UNKNOWN_OPERATION => ProtocolError::UnknownOperation {
                    name: ctx.operation().to_string(),
                }
                .into(),
                MALFORMED_REQUEST => ProtocolError::MalformedBody { reason: message }.into(),
                // Declared exceptions only ever travel with 200.
                _ => CallError::Remote {
                    name: exception_name,
                    message,
                },
            },
            _ if reply.status == 404 => ProtocolError::UnknownOperation {
                name: ctx.operation().to_string(),
            }
            .into(),
            _ => ProtocolError::UnexpectedStatus {
                status: reply.status,
            }
            .into(),
        }
    }
}

#[async_trait]
impl Terminal for InvokeTerminal<'_> {
    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let body = self.codec.encode_fields(ctx.request())?;
        let reply = self.transport.round_trip(ctx.operation(), body).await?;

        let err = if reply.status == 200 {
            match self.codec.decode_response(&reply.body)? {
                WireResponse::Success { body } => {
                    let response = ctx.response_mut();
                    for (name, value) in body {
                        response.set(name, value);
                    }
                    return Ok(());
                }
                WireResponse::Error {
                    exception_name,
                    message,
                } => Self::rebuild(ctx.exceptions(), exception_name, message),
            }
        } else {
            self.status_error(ctx, &reply)
        };

        if !self.debug {
            ctx.response_mut().clear();
        }
        Err(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
