//! Operation dispatch: binds declared operations to handlers and runs each
//! call through the plugin chain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use switchboard_core::error::UNKNOWN_OPERATION;
use switchboard_core::{
    ApiDescription, CallError, CallInfo, Context, ExceptionRegistry, Fields, JsonCodec,
    OperationPlugin, PathPattern, PluginChain, RequestPlugin, SetupError, Terminal, WireCodec,
    WireResponse,
};

use super::classify::classify_error;
use super::config::ServerConfig;
use super::operation::{Reply, ReplyStatus};
use super::registry::HandlerRegistry;
use crate::traits::{FnHandler, Handler};

// ---------------------------------------------------------------------------
// ServiceBuilder
// ---------------------------------------------------------------------------

/// Collects handlers and plugins for one API description.
///
/// Plugins run in registration order within their scope. The chain is frozen
/// by [`ServiceBuilder::build`].
pub struct ServiceBuilder {
    api: ApiDescription,
    exceptions: Arc<ExceptionRegistry>,
    handlers: HandlerRegistry,
    chain: PluginChain,
    codec: Arc<dyn WireCodec>,
    config: ServerConfig,
}

impl ServiceBuilder {
    /// # Errors
    ///
    /// Returns `SetupError::ReservedException` if the description declares a
    /// reserved exception name.
    pub fn new(api: ApiDescription) -> Result<Self, SetupError> {
        let exceptions = Arc::new(ExceptionRegistry::new(&api.exceptions)?);
        Ok(Self {
            api,
            exceptions,
            handlers: HandlerRegistry::new(),
            chain: PluginChain::new(),
            codec: Arc::new(JsonCodec),
            config: ServerConfig::default(),
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiDescription {
        &self.api
    }

    /// Exception kinds handlers raise from.
    #[must_use]
    pub fn exceptions(&self) -> Arc<ExceptionRegistry> {
        Arc::clone(&self.exceptions)
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn with_codec(&mut self, codec: impl WireCodec + 'static) -> &mut Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_config(&mut self, config: ServerConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Binds `handler` to the declared operation `name`.
    ///
    /// # Errors
    ///
    /// See [`HandlerRegistry::register`].
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Handler + 'static,
    ) -> Result<&mut Self, SetupError> {
        self.handlers.register(&self.api, name, Arc::new(handler))?;
        Ok(self)
    }

    /// Binds a synchronous closure to the declared operation `name`.
    ///
    /// # Errors
    ///
    /// See [`HandlerRegistry::register`].
    pub fn register_fn<F>(&mut self, name: &str, handler: F) -> Result<&mut Self, SetupError>
    where
        F: Fn(&Fields, &mut Fields, &mut CallInfo) -> Result<(), CallError> + Send + Sync + 'static,
    {
        self.register(name, FnHandler(handler))
    }

    pub fn request_plugin(&mut self, plugin: impl RequestPlugin + 'static) -> &mut Self {
        self.chain.push_request(Arc::new(plugin));
        self
    }

    pub fn operation_plugin(&mut self, plugin: impl OperationPlugin + 'static) -> &mut Self {
        self.chain.push_operation(Arc::new(plugin));
        self
    }

    /// Freezes the registrations into a [`Service`].
    ///
    /// Operations without a handler stay declared but answer as unknown.
    ///
    /// # Errors
    ///
    /// Returns `SetupError::InvalidTemplate` if the endpoint path cannot be
    /// compiled.
    pub fn build(self) -> Result<Service, SetupError> {
        let pattern = PathPattern::compile(&self.api.endpoint, &self.api.version)?;
        for name in &self.api.operations {
            if !self.handlers.contains(name) {
                tracing::warn!(operation = %name, "declared operation has no handler");
            }
        }
        tracing::info!(
            version = %self.api.version,
            operations = self.handlers.len(),
            request_plugins = self.chain.request_plugins().len(),
            operation_plugins = self.chain.operation_plugins().len(),
            "service built"
        );
        Ok(Service {
            api: self.api,
            exceptions: self.exceptions,
            handlers: self.handlers,
            chain: self.chain,
            codec: self.codec,
            config: self.config,
            pattern,
            call_ids: AtomicU64::new(1),
        })
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Server side of one API: decodes requests, runs plugins and handlers,
/// encodes replies.
///
/// `handle` takes `&self`, so one `Service` behind an `Arc` serves any number
/// of concurrent calls.
pub struct Service {
    api: ApiDescription,
    exceptions: Arc<ExceptionRegistry>,
    handlers: HandlerRegistry,
    chain: PluginChain,
    codec: Arc<dyn WireCodec>,
    config: ServerConfig,
    pattern: PathPattern,
    call_ids: AtomicU64,
}

impl Service {
    /// # Errors
    ///
    /// See [`ServiceBuilder::new`].
    pub fn builder(api: ApiDescription) -> Result<ServiceBuilder, SetupError> {
        ServiceBuilder::new(api)
    }

    #[must_use]
    pub fn api(&self) -> &ApiDescription {
        &self.api
    }

    #[must_use]
    pub fn exceptions(&self) -> &ExceptionRegistry {
        &self.exceptions
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &dyn WireCodec {
        self.codec.as_ref()
    }

    /// Operation named by an inbound request path, if the path matches the
    /// endpoint template.
    #[must_use]
    pub fn route<'p>(&self, path: &'p str) -> Option<&'p str> {
        self.pattern.operation(path)
    }

    /// True when `operation` has a handler.
    #[must_use]
    pub fn serves(&self, operation: &str) -> bool {
        self.handlers.contains(operation)
    }

    /// Names of the operations with a handler.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.handlers.names()
    }

    fn next_call_id(&self) -> u64 {
        self.call_ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Serves one call.
    ///
    /// An unknown operation or an oversized body is rejected before any
    /// plugin runs. Failures never escape: they are classified into an error
    /// envelope.
    pub async fn handle(&self, operation: &str, body: Bytes) -> Reply {
        let Some(handler) = self.handlers.get(operation) else {
            return self.unknown_operation(operation);
        };
        if body.len() > self.config.max_body_bytes {
            tracing::warn!(
                operation,
                size = body.len(),
                limit = self.config.max_body_bytes,
                "request body too large"
            );
            let err = switchboard_core::ProtocolError::BodyTooLarge {
                limit: self.config.max_body_bytes,
            };
            return self.error_reply(operation, 0, &err.into());
        }

        let call_id = self.next_call_id();
        let terminal = DispatchTerminal {
            handler: handler.as_ref(),
            codec: self.codec.as_ref(),
        };
        let info = CallInfo::new(operation, call_id, Arc::clone(&self.exceptions));
        let mut ctx = Context::new(info, &self.chain, &terminal).with_request_body(body);

        match ctx.run().await {
            Ok(()) => match ctx.take_response_body() {
                Some(body) => self.reply(ReplyStatus::Ok, body),
                // A request-scope plugin answered without resuming.
                None => {
                    let (_, response) = ctx.into_response();
                    self.encode(ReplyStatus::Ok, &WireResponse::Success { body: response })
                }
            },
            Err(err) => self.error_reply(operation, call_id, &err),
        }
    }

    /// Reply for a request that names no served operation.
    #[must_use]
    pub fn unknown_operation(&self, operation: &str) -> Reply {
        tracing::warn!(operation, "unknown operation");
        self.encode(
            ReplyStatus::UnknownOperation,
            &WireResponse::error(UNKNOWN_OPERATION, format!("unknown operation: {operation}")),
        )
    }

    fn error_reply(&self, operation: &str, call_id: u64, err: &CallError) -> Reply {
        let classification = classify_error(err, &self.exceptions, self.api.debug);
        if classification.is_internal() {
            tracing::error!(operation, call_id, error = %err, "call failed");
        } else {
            tracing::debug!(operation, call_id, error = %err, "call raised");
        }
        self.encode(classification.status, &classification.envelope)
    }

    fn encode(&self, status: ReplyStatus, envelope: &WireResponse) -> Reply {
        match self.codec.encode_response(envelope) {
            Ok(body) => self.reply(status, body),
            Err(err) => {
                tracing::error!(error = %err, "failed to encode reply");
                let fallback = WireResponse::error(
                    switchboard_core::error::INTERNAL_ERROR,
                    super::classify::INTERNAL_ERROR_MESSAGE,
                );
                let body = self.codec.encode_response(&fallback).unwrap_or_default();
                self.reply(ReplyStatus::InternalError, body)
            }
        }
    }

    fn reply(&self, status: ReplyStatus, body: Bytes) -> Reply {
        Reply {
            status,
            body,
            content_type: self.codec.content_type(),
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("version", &self.api.version)
            .field("handlers", &self.handlers)
            .field("chain", &self.chain)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DispatchTerminal
// ---------------------------------------------------------------------------

/// Server-side terminal stages: decode before the operation scope, the
/// handler at its centre, encode after it.
struct DispatchTerminal<'h> {
    handler: &'h dyn Handler,
    codec: &'h dyn WireCodec,
}

#[async_trait]
impl Terminal for DispatchTerminal<'_> {
    async fn before_operation(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let decoded = self.codec.decode_fields(ctx.request_body())?;
        let request = ctx.request_mut();
        for (name, value) in decoded {
            request.set(name, value);
        }
        Ok(())
    }

    async fn invoke(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let (request, response, call) = ctx.split_mut();
        self.handler.handle(request, response, call).await
    }

    async fn after_operation(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let body = self
            .codec
            .encode_response(&WireResponse::Success {
                body: ctx.response().clone(),
            })
            .map_err(|e| anyhow::Error::new(e).context("failed to encode response"))?;
        ctx.set_response_body(body);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
