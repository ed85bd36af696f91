//! Per-call state and the continuation primitives that drive the pipeline.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::chain::{PluginChain, Scope};
use crate::error::{CallError, ProtocolError};
use crate::exceptions::ExceptionRegistry;
use crate::traits::Terminal;
use crate::types::{Fields, Value};

/// Free-form per-call bag plugins use to hand data to each other.
pub type Metadata = BTreeMap<String, Value>;

/// Boxed future returned by the continuation calls.
pub type Continuation<'a> = Pin<Box<dyn Future<Output = Result<(), CallError>> + Send + 'a>>;

/// Facts about one call that handlers and plugins can see.
#[derive(Debug)]
pub struct CallInfo {
    operation: Arc<str>,
    call_id: u64,
    metadata: Metadata,
    exceptions: Arc<ExceptionRegistry>,
}

impl CallInfo {
    #[must_use]
    pub fn new(operation: impl Into<Arc<str>>, call_id: u64, exceptions: Arc<ExceptionRegistry>) -> Self {
        Self {
            operation: operation.into(),
            call_id,
            metadata: Metadata::new(),
            exceptions,
        }
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    #[must_use]
    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// Exceptions declared by the API this call belongs to.
    #[must_use]
    pub fn exceptions(&self) -> &ExceptionRegistry {
        &self.exceptions
    }

    /// Builds the declared exception `name` as a ready-to-return error.
    ///
    /// An undeclared `name` yields `CallError::UnknownException`, which the
    /// service treats as an internal failure.
    #[must_use]
    pub fn raise(&self, name: &str, message: impl Into<String>) -> CallError {
        match self.exceptions.raise_by_name(name, message) {
            Ok(exception) => CallError::Exception(exception),
            Err(unknown) => CallError::UnknownException(unknown),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Request,
    Operation,
    Terminal,
}

/// One in-flight call.
///
/// Owns the containers and metadata and walks the [`PluginChain`] with one
/// cursor per scope. Plugin `i` may resume the pipeline exactly once, and
/// only while it is the innermost active plugin of its scope.
pub struct Context<'a> {
    info: CallInfo,
    request: Fields,
    response: Fields,
    request_body: Bytes,
    response_body: Option<Bytes>,
    chain: &'a PluginChain,
    terminal: &'a dyn Terminal,
    phase: Phase,
    request_cursor: usize,
    operation_cursor: usize,
    active_request: Option<usize>,
    active_operation: Option<usize>,
}

impl<'a> Context<'a> {
    #[must_use]
    pub fn new(info: CallInfo, chain: &'a PluginChain, terminal: &'a dyn Terminal) -> Self {
        Self {
            info,
            request: Fields::new(),
            response: Fields::new(),
            request_body: Bytes::new(),
            response_body: None,
            chain,
            terminal,
            phase: Phase::Request,
            request_cursor: 0,
            operation_cursor: 0,
            active_request: None,
            active_operation: None,
        }
    }

    /// Seeds the request container (client side: the call arguments).
    #[must_use]
    pub fn with_request(mut self, request: Fields) -> Self {
        self.request = request;
        self
    }

    /// Seeds the raw inbound body (service side).
    #[must_use]
    pub fn with_request_body(mut self, body: Bytes) -> Self {
        self.request_body = body;
        self
    }

    #[must_use]
    pub fn operation(&self) -> &str {
        self.info.operation()
    }

    #[must_use]
    pub fn call_id(&self) -> u64 {
        self.info.call_id()
    }

    #[must_use]
    pub fn info(&self) -> &CallInfo {
        &self.info
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        self.info.metadata()
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.info.metadata_mut()
    }

    #[must_use]
    pub fn exceptions(&self) -> &ExceptionRegistry {
        self.info.exceptions()
    }

    /// See [`CallInfo::raise`].
    #[must_use]
    pub fn raise(&self, name: &str, message: impl Into<String>) -> CallError {
        self.info.raise(name, message)
    }

    #[must_use]
    pub fn request(&self) -> &Fields {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Fields {
        &mut self.request
    }

    #[must_use]
    pub fn response(&self) -> &Fields {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Fields {
        &mut self.response
    }

    #[must_use]
    pub fn request_body(&self) -> &Bytes {
        &self.request_body
    }

    #[must_use]
    pub fn response_body(&self) -> Option<&Bytes> {
        self.response_body.as_ref()
    }

    pub fn set_response_body(&mut self, body: Bytes) {
        self.response_body = Some(body);
    }

    pub fn take_response_body(&mut self) -> Option<Bytes> {
        self.response_body.take()
    }

    /// Disjoint borrows in the shape handlers take them.
    pub fn split_mut(&mut self) -> (&Fields, &mut Fields, &mut CallInfo) {
        (&self.request, &mut self.response, &mut self.info)
    }

    /// Consumes the context, keeping the call info and response container.
    #[must_use]
    pub fn into_response(self) -> (CallInfo, Fields) {
        (self.info, self.response)
    }

    /// Runs the whole pipeline from the outermost request-scope plugin.
    ///
    /// # Errors
    ///
    /// Returns whatever the plugins or terminal stages raise, or
    /// `ProtocolError::ContinuationReused` if the context already ran.
    pub async fn run(&mut self) -> Result<(), CallError> {
        self.process_request().await
    }

    /// Resumes the pipeline from inside a request-scope plugin: the remaining
    /// request-scope pre-halves, the operation scope with its decode/encode
    /// brackets, then control returns to the caller.
    pub fn process_request(&mut self) -> Continuation<'_> {
        Box::pin(async move {
            if self.phase != Phase::Request {
                return Err(ProtocolError::OutOfScope {
                    scope: Scope::Request,
                }
                .into());
            }
            let next = self.active_request.map_or(0, |i| i + 1);
            if self.request_cursor != next {
                tracing::warn!(operation = self.operation(), "request continuation reused");
                return Err(ProtocolError::ContinuationReused {
                    scope: Scope::Request,
                }
                .into());
            }
            self.request_cursor = next + 1;

            let chain = self.chain;
            match chain.request_plugins().get(next) {
                Some(plugin) => {
                    let parent = self.active_request.replace(next);
                    let result = plugin.on_request(self).await;
                    self.active_request = parent;
                    result
                }
                None => self.run_operation_scope().await,
            }
        })
    }

    /// Resumes the pipeline from inside an operation-scope plugin: the
    /// remaining operation-scope pre-halves and the terminal stage.
    pub fn process_operation(&mut self) -> Continuation<'_> {
        Box::pin(async move {
            if self.phase != Phase::Operation {
                return Err(ProtocolError::OutOfScope {
                    scope: Scope::Operation,
                }
                .into());
            }
            let next = self.active_operation.map_or(0, |i| i + 1);
            if self.operation_cursor != next {
                tracing::warn!(operation = self.operation(), "operation continuation reused");
                return Err(ProtocolError::ContinuationReused {
                    scope: Scope::Operation,
                }
                .into());
            }
            self.operation_cursor = next + 1;

            let chain = self.chain;
            match chain.operation_plugins().get(next) {
                Some(plugin) => {
                    let parent = self.active_operation.replace(next);
                    let result = plugin.on_operation(self).await;
                    self.active_operation = parent;
                    result
                }
                None => {
                    let terminal = self.terminal;
                    self.phase = Phase::Terminal;
                    let result = terminal.invoke(self).await;
                    self.phase = Phase::Operation;
                    result
                }
            }
        })
    }

    async fn run_operation_scope(&mut self) -> Result<(), CallError> {
        let terminal = self.terminal;
        self.phase = Phase::Operation;
        let result = async {
            terminal.before_operation(self).await?;
            self.process_operation().await?;
            terminal.after_operation(self).await
        }
        .await;
        self.phase = Phase::Request;
        result
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("operation", &self.info.operation())
            .field("call_id", &self.info.call_id())
            .field("phase", &self.phase)
            .field("request", &self.request)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::traits::{OperationPlugin, RequestPlugin};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
    }

    #[async_trait]
    impl RequestPlugin for Recorder {
        async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            self.log.lock().push(format!("pre:{}", self.name));
            ctx.process_request().await?;
            self.log.lock().push(format!("post:{}", self.name));
            Ok(())
        }
    }

    #[async_trait]
    impl OperationPlugin for Recorder {
        async fn on_operation(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            self.log.lock().push(format!("pre:{}", self.name));
            ctx.process_operation().await?;
            self.log.lock().push(format!("post:{}", self.name));
            Ok(())
        }
    }

    /// Copies `x` from request to response and records each stage.
    struct EchoTerminal {
        log: Log,
        fail: bool,
    }

    #[async_trait]
    impl Terminal for EchoTerminal {
        async fn before_operation(&self, _ctx: &mut Context<'_>) -> Result<(), CallError> {
            self.log.lock().push("before".to_string());
            Ok(())
        }

        async fn invoke(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            self.log.lock().push("invoke".to_string());
            if self.fail {
                return Err(ctx.raise("BadInput", "boom"));
            }
            let (request, response, _) = ctx.split_mut();
            if let Some(x) = request.get("x") {
                response.set("x", x.clone());
            }
            Ok(())
        }

        async fn after_operation(&self, _ctx: &mut Context<'_>) -> Result<(), CallError> {
            self.log.lock().push("after".to_string());
            Ok(())
        }
    }

    fn info() -> CallInfo {
        let registry = ExceptionRegistry::new(["BadInput"]).unwrap();
        CallInfo::new("echo", 1, Arc::new(registry))
    }

    fn recorder(name: &'static str, log: &Log) -> Recorder {
        Recorder {
            name,
            log: log.clone(),
        }
    }

    #[tokio::test]
    async fn onion_ordering_in_both_scopes() {
        let log: Log = Arc::default();
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(recorder("r1", &log)));
        chain.push_request(Arc::new(recorder("r2", &log)));
        chain.push_operation(Arc::new(recorder("o1", &log)));
        chain.push_operation(Arc::new(recorder("o2", &log)));
        chain.push_operation(Arc::new(recorder("o3", &log)));
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };

        let mut ctx = Context::new(info(), &chain, &terminal)
            .with_request([("x", 5)].into_iter().collect());
        ctx.run().await.unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "pre:r1", "pre:r2", "before", "pre:o1", "pre:o2", "pre:o3", "invoke", "post:o3",
                "post:o2", "post:o1", "after", "post:r2", "post:r1",
            ]
        );
        assert_eq!(ctx.response().get("x"), Some(&Value::Int(5)));
    }

    #[tokio::test]
    async fn empty_chain_runs_terminal() {
        let log: Log = Arc::default();
        let chain = PluginChain::new();
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };
        let mut ctx = Context::new(info(), &chain, &terminal);
        ctx.run().await.unwrap();
        assert_eq!(*log.lock(), vec!["before", "invoke", "after"]);
    }

    struct ShortCircuit;

    #[async_trait]
    impl RequestPlugin for ShortCircuit {
        async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            ctx.response_mut().set("cached", true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn plugin_that_never_continues_skips_terminal() {
        let log: Log = Arc::default();
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(recorder("outer", &log)));
        chain.push_request(Arc::new(ShortCircuit));
        chain.push_request(Arc::new(recorder("inner", &log)));
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };

        let mut ctx = Context::new(info(), &chain, &terminal)
            .with_request([("x", 1)].into_iter().collect());
        ctx.run().await.unwrap();

        assert_eq!(*log.lock(), vec!["pre:outer", "post:outer"]);
        let (_, response) = ctx.into_response();
        assert_eq!(response, [("cached", true)].into_iter().collect());
    }

    struct Twice;

    #[async_trait]
    impl RequestPlugin for Twice {
        async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            ctx.process_request().await?;
            ctx.process_request().await
        }
    }

    #[tokio::test]
    async fn second_continuation_is_rejected() {
        let log: Log = Arc::default();
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(Twice));
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };

        let mut ctx = Context::new(info(), &chain, &terminal);
        let err = ctx.run().await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Protocol(ProtocolError::ContinuationReused {
                scope: Scope::Request
            })
        ));
        assert_eq!(log.lock().iter().filter(|e| *e == "invoke").count(), 1);
    }

    struct TwiceOperation;

    #[async_trait]
    impl OperationPlugin for TwiceOperation {
        async fn on_operation(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            ctx.process_operation().await?;
            ctx.process_operation().await
        }
    }

    #[tokio::test]
    async fn second_operation_continuation_is_rejected() {
        let log: Log = Arc::default();
        let mut chain = PluginChain::new();
        chain.push_operation(Arc::new(TwiceOperation));
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };

        let mut ctx = Context::new(info(), &chain, &terminal);
        let err = ctx.run().await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Protocol(ProtocolError::ContinuationReused {
                scope: Scope::Operation
            })
        ));
    }

    #[tokio::test]
    async fn context_runs_only_once() {
        let log: Log = Arc::default();
        let chain = PluginChain::new();
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };
        let mut ctx = Context::new(info(), &chain, &terminal);
        ctx.run().await.unwrap();
        assert!(ctx.run().await.is_err());
        assert_eq!(log.lock().len(), 3);
    }

    struct WrongScope;

    #[async_trait]
    impl RequestPlugin for WrongScope {
        async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            ctx.process_operation().await
        }
    }

    #[tokio::test]
    async fn operation_continuation_outside_operation_scope_fails() {
        let log: Log = Arc::default();
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(WrongScope));
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: false,
        };
        let mut ctx = Context::new(info(), &chain, &terminal);
        let err = ctx.run().await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Protocol(ProtocolError::OutOfScope {
                scope: Scope::Operation
            })
        ));
        assert!(log.lock().is_empty());
    }

    /// Records a rollback when anything inside fails, then re-raises.
    struct Rollback {
        log: Log,
    }

    #[async_trait]
    impl RequestPlugin for Rollback {
        async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            let result = ctx.process_request().await;
            if result.is_err() {
                self.log.lock().push("rollback".to_string());
            } else {
                self.log.lock().push("commit".to_string());
            }
            result
        }
    }

    #[tokio::test]
    async fn errors_propagate_out_of_continuations() {
        let log: Log = Arc::default();
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(Rollback { log: log.clone() }));
        chain.push_operation(Arc::new(recorder("o1", &log)));
        let terminal = EchoTerminal {
            log: log.clone(),
            fail: true,
        };

        let mut ctx = Context::new(info(), &chain, &terminal);
        let err = ctx.run().await.unwrap_err();
        assert!(err.is_exception("BadInput"));
        assert_eq!(*log.lock(), vec!["before", "pre:o1", "invoke", "rollback"]);
    }

    struct Tagger;

    #[async_trait]
    impl RequestPlugin for Tagger {
        async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            ctx.metadata_mut().insert("user".to_string(), Value::from("admin"));
            ctx.process_request().await
        }
    }

    struct MetadataTerminal;

    #[async_trait]
    impl Terminal for MetadataTerminal {
        async fn invoke(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
            let (_, response, info) = ctx.split_mut();
            if let Some(user) = info.metadata().get("user") {
                response.set("seen", user.clone());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn metadata_flows_between_scopes() {
        let mut chain = PluginChain::new();
        chain.push_request(Arc::new(Tagger));
        let terminal = MetadataTerminal;
        let mut ctx = Context::new(info(), &chain, &terminal);
        ctx.run().await.unwrap();
        assert_eq!(ctx.response().get("seen").and_then(Value::as_str), Some("admin"));
        assert_eq!(ctx.operation(), "echo");
    }

    #[test]
    fn raise_undeclared_name_is_usage_error() {
        let info = info();
        assert!(matches!(
            info.raise("Nope", "x"),
            CallError::UnknownException(_)
        ));
        assert!(info.raise("BadInput", "x").is_exception("BadInput"));
    }
}
