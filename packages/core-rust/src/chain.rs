//! Ordered plugin lists for the two pipeline scopes.

use std::fmt;
use std::sync::Arc;

use crate::traits::{OperationPlugin, RequestPlugin};

/// The two nesting levels of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Wraps raw body handling; plugins see the context only.
    Request,
    /// Wraps the decoded request/response pair.
    Operation,
}

impl Scope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Request => "request",
            Scope::Operation => "operation",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scope and operation-scope plugins in registration order.
///
/// Frozen once the owning service or client is built; [`crate::Context`]
/// walks it with a cursor per scope.
#[derive(Clone, Default)]
pub struct PluginChain {
    request: Vec<Arc<dyn RequestPlugin>>,
    operation: Vec<Arc<dyn OperationPlugin>>,
}

impl PluginChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_request(&mut self, plugin: Arc<dyn RequestPlugin>) {
        self.request.push(plugin);
    }

    pub fn push_operation(&mut self, plugin: Arc<dyn OperationPlugin>) {
        self.operation.push(plugin);
    }

    #[must_use]
    pub fn request_plugins(&self) -> &[Arc<dyn RequestPlugin>] {
        &self.request
    }

    #[must_use]
    pub fn operation_plugins(&self) -> &[Arc<dyn OperationPlugin>] {
        &self.operation
    }
}

impl fmt::Debug for PluginChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginChain")
            .field("request", &self.request.len())
            .field("operation", &self.operation.len())
            .finish()
    }
}
