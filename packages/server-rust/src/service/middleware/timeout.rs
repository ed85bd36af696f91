//! Timeout plugin for the operation scope.
//!
//! Fails calls whose operation scope runs longer than the configured limit
//! with `CallError::Timeout`.

use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::{CallError, Context, OperationPlugin, Value};

/// Metadata key an outer plugin can set to override the timeout of one call.
pub const TIMEOUT_METADATA_KEY: &str = "timeout_ms";

// ---------------------------------------------------------------------------
// TimeoutPlugin
// ---------------------------------------------------------------------------

/// Operation-scope plugin enforcing a per-call deadline on everything inside it.
///
/// The limit is read from the call's `timeout_ms` metadata entry when present,
/// so different calls can carry different timeouts.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPlugin {
    default_timeout_ms: u64,
}

impl TimeoutPlugin {
    #[must_use]
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }

    fn timeout_for(&self, ctx: &Context<'_>) -> u64 {
        ctx.metadata()
            .get(TIMEOUT_METADATA_KEY)
            .and_then(Value::as_i64)
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(self.default_timeout_ms)
    }
}

#[async_trait]
impl OperationPlugin for TimeoutPlugin {
    async fn on_operation(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let timeout_ms = self.timeout_for(ctx);
        let duration = Duration::from_millis(timeout_ms);
        match tokio::time::timeout(duration, ctx.process_operation()).await {
            Ok(result) => result,
            Err(_elapsed) => Err(CallError::Timeout { timeout_ms }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
