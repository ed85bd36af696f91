//! Tracing plugin for calls.
//!
//! Records call duration and outcome on a `tracing` span wrapping the whole
//! request scope below it.

use std::time::Instant;

use async_trait::async_trait;
use switchboard_core::{CallError, Context, RequestPlugin};
use tracing::{info_span, Instrument};

// ---------------------------------------------------------------------------
// TracePlugin
// ---------------------------------------------------------------------------

/// Request-scope plugin that instruments calls with timing and outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracePlugin;

/// Short label for a call result, recorded on the span.
#[must_use]
pub fn outcome(result: &Result<(), CallError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(CallError::Exception(_)) => "exception",
        Err(CallError::Timeout { .. }) => "timeout",
        Err(CallError::Overloaded) => "overloaded",
        Err(_) => "error",
    }
}

#[async_trait]
impl RequestPlugin for TracePlugin {
    async fn on_request(&self, ctx: &mut Context<'_>) -> Result<(), CallError> {
        let operation = ctx.operation().to_string();
        let call_id = ctx.call_id();

        let span = info_span!(
            "call",
            operation = %operation,
            call_id = call_id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = ctx.process_request().await;

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;
            let outcome = outcome(&result);
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);

            tracing::info!(
                operation = %operation,
                call_id = call_id,
                duration_ms = duration_ms,
                outcome = outcome,
                "call complete"
            );

            result
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
