//! Standard plugin stack: load shedding, tracing and timeouts.

use super::load_shed::LoadShedPlugin;
use super::timeout::TimeoutPlugin;
use super::trace::TracePlugin;
use crate::service::config::ServerConfig;
use crate::service::router::ServiceBuilder;

/// Registers the built-in plugins on `builder`.
///
/// Order (outermost to innermost):
/// 1. `LoadShedPlugin` (request scope): reject when overloaded, before any work
/// 2. `TracePlugin` (request scope): record timing and outcome of the call
/// 3. `TimeoutPlugin` (operation scope): bound the decoded call
///
/// Call this before registering application plugins so they run inside the
/// standard ones.
pub fn install_standard_plugins<'b>(
    builder: &'b mut ServiceBuilder,
    config: &ServerConfig,
) -> &'b mut ServiceBuilder {
    builder
        .request_plugin(LoadShedPlugin::new(config.max_concurrent_calls))
        .request_plugin(TracePlugin)
        .operation_plugin(TimeoutPlugin::new(config.default_call_timeout_ms))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
