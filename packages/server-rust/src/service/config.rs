/// Largest request body the service accepts, in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 102_400;

/// Server-level configuration for dispatch and the built-in plugins.
///
/// Controls the body size limit, concurrency limits and call timeouts.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Requests with a larger body are rejected before any plugin runs.
    pub max_body_bytes: usize,
    /// Maximum number of concurrent calls before load shedding.
    pub max_concurrent_calls: u32,
    /// Default timeout for the operation scope in milliseconds.
    pub default_call_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_concurrent_calls: 1000,
            default_call_timeout_ms: 30_000,
        }
    }
}
