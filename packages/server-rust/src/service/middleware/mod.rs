//! Built-in plugins for the call pipeline.
//!
//! - [`timeout`]: Per-call timeout enforcement
//! - [`trace`]: Call timing and outcome via `tracing` spans
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Installs the standard plugins on a service builder

pub mod load_shed;
pub mod pipeline;
pub mod timeout;
pub mod trace;

pub use load_shed::LoadShedPlugin;
pub use pipeline::install_standard_plugins;
pub use timeout::{TimeoutPlugin, TIMEOUT_METADATA_KEY};
pub use trace::TracePlugin;
