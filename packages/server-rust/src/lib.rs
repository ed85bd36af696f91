//! Switchboard server: binds handlers to a declared API, runs calls through
//! the plugin chain, and serves them over HTTP with axum.

pub mod network;
pub mod service;
pub mod traits;

pub use network::{NetworkConfig, NetworkModule, ShutdownController};
pub use service::middleware::{
    install_standard_plugins, LoadShedPlugin, TimeoutPlugin, TracePlugin,
};
pub use service::{LoopbackTransport, Reply, ReplyStatus, ServerConfig, Service, ServiceBuilder};
pub use traits::{FnHandler, Handler};
