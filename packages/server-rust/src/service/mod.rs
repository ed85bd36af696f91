//! Operation dispatch framework.
//!
//! This module implements the server side of a call:
//!
//! 1. **Registration** (`registry`, `router`): bind declared operations to handlers
//! 2. **Plugins** (`middleware`): built-in load-shedding, tracing and timeouts
//! 3. **Dispatch** (`router`): decode, run the plugin chain and handler, encode
//! 4. **Classification** (`classify`): failed call -> error envelope and status
//! 5. **Loopback** (`loopback`): in-process transport for clients and tests

pub mod classify;
pub mod config;
pub mod loopback;
pub mod middleware;
pub mod operation;
pub mod registry;
pub mod router;

// Re-export key types for convenient access.
pub use classify::{classify_error, Classification};
pub use config::ServerConfig;
pub use loopback::LoopbackTransport;
pub use operation::{Reply, ReplyStatus};
pub use registry::HandlerRegistry;
pub use router::{Service, ServiceBuilder};
