//! Switchboard client: calls the operations of a declared API through the
//! same two-scope plugin chain the service uses.

pub mod client;
pub mod transport;

pub use client::{Client, ClientBuilder, OperationHandle};
pub use transport::HttpTransport;
