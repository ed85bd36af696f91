//! Switchboard core: API description, dynamic values, declared exceptions,
//! the two-scope plugin chain, and wire codecs shared by service and client.

pub mod chain;
pub mod context;
pub mod error;
pub mod exceptions;
pub mod schema;
pub mod traits;
pub mod types;
pub mod wire;

pub use chain::{PluginChain, Scope};
pub use context::{CallInfo, Context, Continuation, Metadata};
pub use error::{CallError, ProtocolError, SetupError, TransportError};
pub use exceptions::{ExceptionKind, ExceptionRegistry, ServiceException, UnknownExceptionError};
pub use schema::{ApiDescription, Endpoint, PathPattern};
pub use traits::{OperationPlugin, RequestPlugin, Terminal, Transport, TransportReply, WireCodec};
pub use types::{Fields, Value};
pub use wire::{JsonCodec, MsgPackCodec, WireResponse};
