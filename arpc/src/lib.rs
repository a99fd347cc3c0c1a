//! One import for services, clients and their parameter types.
//!
//! Types deriving `RpcParam` expand to paths under `::arpc`, so crates using
//! the derive depend on this crate rather than on the parts.

pub use arpc_client::*;
pub use arpc_derive::*;
pub use arpc_protocol::*;
pub use arpc_server::*;

/// Both ends of the HTTP transport and its header names.
pub mod http {
    pub use arpc_client::HttpClient;
    pub use arpc_protocol::http::*;
    pub use arpc_server::HttpServer;
}
