//! Names shared by the HTTP transport's client and server.

/// path the HTTP server dispatches calls on.
pub const RPC_PATH: &str = "/_arpc_";
/// path serving the JSON service listing.
pub const DEBUG_PATH: &str = "/debug/arpc";

pub const HEADER_MESSAGE_ID: &str = "x-arpc-messageid";
pub const HEADER_SERIALIZE_TYPE: &str = "x-arpc-serializetype";
pub const HEADER_SERVICE_PATH: &str = "x-arpc-servicepath";
pub const HEADER_SERVICE_METHOD: &str = "x-arpc-servicemethod";
pub const HEADER_MESSAGE_STATUS_TYPE: &str = "x-arpc-messagestatustype";
pub const HEADER_ERROR_MESSAGE: &str = "x-arpc-errormessage";
