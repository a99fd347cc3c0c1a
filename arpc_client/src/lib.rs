pub mod client;
pub mod http;

pub use client::*;
pub use http::HttpClient;

use std::time::Duration;

use async_trait::async_trait;
use arpc_protocol::{CompressType, Metadata, Result, RpcParam, SerializeType};

#[derive(Debug, Copy, Clone)]
pub struct Opt {
    pub compress_type: CompressType,
    pub serialize_type: SerializeType,
    /// zero means the OS default.
    pub connect_timeout: Duration,
    /// per-call deadline, zero means none.
    pub timeout: Duration,
    pub nodelay: Option<bool>,
}

impl Default for Opt {
    fn default() -> Self {
        Opt {
            compress_type: CompressType::CompressNone,
            serialize_type: SerializeType::JSON,
            connect_timeout: Default::default(),
            timeout: Default::default(),
            nodelay: None,
        }
    }
}

/// A started client able to issue calls.
#[async_trait]
pub trait RpcClient {
    async fn call<T>(
        &self,
        service_path: &str,
        service_method: &str,
        metadata: &Metadata,
        args: &(dyn RpcParam + Sync),
    ) -> Result<T>
    where
        T: RpcParam + Default + Send;
}
