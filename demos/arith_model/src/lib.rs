//! The `Arith` service shared by both transports: its messages, its handler
//! trait and a typed client.

use arpc::*;
use serde::{Deserialize, Serialize};

pub const SERVICE_PATH: &str = "Arith";
pub const MULTIPLY: &str = "Multiply";
pub const DIVIDE: &str = "Divide";

#[derive(RpcParam, Clone, Copy, PartialEq, prost::Message, Serialize, Deserialize)]
#[rpc_param(protobuf)]
pub struct Args {
    #[prost(int64, tag = "1")]
    #[serde(rename = "A")]
    pub a: i64,
    #[prost(int64, tag = "2")]
    #[serde(rename = "B")]
    pub b: i64,
}

#[derive(RpcParam, Clone, Copy, PartialEq, prost::Message, Serialize, Deserialize)]
#[rpc_param(protobuf)]
pub struct Production {
    #[prost(int64, tag = "1")]
    #[serde(rename = "Value")]
    pub value: i64,
}

#[derive(RpcParam, Clone, Copy, PartialEq, prost::Message, Serialize, Deserialize)]
#[rpc_param(protobuf)]
pub struct Quotient {
    #[prost(int64, tag = "1")]
    #[serde(rename = "Quo")]
    pub quo: i64,
    #[prost(int64, tag = "2")]
    #[serde(rename = "Rem")]
    pub rem: i64,
}

impl Args {
    pub fn new(a: i64, b: i64) -> Self {
        Args { a, b }
    }
}

/// Handlers behind `Arith.Multiply` and `Arith.Divide`.
pub trait Arith: Send + Sync + 'static {
    fn multiply(&self, args: Args) -> Result<Production>;
    fn divide(&self, args: Args) -> Result<Quotient>;
}

/// Binds `arith` to `Arith.Multiply` and `Arith.Divide` on either server.
pub fn register<S: Register, A: Arith>(server: &mut S, arith: A) {
    let arith = std::sync::Arc::new(arith);

    let svc = arith.clone();
    register_func!(
        *server,
        SERVICE_PATH,
        MULTIPLY,
        move |args: Args| svc.multiply(args),
        "Args -> Production",
        Args,
        Production
    );

    let svc = arith;
    register_func!(
        *server,
        SERVICE_PATH,
        DIVIDE,
        move |args: Args| svc.divide(args),
        "Args -> Quotient",
        Args,
        Quotient
    );
}

/// Typed calls to `Arith` over any started client.
pub struct ArithClient<'a, C> {
    client: &'a C,
    metadata: Metadata,
}

impl<'a, C: RpcClient> ArithClient<'a, C> {
    pub fn new(client: &'a C) -> Self {
        ArithClient {
            client,
            metadata: Metadata::new(),
        }
    }

    pub async fn multiply(&self, args: Args) -> Result<Production> {
        self.client
            .call(SERVICE_PATH, MULTIPLY, &self.metadata, &args)
            .await
    }

    pub async fn divide(&self, args: Args) -> Result<Quotient> {
        self.client
            .call(SERVICE_PATH, DIVIDE, &self.metadata, &args)
            .await
    }
}
