//! Service listing shared by the reflection service and the HTTP debug page.

use serde::{Deserialize, Serialize};

use crate::{serde_from_slice, serde_into_bytes, Result, RpcParam, SerializeType};

/// reserved service path answered by servers with reflection enabled.
pub const REFLECTION_SERVICE_PATH: &str = "arpc.Reflection";
pub const LIST_SERVICES: &str = "ListServices";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    /// free-form signature description given at registration.
    pub meta: String,
    pub calls: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub methods: Vec<MethodInfo>,
}

impl ServiceInfo {
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<ServiceInfo>,
}

impl ServiceList {
    pub fn service(&self, name: &str) -> Option<&ServiceInfo> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl RpcParam for ServiceList {
    fn into_bytes(&self, st: SerializeType) -> Result<Vec<u8>> {
        serde_into_bytes(self, st)
    }
    fn from_slice(&mut self, st: SerializeType, data: &[u8]) -> Result<()> {
        *self = serde_from_slice(st, data)?;
        Ok(())
    }
}
