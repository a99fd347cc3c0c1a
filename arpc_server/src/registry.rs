use std::collections::{BTreeMap, HashMap};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, PoisonError, RwLock,
};

use tracing::{debug, error};

use arpc_protocol::{
    Error, ErrorKind, MethodInfo, Result, RpcParam, SerializeType, ServiceInfo, ServiceList,
    LIST_SERVICES, REFLECTION_SERVICE_PATH,
};

use crate::Register;

/// A registered handler: raw request payload in, raw reply payload out.
pub type ServiceFn = Arc<dyn Fn(&[u8], SerializeType) -> Result<Vec<u8>> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    service_path: String,
    service_method: String,
    meta: String,
    f: ServiceFn,
    calls: Arc<AtomicU64>,
}

/// Handlers keyed by `service_path.service_method`, shared by every connection.
#[derive(Clone, Default)]
pub struct Registry {
    services: Arc<RwLock<HashMap<String, Entry>>>,
    reflection: Arc<AtomicBool>,
}

fn key(service_path: &str, service_method: &str) -> String {
    format!("{}.{}", service_path, service_method)
}

impl Registry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get_fn(&self, service_path: &str, service_method: &str) -> Option<ServiceFn> {
        self.entry(service_path, service_method).map(|e| e.f)
    }

    fn entry(&self, service_path: &str, service_method: &str) -> Option<Entry> {
        let map = self.services.read().unwrap_or_else(PoisonError::into_inner);
        map.get(&key(service_path, service_method)).cloned()
    }

    /// Answers `arpc.Reflection.ListServices` from now on.
    pub fn enable_reflection(&self) {
        self.reflection.store(true, Ordering::SeqCst);
    }

    pub fn reflection_enabled(&self) -> bool {
        self.reflection.load(Ordering::SeqCst)
    }

    /// Lists services and their methods, both sorted by name.
    pub fn services(&self) -> ServiceList {
        let mut grouped: BTreeMap<String, Vec<MethodInfo>> = BTreeMap::new();
        {
            let map = self.services.read().unwrap_or_else(PoisonError::into_inner);
            for entry in map.values() {
                grouped
                    .entry(entry.service_path.clone())
                    .or_default()
                    .push(MethodInfo {
                        name: entry.service_method.clone(),
                        meta: entry.meta.clone(),
                        calls: entry.calls.load(Ordering::Relaxed),
                    });
            }
        }
        if self.reflection_enabled() {
            grouped
                .entry(REFLECTION_SERVICE_PATH.to_owned())
                .or_default()
                .push(MethodInfo {
                    name: LIST_SERVICES.to_owned(),
                    meta: "() -> ServiceList".to_owned(),
                    calls: 0,
                });
        }

        let services = grouped
            .into_iter()
            .map(|(name, mut methods)| {
                methods.sort_by(|a, b| a.name.cmp(&b.name));
                ServiceInfo { name, methods }
            })
            .collect();
        ServiceList { services }
    }

    /// Runs the handler registered for `service_path.service_method`.
    ///
    /// Handlers run on the blocking pool; a panicking handler fails only
    /// its own call.
    pub async fn dispatch(
        &self,
        service_path: &str,
        service_method: &str,
        payload: Vec<u8>,
        st: SerializeType,
    ) -> Result<Vec<u8>> {
        if service_path == REFLECTION_SERVICE_PATH
            && service_method == LIST_SERVICES
            && self.reflection_enabled()
        {
            return self.services().into_bytes(st);
        }

        let entry = self.entry(service_path, service_method).ok_or_else(|| {
            Error::new(
                ErrorKind::Server,
                format!("can not find service {}", key(service_path, service_method)),
            )
        })?;
        entry.calls.fetch_add(1, Ordering::Relaxed);
        debug!(service_path, service_method, "dispatching call");

        let f = entry.f;
        match tokio::task::spawn_blocking(move || f(&payload, st)).await {
            Ok(reply) => reply,
            Err(err) if err.is_panic() => {
                error!(service_path, service_method, "service handler panicked");
                Err(Error::new(ErrorKind::Server, "service handler panicked"))
            }
            Err(err) => Err(Error::new(ErrorKind::Server, err)),
        }
    }
}

impl Register for Registry {
    fn register_fn(&mut self, service_path: &str, service_method: &str, meta: &str, f: ServiceFn) {
        let entry = Entry {
            service_path: service_path.to_owned(),
            service_method: service_method.to_owned(),
            meta: meta.to_owned(),
            f,
            calls: Arc::new(AtomicU64::new(0)),
        };
        let mut map = self.services.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key(service_path, service_method), entry);
        debug!(service_path, service_method, "registered service method");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register_func;
    use bytes::BytesMut;

    fn echo(args: BytesMut) -> Result<BytesMut> {
        Ok(args)
    }

    fn fail(_: BytesMut) -> Result<BytesMut> {
        Err(Error::new(ErrorKind::InvalidArgument, "bad input"))
    }

    fn explode(_: BytesMut) -> Result<BytesMut> {
        panic!("handler blew up")
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        register_func!(registry, "Echo", "Echo", echo, "bytes -> bytes", BytesMut, BytesMut);
        register_func!(registry, "Echo", "Fail", fail, BytesMut, BytesMut);
        register_func!(registry, "Echo", "Explode", explode, BytesMut, BytesMut);
        registry
    }

    #[test]
    fn get_fn_calls_registered_handler() {
        let registry = registry();
        let f = registry.get_fn("Echo", "Echo").unwrap();
        let reply = f(br#"{"A":1,"B":2}"#, SerializeType::JSON).unwrap();
        assert_eq!(br#"{"A":1,"B":2}"#.to_vec(), reply);
        assert!(registry.get_fn("Echo", "Missing").is_none());
    }

    #[tokio::test]
    async fn dispatch_reports_handler_errors() {
        let registry = registry();
        let reply = registry
            .dispatch("Echo", "Echo", b"hi".to_vec(), SerializeType::JSON)
            .await
            .unwrap();
        assert_eq!(b"hi".to_vec(), reply);

        let err = registry
            .dispatch("Echo", "Fail", Vec::new(), SerializeType::JSON)
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidArgument, err.kind());
        assert_eq!("bad input", err.to_string());
    }

    #[tokio::test]
    async fn dispatch_unknown_method() {
        let err = registry()
            .dispatch("Echo", "Nope", Vec::new(), SerializeType::JSON)
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Server, err.kind());
        assert_eq!("can not find service Echo.Nope", err.to_string());
    }

    #[tokio::test]
    async fn panicking_handler_fails_only_its_call() {
        let registry = registry();
        let err = registry
            .dispatch("Echo", "Explode", Vec::new(), SerializeType::JSON)
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Server, err.kind());
        assert_eq!("service handler panicked", err.to_string());

        assert!(registry
            .dispatch("Echo", "Echo", b"still up".to_vec(), SerializeType::JSON)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn reflection_lists_services_with_call_counts() {
        let registry = registry();
        let err = registry
            .dispatch(REFLECTION_SERVICE_PATH, LIST_SERVICES, Vec::new(), SerializeType::JSON)
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Server, err.kind());

        registry.enable_reflection();
        registry
            .dispatch("Echo", "Echo", Vec::new(), SerializeType::JSON)
            .await
            .unwrap();
        let data = registry
            .dispatch(REFLECTION_SERVICE_PATH, LIST_SERVICES, Vec::new(), SerializeType::JSON)
            .await
            .unwrap();
        let mut list = ServiceList::default();
        list.from_slice(SerializeType::JSON, &data).unwrap();

        let names: Vec<&str> = list.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(vec!["Echo", REFLECTION_SERVICE_PATH], names);
        let echo = list.service("Echo").unwrap();
        let methods: Vec<&str> = echo.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(vec!["Echo", "Explode", "Fail"], methods);
        assert_eq!(1, echo.method("Echo").unwrap().calls);
        assert_eq!("bytes -> bytes", echo.method("Echo").unwrap().meta);
    }
}
