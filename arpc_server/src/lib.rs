pub mod http;
pub mod registry;
pub mod server;

pub use http::HttpServer;
pub use registry::{Registry, ServiceFn};
pub use server::Server;

pub use arpc_protocol::{Error, ErrorKind, Result, RpcParam, SerializeType};

/// Implemented by both servers so services can be bound to either transport.
pub trait Register {
    fn register_fn(&mut self, service_path: &str, service_method: &str, meta: &str, f: ServiceFn);
}

/// Registers a typed handler `Fn(Args) -> Result<Reply>` under `service_path.service_method`.
#[macro_export]
macro_rules! register_func {
    ($rpc_server:expr, $service_path:expr, $service_method:expr, $service_fn:expr, $arg_type:ty, $reply_type:ty) => {
        $crate::register_func!(
            $rpc_server,
            $service_path,
            $service_method,
            $service_fn,
            "",
            $arg_type,
            $reply_type
        )
    };
    ($rpc_server:expr, $service_path:expr, $service_method:expr, $service_fn:expr, $meta:expr, $arg_type:ty, $reply_type:ty) => {{
        let service_fn = $service_fn;
        let f: $crate::ServiceFn = ::std::sync::Arc::new(
            move |x: &[u8], st: $crate::SerializeType| -> $crate::Result<Vec<u8>> {
                let mut args: $arg_type = Default::default();
                $crate::RpcParam::from_slice(&mut args, st, x)?;
                let reply: $reply_type = service_fn(args)?;
                $crate::RpcParam::into_bytes(&reply, st)
            },
        );
        $crate::Register::register_fn(&mut $rpc_server, $service_path, $service_method, $meta, f);
    }};
}

impl<T: Register + ?Sized> Register for &mut T {
    fn register_fn(&mut self, service_path: &str, service_method: &str, meta: &str, f: ServiceFn) {
        (**self).register_fn(service_path, service_method, meta, f)
    }
}
