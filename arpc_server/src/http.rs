//! HTTP transport: one POST per call on a fixed path.

use std::convert::Infallible;
use std::net::SocketAddr;

use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::{AddrIncoming, AddrStream};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use num_traits::FromPrimitive;
use tokio::net::TcpListener;
use tracing::debug;

use arpc_protocol::http::*;
use arpc_protocol::{Error, ErrorKind, MessageStatusType, Result, SerializeType};

use crate::{Register, Registry, ServiceFn};

pub struct HttpServer {
    pub addr: String,
    registry: Registry,
}

impl HttpServer {
    pub fn new(addr: String) -> Self {
        HttpServer {
            addr,
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self
            .addr
            .parse::<SocketAddr>()
            .map_err(|err| Error::new(ErrorKind::Other, err))?;
        Ok(TcpListener::bind(&addr).await?)
    }

    pub async fn start(&self) -> Result<()> {
        let listener = self.bind().await?;
        debug!("listening on: {}", listener.local_addr()?);
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let incoming =
            AddrIncoming::from_listener(listener).map_err(|err| Error::new(ErrorKind::Network, err))?;

        let registry = self.registry.clone();
        let make_svc = make_service_fn(move |conn: &AddrStream| {
            debug!(peer = %conn.remote_addr(), "accepted connection");
            let registry = registry.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let registry = registry.clone();
                    async move { Ok::<_, Infallible>(route(&registry, req).await) }
                }))
            }
        });

        hyper::Server::builder(incoming)
            .serve(make_svc)
            .await
            .map_err(|err| Error::new(ErrorKind::Network, err))
    }
}

impl Register for HttpServer {
    fn register_fn(&mut self, service_path: &str, service_method: &str, meta: &str, f: ServiceFn) {
        self.registry
            .register_fn(service_path, service_method, meta, f);
    }
}

async fn route(registry: &Registry, req: Request<Body>) -> Response<Body> {
    match (req.method(), req.uri().path()) {
        (&Method::POST, RPC_PATH) => call(registry, req).await,
        (&Method::GET, DEBUG_PATH) => debug_page(registry),
        (_, RPC_PATH) | (_, DEBUG_PATH) => {
            plain(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => plain(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn call(registry: &Registry, req: Request<Body>) -> Response<Body> {
    let (service_path, service_method, serialize_type, message_id) = {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        (
            header(HEADER_SERVICE_PATH),
            header(HEADER_SERVICE_METHOD),
            header(HEADER_SERIALIZE_TYPE),
            req.headers().get(HEADER_MESSAGE_ID).cloned(),
        )
    };

    let (service_path, service_method) = match (service_path, service_method) {
        (Some(path), Some(method)) => (path, method),
        _ => return plain(StatusCode::BAD_REQUEST, "missing service path or method"),
    };
    let st = match serialize_type {
        None => SerializeType::JSON,
        Some(v) => match v.parse::<u8>().ok().and_then(SerializeType::from_u8) {
            Some(st) => st,
            None => return plain(StatusCode::BAD_REQUEST, "invalid serialize type"),
        },
    };

    let body = match hyper::body::to_bytes(req.into_body()).await {
        Ok(body) => body,
        Err(err) => return plain(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let result = registry
        .dispatch(&service_path, &service_method, body.to_vec(), st)
        .await;

    let mut res = match result {
        Ok(reply) => {
            let mut res = Response::new(Body::from(reply));
            set_header(&mut res, HEADER_MESSAGE_STATUS_TYPE, MessageStatusType::Normal.to_string());
            res
        }
        Err(err) => {
            debug!(%service_path, %service_method, "call failed: {}", err);
            let msg = err.to_string();
            let mut res = Response::new(Body::from(msg.clone()));
            set_header(&mut res, HEADER_MESSAGE_STATUS_TYPE, MessageStatusType::Error.to_string());
            set_header(&mut res, HEADER_ERROR_MESSAGE, msg);
            res
        }
    };
    set_header(&mut res, HEADER_SERIALIZE_TYPE, (st as u8).to_string());
    if let Some(id) = message_id {
        res.headers_mut()
            .insert(HeaderName::from_static(HEADER_MESSAGE_ID), id);
    }
    res
}

fn debug_page(registry: &Registry) -> Response<Body> {
    match serde_json::to_vec(&registry.services()) {
        Ok(data) => {
            let mut res = Response::new(Body::from(data));
            res.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            res
        }
        Err(err) => plain(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

fn plain(status: StatusCode, msg: &str) -> Response<Body> {
    let mut res = Response::new(Body::from(msg.to_owned()));
    *res.status_mut() = status;
    res
}

/// Values that are not valid header text are dropped; the body still carries them.
fn set_header(res: &mut Response<Body>, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        res.headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}
