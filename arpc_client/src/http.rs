//! Client side of the HTTP transport.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future;
use hyper::client::conn::{self, SendRequest};
use hyper::header::HOST;
use hyper::{Body, Method, Request, Response, StatusCode};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use arpc_protocol::http::*;
use arpc_protocol::{
    Error, ErrorKind, MessageStatusType, Metadata, Result, RpcParam, SerializeType, ServiceList,
};

use super::{Opt, RpcClient};

/// Keeps one HTTP/1.1 connection to an `HttpServer`.
pub struct HttpClient {
    pub opt: Opt,
    addr: String,
    seq: AtomicU64,
    sender: Mutex<Option<SendRequest<Body>>>,
}

impl HttpClient {
    pub fn new(addr: &str) -> HttpClient {
        HttpClient {
            opt: Default::default(),
            addr: String::from(addr),
            seq: AtomicU64::new(0),
            sender: Mutex::new(None),
        }
    }

    /// Dials the server; fails when it is unreachable.
    pub async fn start(&mut self) -> Result<()> {
        let connect = TcpStream::connect(self.addr.as_str());
        let stream = if self.opt.connect_timeout.is_zero() {
            connect.await?
        } else {
            tokio::time::timeout(self.opt.connect_timeout, connect)
                .await
                .map_err(|_| {
                    Error::new(
                        ErrorKind::Timeout,
                        format!("connecting to {} timed out", self.addr),
                    )
                })??
        };
        if let Some(nodelay) = self.opt.nodelay {
            stream.set_nodelay(nodelay)?;
        }

        let (sender, connection) = conn::handshake(stream)
            .await
            .map_err(|err| Error::new(ErrorKind::Network, err))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!("connection closed: {}", err);
            }
        });
        *self.sender.get_mut() = Some(sender);
        Ok(())
    }

    /// Drops the connection; the server sees it close once in-flight calls finish.
    pub fn close(&mut self) {
        self.sender.get_mut().take();
    }

    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>> {
        // one request at a time owns the connection.
        let exchange = async {
            let mut guard = self.sender.lock().await;
            let sender = guard
                .as_mut()
                .ok_or_else(|| Error::new(ErrorKind::Client, "client is not started"))?;
            future::poll_fn(|cx| sender.poll_ready(cx))
                .await
                .map_err(|err| Error::new(ErrorKind::Network, err))?;
            sender
                .send_request(req)
                .await
                .map_err(|err| Error::new(ErrorKind::Network, err))
        };

        if self.opt.timeout.is_zero() {
            exchange.await
        } else {
            tokio::time::timeout(self.opt.timeout, exchange)
                .await
                .map_err(|_| {
                    Error::new(
                        ErrorKind::Timeout,
                        format!("call timed out after {:?}", self.opt.timeout),
                    )
                })?
        }
    }

    /// Sends one call and returns the raw reply body.
    pub async fn send(
        &self,
        service_path: &str,
        service_method: &str,
        st: SerializeType,
        metadata: &Metadata,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(RPC_PATH)
            .header(HOST, self.addr.as_str())
            .header(HEADER_MESSAGE_ID, seq)
            .header(HEADER_SERIALIZE_TYPE, st as u8 as u64)
            .header(HEADER_SERVICE_PATH, service_path)
            .header(HEADER_SERVICE_METHOD, service_method);
        for (k, v) in metadata {
            builder = builder.header(k.as_str(), v.as_str());
        }
        let req = builder
            .body(Body::from(payload))
            .map_err(|err| Error::new(ErrorKind::Client, err))?;

        let res = self.round_trip(req).await?;
        let status = res.status();
        let failed = res
            .headers()
            .get(HEADER_MESSAGE_STATUS_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| MessageStatusType::from_str(v).ok())
            == Some(MessageStatusType::Error);
        let body = hyper::body::to_bytes(res.into_body())
            .await
            .map_err(|err| Error::new(ErrorKind::Network, err))?;

        if status != StatusCode::OK {
            return Err(Error::new(
                ErrorKind::Client,
                format!("{}: {}", status, String::from_utf8_lossy(&body)),
            ));
        }
        if failed {
            return Err(Error::new(
                ErrorKind::Server,
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        Ok(body.to_vec())
    }

    /// Fetches the service listing from the debug path.
    pub async fn list_services(&self) -> Result<ServiceList> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(DEBUG_PATH)
            .header(HOST, self.addr.as_str())
            .body(Body::empty())
            .map_err(|err| Error::new(ErrorKind::Client, err))?;
        let res = self.round_trip(req).await?;
        if res.status() != StatusCode::OK {
            return Err(Error::new(
                ErrorKind::Client,
                format!("unexpected status {}", res.status()),
            ));
        }
        let body = hyper::body::to_bytes(res.into_body())
            .await
            .map_err(|err| Error::new(ErrorKind::Network, err))?;

        let mut list = ServiceList::default();
        list.from_slice(SerializeType::JSON, &body)?;
        Ok(list)
    }
}

#[async_trait]
impl RpcClient for HttpClient {
    async fn call<T>(
        &self,
        service_path: &str,
        service_method: &str,
        metadata: &Metadata,
        args: &(dyn RpcParam + Sync),
    ) -> Result<T>
    where
        T: RpcParam + Default + Send,
    {
        let st = self.opt.serialize_type;
        let payload = args.into_bytes(st)?;
        let data = self
            .send(service_path, service_method, st, metadata, payload)
            .await?;

        let mut reply: T = Default::default();
        reply.from_slice(st, &data)?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arpc_server::{register_func, HttpServer};
    use bytes::BytesMut;
    use tokio::net::TcpListener;

    fn echo(args: BytesMut) -> Result<BytesMut> {
        Ok(args)
    }

    fn reject(_: BytesMut) -> Result<BytesMut> {
        Err(Error::new(ErrorKind::InvalidArgument, "rejected"))
    }

    async fn serve() -> String {
        let mut server = HttpServer::new("127.0.0.1:0".to_owned());
        register_func!(server, "Echo", "Echo", echo, "bytes -> bytes", BytesMut, BytesMut);
        register_func!(server, "Echo", "Reject", reject, BytesMut, BytesMut);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move { server.serve(listener).await });
        addr
    }

    #[tokio::test]
    async fn call_over_http() {
        let addr = serve().await;
        let mut c = HttpClient::new(&addr);
        c.start().await.unwrap();

        let args = BytesMut::from(&br#"{"A":9,"B":4}"#[..]);
        let reply: BytesMut = c.call("Echo", "Echo", &Metadata::new(), &args).await.unwrap();
        assert_eq!(&args[..], &reply[..]);

        let err = c
            .call::<BytesMut>("Echo", "Reject", &Metadata::new(), &args)
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Server, err.kind());
        assert_eq!("rejected", err.to_string());
    }

    #[tokio::test]
    async fn calls_in_a_row_share_the_connection() {
        let addr = serve().await;
        let mut c = HttpClient::new(&addr);
        c.start().await.unwrap();

        for body in [&b"first"[..], &b"second"[..], &b"third"[..]] {
            let args = BytesMut::from(body);
            let reply: BytesMut = c.call("Echo", "Echo", &Metadata::new(), &args).await.unwrap();
            assert_eq!(body, &reply[..]);
        }
        let list = c.list_services().await.unwrap();
        assert!(list.service("Echo").is_some());

        c.close();
        let err = c
            .call::<BytesMut>("Echo", "Echo", &Metadata::new(), &BytesMut::new())
            .await
            .unwrap_err();
        assert_eq!(ErrorKind::Client, err.kind());
    }

    #[tokio::test]
    async fn debug_page_lists_services() {
        let addr = serve().await;
        let mut c = HttpClient::new(&addr);
        c.start().await.unwrap();

        let list = c.list_services().await.unwrap();
        let echo = list.service("Echo").unwrap();
        assert_eq!("bytes -> bytes", echo.method("Echo").unwrap().meta);
        assert!(echo.method("Reject").is_some());
    }

    #[tokio::test]
    async fn unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut c = HttpClient::new(&addr);
        assert!(c.start().await.is_err());
    }
}
