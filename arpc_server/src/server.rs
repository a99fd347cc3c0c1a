use std::net::SocketAddr;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, warn};

use arpc_protocol::{Error, ErrorKind, Message, Result, RpcMessage};

use crate::{Register, Registry, ServiceFn};

/// The framed TCP server.
pub struct Server {
    pub addr: String,
    registry: Registry,
}

impl Server {
    pub fn new(addr: String) -> Self {
        Server {
            addr,
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Exposes the `arpc.Reflection` service so generic tools can list methods.
    pub fn register_reflection(&self) {
        self.registry.enable_reflection();
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

    /// Accepts connections until accepting fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");

            let registry = self.registry.clone();
            tokio::spawn(async move {
                if let Err(err) = process(registry, stream).await {
                    debug!(%peer, "connection closed: {}", err);
                }
            });
        }
    }
}

impl Register for Server {
    fn register_fn(&mut self, service_path: &str, service_method: &str, meta: &str, f: ServiceFn) {
        self.registry
            .register_fn(service_path, service_method, meta, f);
    }
}

async fn process(registry: Registry, stream: TcpStream) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer = tokio::spawn(async move {
        while let Some(data) = receiver.recv().await {
            if let Err(err) = write_half.write_all(&data).await {
                warn!("failed to write: {}", err);
                return;
            }
        }
        let _ = write_half.shutdown().await;
    });

    let mut reader = BufReader::new(read_half);
    let result = loop {
        let mut msg = Message::new();
        if let Err(err) = msg.decode(&mut reader).await {
            break Err(err);
        }

        if msg.is_heartbeat() {
            reply(&sender, &Message::new_response(&msg));
            continue;
        }

        let registry = registry.clone();
        let sender = sender.clone();
        tokio::spawn(handle(registry, msg, sender));
    };

    // in-flight calls keep their own senders; the writer drains them first.
    drop(sender);
    let _ = writer.await;
    result
}

async fn handle(registry: Registry, mut req: Message, sender: UnboundedSender<Vec<u8>>) {
    let payload = std::mem::take(&mut req.payload);
    let result = match req.get_serialize_type() {
        Some(st) => {
            registry
                .dispatch(&req.service_path, &req.service_method, payload, st)
                .await
        }
        None => Err(Error::new(ErrorKind::Protocol, "unknown serialize type")),
    };

    if req.is_oneway() {
        if let Err(err) = result {
            debug!(seq = req.get_seq(), "oneway call failed: {}", err);
        }
        return;
    }

    let mut res = Message::new_response(&req);
    match result {
        Ok(payload) => res.payload = payload,
        Err(err) => res.set_error(&err.to_string()),
    }
    reply(&sender, &res);
}

fn reply(sender: &UnboundedSender<Vec<u8>>, res: &Message) {
    match res.encode() {
        Ok(data) => {
            // the writer is gone only when the connection already broke.
            let _ = sender.send(data);
        }
        Err(err) => warn!(seq = res.get_seq(), "failed to encode response: {}", err),
    }
}
