use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::{tcp::OwnedReadHalf, TcpStream},
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

use super::{Opt, RpcClient};
use arpc_protocol::*;

type Calls = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Message>>>>>;

/// a direct client to connect arpc services over TCP.
#[derive(Debug)]
pub struct Client {
    pub opt: Opt,
    addr: String,
    seq: AtomicU64,
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    calls: Calls,
    closed: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl Client {
    pub fn new(addr: &str) -> Client {
        Client {
            opt: Default::default(),
            addr: String::from(addr),
            seq: AtomicU64::new(0),
            sender: None,
            calls: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            writer: None,
            reader: None,
        }
    }

    /// Connects and spawns the reader and writer tasks.
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

        let (read_half, mut write_half) = stream.into_split();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();

        let calls = self.calls.clone();
        let closed = self.closed.clone();
        self.writer = Some(tokio::spawn(async move {
            while let Some(data) = receiver.recv().await {
                if let Err(err) = write_half.write_all(&data).await {
                    warn!("failed to write: {}", err);
                    shut_down(&closed, &calls, &err.to_string());
                    return;
                }
            }
            let _ = write_half.shutdown().await;
        }));
        self.reader = Some(tokio::spawn(read_loop(
            read_half,
            self.calls.clone(),
            self.closed.clone(),
        )));
        self.sender = Some(sender);
        self.closed.store(false, Ordering::SeqCst);

        Ok(())
    }

    /// Sends one request and waits for its response, honoring `opt.timeout`.
    pub async fn send(
        &self,
        service_path: &str,
        service_method: &str,
        st: SerializeType,
        metadata: &Metadata,
        payload: Vec<u8>,
    ) -> Result<Message> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| Error::new(ErrorKind::Client, "client is not started"))?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);

        let mut req = Message::new();
        req.set_version(0);
        req.set_message_type(MessageType::Request);
        req.set_serialize_type(st);
        req.set_compress_type(self.opt.compress_type);
        req.set_seq(seq);
        req.service_path = service_path.to_string();
        req.service_method = service_method.to_string();
        req.metadata = metadata.clone();
        req.payload = payload;
        let data = req.encode()?;

        let (tx, rx) = oneshot::channel();
        lock(&self.calls).insert(seq, tx);
        // the reader marks the client closed before draining, so a call
        // registered after the drain is caught here.
        if self.closed.load(Ordering::SeqCst) || sender.send(data).is_err() {
            lock(&self.calls).remove(&seq);
            return Err(Error::new(ErrorKind::Client, "connection is shut down"));
        }

        let res = if self.opt.timeout.is_zero() {
            rx.await
        } else {
            match tokio::time::timeout(self.opt.timeout, rx).await {
                Ok(res) => res,
                Err(_) => {
                    lock(&self.calls).remove(&seq);
                    return Err(Error::new(
                        ErrorKind::Timeout,
                        format!(
                            "call {}.{} timed out after {:?}",
                            service_path, service_method, self.opt.timeout
                        ),
                    ));
                }
            }
        };
        let res = res.map_err(|_| Error::new(ErrorKind::Client, "call was dropped"))??;

        if let Some(err) = res.get_error() {
            return Err(Error::new(ErrorKind::Server, err));
        }
        Ok(res)
    }

    /// Asks the server's reflection service for its services.
    pub async fn list_services(&self) -> Result<ServiceList> {
        let res = self
            .send(
                REFLECTION_SERVICE_PATH,
                LIST_SERVICES,
                SerializeType::JSON,
                &Metadata::new(),
                Vec::new(),
            )
            .await?;
        let mut list = ServiceList::default();
        list.from_slice(SerializeType::JSON, &res.payload)?;
        Ok(list)
    }

    /// Flushes pending writes and closes the connection.
    pub async fn close(&mut self) {
        self.sender.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        shut_down(&self.closed, &self.calls, "client closed");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

#[async_trait]
impl RpcClient for Client {
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
        let res = self
            .send(service_path, service_method, st, metadata, payload)
            .await?;

        let mut reply: T = Default::default();
        reply.from_slice(st, &res.payload)?;
        Ok(reply)
    }
}

async fn read_loop(read_half: OwnedReadHalf, calls: Calls, closed: Arc<AtomicBool>) {
    let mut reader = BufReader::new(read_half);
    loop {
        let mut msg = Message::new();
        match msg.decode(&mut reader).await {
            Ok(()) => {
                let seq = msg.get_seq();
                let call = lock(&calls).remove(&seq);
                match call {
                    Some(tx) => {
                        let _ = tx.send(Ok(msg));
                    }
                    None => debug!(seq, "dropping response without a pending call"),
                }
            }
            Err(err) => {
                debug!("failed to read: {}", err);
                shut_down(&closed, &calls, &err.to_string());
                return;
            }
        }
    }
}

fn shut_down(closed: &AtomicBool, calls: &Calls, reason: &str) {
    closed.store(true, Ordering::SeqCst);
    for (_, tx) in lock(calls).drain() {
        let _ = tx.send(Err(Error::new(
            ErrorKind::Network,
            format!("connection is shut down: {}", reason),
        )));
    }
}

fn lock(calls: &Calls) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Message>>>> {
    calls.lock().unwrap_or_else(PoisonError::into_inner)
}
