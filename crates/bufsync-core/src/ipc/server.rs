//! TCP IPC server exposing an [`IpcDispatch`] to local clients.
//!
//! Every accepted connection gets its own task and is answered strictly in
//! request order. At most `IpcConfig::MAX_IPC_CONNECTIONS` connections are
//! served at once; extra ones are closed right after accept.

use super::protocol::{read_frame, send_message, IpcRequest, IpcResponse, INVALID_REQUEST, PARSE_ERROR};
use crate::config::IpcConfig;
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Answers the method calls arriving at an [`IpcServer`].
#[async_trait]
pub trait IpcDispatch: Send + Sync + 'static {
    async fn dispatch(&self, method: &str, params: Value) -> Result<Value>;
}

/// A running server. Dropping the handle stops it.
pub struct IpcServerHandle {
    addr: SocketAddr,
    stop: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl IpcServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and close every open connection.
    pub fn shutdown(&mut self) {
        let _ = self.stop.send(true);
    }
}

impl Drop for IpcServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

pub struct IpcServer;

impl IpcServer {
    /// Serve `dispatch` on a random `127.0.0.1` port.
    pub async fn start<D: IpcDispatch>(dispatch: Arc<D>) -> Result<IpcServerHandle> {
        Self::bind("127.0.0.1:0", dispatch).await
    }

    /// Serve `dispatch` on `addr` (`host:port`; port 0 picks one).
    pub async fn bind<D: IpcDispatch>(addr: &str, dispatch: Arc<D>) -> Result<IpcServerHandle> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        info!("Serving host session on {}", addr);

        let (stop, stopped) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, dispatch, stopped));

        Ok(IpcServerHandle {
            addr,
            stop,
            accept_task: Some(accept_task),
        })
    }
}

async fn accept_loop<D: IpcDispatch>(
    listener: TcpListener,
    dispatch: Arc<D>,
    mut stopped: watch::Receiver<bool>,
) {
    let slots = Arc::new(Semaphore::new(IpcConfig::MAX_IPC_CONNECTIONS));

    loop {
        let (stream, peer) = tokio::select! {
            _ = stopped.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept IPC connection: {}", e);
                    continue;
                }
            },
        };

        let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
            warn!(
                "Refusing IPC connection from {}: {} connections already open",
                peer,
                IpcConfig::MAX_IPC_CONNECTIONS
            );
            continue;
        };

        let dispatch = Arc::clone(&dispatch);
        let stopped = stopped.clone();
        tokio::spawn(async move {
            debug!("IPC connection from {}", peer);
            if let Err(e) = serve_connection(stream, &*dispatch, stopped).await {
                debug!("IPC connection from {} closed: {}", peer, e);
            }
            drop(permit);
        });
    }

    info!("Host session server stopped");
}

async fn serve_connection<D: IpcDispatch>(
    mut stream: TcpStream,
    dispatch: &D,
    mut stopped: watch::Receiver<bool>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.split();

    loop {
        let frame = tokio::select! {
            _ = stopped.changed() => return Ok(()),
            frame = read_frame(&mut reader) => match frame? {
                Some(frame) => frame,
                None => return Ok(()),
            },
        };

        let response = answer(&frame, dispatch).await;
        send_message(&mut writer, &response).await?;
    }
}

async fn answer<D: IpcDispatch>(frame: &[u8], dispatch: &D) -> IpcResponse {
    let request: IpcRequest = match serde_json::from_slice(frame) {
        Ok(request) => request,
        Err(e) => return IpcResponse::failure(None, PARSE_ERROR, format!("Parse error: {}", e)),
    };
    if !request.is_jsonrpc2() {
        return IpcResponse::failure(request.id, INVALID_REQUEST, "Expected a JSON-RPC 2.0 request");
    }

    match dispatch.dispatch(&request.method, request.params).await {
        Ok(result) => IpcResponse::ok(request.id, result),
        Err(e) => {
            debug!("{} failed: {}", request.method, e);
            IpcResponse::from_error(request.id, &e)
        }
    }
}
