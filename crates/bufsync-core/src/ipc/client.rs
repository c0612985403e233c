//! TCP IPC client held by the plugin side.
//!
//! One client owns one connection. Calls take the connection's lock for the
//! whole request/response exchange, so calls issued from several tasks reach
//! the host one at a time and in the order they got the lock.
//!
//! A call that times out leaves its answer in flight, so the connection is
//! retired: every later call fails with `ConnectionLost`.

use super::protocol::{recv_message, send_message, IpcRequest, IpcResponse};
use crate::config::IpcConfig;
use crate::{BufsyncError, Result};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct IpcClient {
    stream: Mutex<TcpStream>,
    addr: SocketAddr,
    next_id: AtomicU64,
    broken: AtomicBool,
}

impl IpcClient {
    /// Connect to a host, giving up after `IpcConfig::IPC_CONNECT_TIMEOUT`.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let lost = || BufsyncError::ConnectionLost {
            addr: addr.to_string(),
        };
        let stream = timeout(IpcConfig::IPC_CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| lost())?
            .map_err(|_| lost())?;
        stream.set_nodelay(true)?;

        debug!("Connected to host at {}", addr);
        Ok(Self {
            stream: Mutex::new(stream),
            addr,
            next_id: AtomicU64::new(1),
            broken: AtomicBool::new(false),
        })
    }

    /// Call `method` on the host.
    ///
    /// An error answer becomes `HostCallFailed` naming `method`. A host that
    /// does not answer within `IpcConfig::IPC_CALL_TIMEOUT` is `Timeout`; a
    /// broken or retired connection is `ConnectionLost`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = IpcRequest::call(method, params, id);

        let mut stream = self.stream.lock().await;
        if self.broken.load(Ordering::Acquire) {
            return Err(self.lost());
        }
        let (mut reader, mut writer) = stream.split();

        send_message(&mut writer, &request)
            .await
            .map_err(|_| self.retire())?;
        let response: IpcResponse =
            match timeout(IpcConfig::IPC_CALL_TIMEOUT, recv_message(&mut reader)).await {
                Ok(Ok(Some(response))) => response,
                // The frame was consumed whole, so the stream is still aligned
                Ok(Err(e @ BufsyncError::Json { .. })) => return Err(e),
                Ok(Err(_)) | Ok(Ok(None)) => return Err(self.retire()),
                Err(_) => {
                    warn!(
                        "Host did not answer {} within {:?}; dropping connection",
                        method,
                        IpcConfig::IPC_CALL_TIMEOUT
                    );
                    self.retire();
                    return Err(BufsyncError::Timeout {
                        call: method.to_string(),
                        seconds: IpcConfig::IPC_CALL_TIMEOUT.as_secs(),
                    });
                }
            };

        if response.id != Some(Value::from(id)) {
            self.retire();
            return Err(BufsyncError::Protocol {
                message: format!(
                    "Answer to {} carries id {:?}, expected {}",
                    method, response.id, id
                ),
            });
        }

        debug!("Host answered {} (id {})", method, id);
        response.into_result(method)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn lost(&self) -> BufsyncError {
        BufsyncError::ConnectionLost {
            addr: self.addr.to_string(),
        }
    }

    /// Stop using the connection and return the error for the failed call.
    fn retire(&self) -> BufsyncError {
        self.broken.store(true, Ordering::Release);
        self.lost()
    }
}
