//! [`HostSession`] over JSON-RPC IPC.
//!
//! Each trait method is one request whose method name is the trait method's
//! name and whose params are the named arguments, e.g.
//!
//! ```text
//! {"jsonrpc":"2.0","method":"get_lines","params":{"bufnr":3,"start":0,"end":null},"id":7}
//! ```

use super::{BufNr, HostSession, WinId};
use crate::ipc::IpcClient;
use crate::{BufsyncError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BufferParams {
    pub bufnr: BufNr,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct NameParams {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RangeParams {
    pub bufnr: BufNr,
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SetLinesParams {
    pub bufnr: BufNr,
    pub start: usize,
    #[serde(default)]
    pub end: Option<usize>,
    pub lines: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CommandParams {
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct VarParams {
    pub bufnr: BufNr,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SetVarParams {
    pub bufnr: BufNr,
    pub name: String,
    pub value: Value,
}

/// Session talking to a host through an [`IpcClient`].
#[derive(Debug)]
pub struct RpcSession {
    client: IpcClient,
}

impl RpcSession {
    pub fn new(client: IpcClient) -> Self {
        Self { client }
    }

    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Ok(Self::new(IpcClient::connect(addr).await?))
    }

    pub fn addr(&self) -> SocketAddr {
        self.client.addr()
    }

    async fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> Result<R> {
        let params = serde_json::to_value(params)?;
        let result = self.client.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| BufsyncError::Protocol {
            message: format!("Unexpected result for {}: {}", method, e),
        })
    }
}

#[async_trait]
impl HostSession for RpcSession {
    async fn buffer_number(&self) -> Result<BufNr> {
        self.call("buffer_number", Value::Object(Default::default()))
            .await
    }

    async fn window_id(&self) -> Result<WinId> {
        self.call("window_id", Value::Object(Default::default())).await
    }

    async fn window_number(&self) -> Result<u32> {
        self.call("window_number", Value::Object(Default::default()))
            .await
    }

    async fn tabpage_number(&self) -> Result<u32> {
        self.call("tabpage_number", Value::Object(Default::default()))
            .await
    }

    async fn buffer_name(&self, bufnr: BufNr) -> Result<String> {
        self.call("buffer_name", BufferParams { bufnr }).await
    }

    async fn find_buffer(&self, name: &str) -> Result<Option<BufNr>> {
        self.call(
            "find_buffer",
            NameParams {
                name: name.to_string(),
            },
        )
        .await
    }

    async fn window_for_buffer(&self, bufnr: BufNr) -> Result<Option<WinId>> {
        self.call("window_for_buffer", BufferParams { bufnr }).await
    }

    async fn line_count(&self, bufnr: BufNr) -> Result<usize> {
        self.call("line_count", BufferParams { bufnr }).await
    }

    async fn get_lines(
        &self,
        bufnr: BufNr,
        start: usize,
        end: Option<usize>,
    ) -> Result<Vec<String>> {
        self.call("get_lines", RangeParams { bufnr, start, end })
            .await
    }

    async fn set_lines(
        &self,
        bufnr: BufNr,
        start: usize,
        end: Option<usize>,
        lines: Vec<String>,
    ) -> Result<()> {
        let _: Value = self
            .call(
                "set_lines",
                SetLinesParams {
                    bufnr,
                    start,
                    end,
                    lines,
                },
            )
            .await?;
        Ok(())
    }

    async fn execute(&self, command: &str) -> Result<()> {
        let _: Value = self
            .call(
                "execute",
                CommandParams {
                    command: command.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    async fn get_var(&self, bufnr: BufNr, name: &str) -> Result<Value> {
        self.call(
            "get_var",
            VarParams {
                bufnr,
                name: name.to_string(),
            },
        )
        .await
    }

    async fn set_var(&self, bufnr: BufNr, name: &str, value: Value) -> Result<()> {
        let _: Value = self
            .call(
                "set_var",
                SetVarParams {
                    bufnr,
                    name: name.to_string(),
                    value,
                },
            )
            .await?;
        Ok(())
    }
}
