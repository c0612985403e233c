//! Serve a [`HostSession`] to IPC clients.

use super::rpc::{
    BufferParams, CommandParams, NameParams, RangeParams, SetLinesParams, SetVarParams, VarParams,
};
use super::HostSession;
use crate::ipc::IpcDispatch;
use crate::{BufsyncError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Routes JSON-RPC methods to the matching [`HostSession`] call.
pub struct HostDispatch<S> {
    session: Arc<S>,
}

impl<S> HostDispatch<S> {
    pub fn new(session: Arc<S>) -> Self {
        Self { session }
    }
}

fn params<P: DeserializeOwned>(method: &str, params: Value) -> Result<P> {
    serde_json::from_value(params).map_err(|e| BufsyncError::Protocol {
        message: format!("Invalid params for {}: {}", method, e),
    })
}

#[async_trait]
impl<S: HostSession + 'static> IpcDispatch for HostDispatch<S> {
    async fn dispatch(&self, method: &str, raw: Value) -> Result<Value> {
        debug!("Host dispatch: {}", method);
        let session = &*self.session;
        match method {
            "buffer_number" => Ok(json!(session.buffer_number().await?)),
            "window_id" => Ok(json!(session.window_id().await?)),
            "window_number" => Ok(json!(session.window_number().await?)),
            "tabpage_number" => Ok(json!(session.tabpage_number().await?)),
            "buffer_name" => {
                let p: BufferParams = params(method, raw)?;
                Ok(json!(session.buffer_name(p.bufnr).await?))
            }
            "find_buffer" => {
                let p: NameParams = params(method, raw)?;
                Ok(json!(session.find_buffer(&p.name).await?))
            }
            "window_for_buffer" => {
                let p: BufferParams = params(method, raw)?;
                Ok(json!(session.window_for_buffer(p.bufnr).await?))
            }
            "line_count" => {
                let p: BufferParams = params(method, raw)?;
                Ok(json!(session.line_count(p.bufnr).await?))
            }
            "get_lines" => {
                let p: RangeParams = params(method, raw)?;
                Ok(json!(session.get_lines(p.bufnr, p.start, p.end).await?))
            }
            "set_lines" => {
                let p: SetLinesParams = params(method, raw)?;
                session.set_lines(p.bufnr, p.start, p.end, p.lines).await?;
                Ok(Value::Null)
            }
            "execute" => {
                let p: CommandParams = params(method, raw)?;
                session.execute(&p.command).await?;
                Ok(Value::Null)
            }
            "get_var" => {
                let p: VarParams = params(method, raw)?;
                session.get_var(p.bufnr, &p.name).await
            }
            "set_var" => {
                let p: SetVarParams = params(method, raw)?;
                session.set_var(p.bufnr, &p.name, p.value).await?;
                Ok(Value::Null)
            }
            other => Err(BufsyncError::MethodNotFound {
                method: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[tokio::test]
    async fn test_dispatch_routes_to_session() {
        let host = Arc::new(MemoryHost::new());
        let dispatch = HostDispatch::new(host.clone());

        dispatch
            .dispatch("execute", json!({"command": "edit a.txt"}))
            .await
            .unwrap();
        let bufnr = dispatch.dispatch("buffer_number", json!({})).await.unwrap();
        assert_eq!(bufnr, json!(2));

        dispatch
            .dispatch(
                "set_lines",
                json!({"bufnr": 2, "start": 0, "end": null, "lines": ["x", "y"]}),
            )
            .await
            .unwrap();
        let lines = dispatch
            .dispatch("get_lines", json!({"bufnr": 2, "start": 1}))
            .await
            .unwrap();
        assert_eq!(lines, json!(["y"]));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_bad_params_and_methods() {
        let dispatch = HostDispatch::new(Arc::new(MemoryHost::new()));

        let err = dispatch
            .dispatch("line_count", json!({"buf": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, BufsyncError::Protocol { .. }));

        let err = dispatch.dispatch("nvim_exec", json!({})).await.unwrap_err();
        assert_eq!(err.to_rpc_error_code(), -32601);
    }
}
