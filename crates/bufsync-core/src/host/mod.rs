//! Host session capability.
//!
//! [`HostSession`] is the only way the rest of the crate touches the editor.
//! Implementations:
//!
//! - [`MemoryHost`]: an in-process model of the editor, used by tests and by
//!   `bufsync serve-memory`
//! - [`RpcSession`]: forwards every call over local JSON-RPC IPC
//!
//! [`HostDispatch`] goes the other way and serves any session over IPC.

mod command;
pub mod dispatch;
pub mod memory;
pub mod rpc;

pub use dispatch::HostDispatch;
pub use memory::MemoryHost;
pub use rpc::RpcSession;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Buffer number as assigned by the host.
pub type BufNr = u64;

/// Window id as assigned by the host. Stable across window moves.
pub type WinId = u64;

/// Request/response access to a running editor host.
///
/// Line ranges are 0-based and end-exclusive; an `end` of `None` means the
/// end of the buffer. Options are read and written as variables named
/// `&option` (`&modifiable`, `&fileformat`, ...). Every call either returns
/// the host's answer or fails with `HostCallFailed`.
#[async_trait]
pub trait HostSession: Send + Sync {
    /// Number of the buffer shown in the current window.
    async fn buffer_number(&self) -> Result<BufNr>;

    /// Id of the current window.
    async fn window_id(&self) -> Result<WinId>;

    /// Number of the current window within its tab page.
    async fn window_number(&self) -> Result<u32>;

    /// Number of the current tab page.
    async fn tabpage_number(&self) -> Result<u32>;

    /// Full name of a buffer.
    async fn buffer_name(&self, bufnr: BufNr) -> Result<String>;

    /// Buffer whose name is exactly `name`.
    async fn find_buffer(&self, name: &str) -> Result<Option<BufNr>>;

    /// First window in the current tab page displaying `bufnr`.
    async fn window_for_buffer(&self, bufnr: BufNr) -> Result<Option<WinId>>;

    async fn line_count(&self, bufnr: BufNr) -> Result<usize>;

    async fn get_lines(&self, bufnr: BufNr, start: usize, end: Option<usize>)
        -> Result<Vec<String>>;

    /// Replace lines `start..end` with `lines`. `start == end` inserts.
    async fn set_lines(
        &self,
        bufnr: BufNr,
        start: usize,
        end: Option<usize>,
        lines: Vec<String>,
    ) -> Result<()>;

    /// Execute an ex command line.
    async fn execute(&self, command: &str) -> Result<()>;

    async fn get_var(&self, bufnr: BufNr, name: &str) -> Result<Value>;

    async fn set_var(&self, bufnr: BufNr, name: &str, value: Value) -> Result<()>;
}

/// Snapshot of where a buffer is shown, taken at resolution time.
///
/// The host may close or move the buffer afterwards; re-query to detect that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferIdentity {
    pub bufnr: BufNr,
    pub winid: WinId,
    pub winnr: u32,
    pub tabpagenr: u32,
}

impl BufferIdentity {
    /// Identity of the current buffer and window.
    pub async fn current<S: HostSession + ?Sized>(session: &S) -> Result<Self> {
        Ok(Self {
            bufnr: session.buffer_number().await?,
            winid: session.window_id().await?,
            winnr: session.window_number().await?,
            tabpagenr: session.tabpage_number().await?,
        })
    }
}

/// Interpret a host value as a boolean the way the host does (`0`/`1`).
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Interpret a host value as a string option.
pub(crate) fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy_matches_host_semantics() {
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!(true)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("0")));
        assert!(!truthy(&json!(null)));
    }

    #[tokio::test]
    async fn test_identity_of_fresh_host() {
        let host = MemoryHost::new();
        let identity = BufferIdentity::current(&host).await.unwrap();
        assert_eq!(identity.bufnr, 1);
        assert_eq!(identity.winid, 1000);
        assert_eq!(identity.winnr, 1);
        assert_eq!(identity.tabpagenr, 1);
    }
}
