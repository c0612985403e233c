//! Wire format shared by [`IpcClient`](super::IpcClient) and
//! [`IpcServer`](super::IpcServer).
//!
//! A message is a JSON-RPC 2.0 object behind a 4-byte big-endian length:
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! Frames larger than `IpcConfig::MAX_IPC_MESSAGE_SIZE` are refused on read.

use crate::config::IpcConfig;
use crate::{BufsyncError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const JSONRPC_VERSION: &str = "2.0";

/// Frame payload was not JSON.
pub const PARSE_ERROR: i32 = -32700;
/// JSON that is not a JSON-RPC 2.0 request.
pub const INVALID_REQUEST: i32 = -32600;

fn no_params() -> Value {
    Value::Object(Default::default())
}

/// One host call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub jsonrpc: String,
    pub method: String,
    /// Named arguments. Omitted params read as `{}`.
    #[serde(default = "no_params")]
    pub params: Value,
    #[serde(default)]
    pub id: Option<Value>,
}

impl IpcRequest {
    pub fn call(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: Some(Value::from(id)),
        }
    }

    pub fn is_jsonrpc2(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION
    }
}

/// Answer to one [`IpcRequest`]: exactly one of `result` and `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub jsonrpc: String,
    /// `"result": null` is a result; only a missing field is `None`.
    #[serde(default, deserialize_with = "present")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
    pub id: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl IpcResponse {
    pub fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(IpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Error response for a failed dispatch. Host failures carry the host's
    /// own message so the caller can re-wrap it without a double prefix.
    pub fn from_error(id: Option<Value>, err: &BufsyncError) -> Self {
        Self::failure(id, err.to_rpc_error_code(), err.rpc_message())
    }

    /// Client side view of the answer to `method`.
    pub fn into_result(self, method: &str) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(BufsyncError::host(method, err.message));
        }
        self.result.ok_or_else(|| BufsyncError::Protocol {
            message: format!("Response to {} has neither result nor error", method),
        })
    }
}

/// Read one frame. `None` means the peer closed the connection between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > IpcConfig::MAX_IPC_MESSAGE_SIZE {
        return Err(BufsyncError::Protocol {
            message: format!(
                "Frame of {} bytes exceeds the {} byte limit",
                len,
                IpcConfig::MAX_IPC_MESSAGE_SIZE
            ),
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write one frame and flush it.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| BufsyncError::Protocol {
        message: format!("Payload of {} bytes does not fit a frame", payload.len()),
    })?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize `message` and write it as one frame.
pub async fn send_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    write_frame(writer, &payload).await
}

/// Read one frame and deserialize it.
pub async fn recv_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_params_reads_empty_object() {
        let request: IpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"buffer_number","id":4}"#).unwrap();
        assert!(request.is_jsonrpc2());
        assert_eq!(request.params, json!({}));
        assert_eq!(request.id, Some(json!(4)));
    }

    #[test]
    fn test_null_result_is_still_a_result() {
        let json = serde_json::to_string(&IpcResponse::ok(Some(json!(1)), Value::Null)).unwrap();
        assert!(json.contains("\"result\":null"));

        let parsed: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.into_result("execute").unwrap(), Value::Null);
    }

    #[test]
    fn test_missing_result_is_protocol_error() {
        let parsed: IpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert!(matches!(
            parsed.into_result("execute"),
            Err(BufsyncError::Protocol { .. })
        ));
    }

    #[test]
    fn test_host_error_crosses_the_wire_once() {
        let err = BufsyncError::host("set_lines", "E21: Cannot make changes");
        let json = serde_json::to_string(&IpcResponse::from_error(None, &err)).unwrap();
        assert!(!json.contains("\"result\""));

        let parsed: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.error.as_ref().unwrap().code, -32000);
        match parsed.into_result("set_lines").unwrap_err() {
            BufsyncError::HostCallFailed { call, message } => {
                assert_eq!(call, "set_lines");
                assert_eq!(message, "E21: Cannot make changes");
            }
            other => panic!("Expected HostCallFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_messages_over_a_byte_stream() {
        let mut buf = Vec::new();
        let request = IpcRequest::call("get_lines", json!({"bufnr": 1, "start": 0}), 9);
        send_message(&mut buf, &request).await.unwrap();
        assert_eq!(&buf[..4], &((buf.len() - 4) as u32).to_be_bytes());

        let mut cursor = std::io::Cursor::new(buf);
        let back: IpcRequest = recv_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(back.method, "get_lines");
        assert_eq!(back.params, json!({"bufnr": 1, "start": 0}));
        assert!(recv_message::<_, IpcRequest>(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_refused() {
        let mut buf = ((IpcConfig::MAX_IPC_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(&[0u8; 8]);

        let mut cursor = std::io::Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(BufsyncError::Protocol { .. })
        ));
    }
}
