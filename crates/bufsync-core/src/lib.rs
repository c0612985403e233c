//! Bufsync - buffer content synchronization for editor hosts.
//!
//! This crate lets an out-of-process plugin read and write the text buffers
//! of a running editor. It converts between raw bytes and the host's
//! line-oriented buffers (encoding and fileformat detection), and provides
//! scoped guards that switch the current buffer or force `'modifiable'` and
//! always put things back.
//!
//! Everything goes through a [`HostSession`]. [`RpcSession`] talks to a host
//! over local JSON-RPC IPC; [`MemoryHost`] is an in-process model of one.
//!
//! # Example
//!
//! ```rust,ignore
//! use bufsync::buffer::{self, OpenOptions};
//! use bufsync::codec::DecodeOptions;
//! use bufsync::RpcSession;
//!
//! #[tokio::main]
//! async fn main() -> bufsync::Result<()> {
//!     let session = RpcSession::connect("127.0.0.1:7777".parse().unwrap()).await?;
//!
//!     let buf = buffer::open(&session, "notes.txt", &OpenOptions::default()).await?;
//!     let bytes = std::fs::read("notes.txt")?;
//!     let content = buffer::assign(&session, buf.bufnr, &bytes, &DecodeOptions::default()).await?;
//!     println!("{} lines ({}, {})", content.lines.len(), content.encoding, content.format);
//!
//!     buffer::concrete(&session, buf.bufnr).await?;
//!     Ok(())
//! }
//! ```

pub mod argument;
pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod ipc;

// Re-export commonly used types
pub use buffer::{
    append, assign, concrete, ensure, modifiable, open, replace, AppendOptions, OpenOptions,
    ReplaceOptions,
};
pub use codec::{decode, encode, DecodeOptions, DecodedContent, FileFormat};
pub use error::{BufsyncError, Result};
pub use host::{BufNr, BufferIdentity, HostDispatch, HostSession, MemoryHost, RpcSession, WinId};
