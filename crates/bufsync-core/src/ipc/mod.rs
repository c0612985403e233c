//! Local JSON-RPC transport between a plugin and its editor host.
//!
//! The plugin holds an [`IpcClient`]; whatever fronts the host runs an
//! [`IpcServer`] and answers calls through an [`IpcDispatch`]. `host::rpc` and
//! `host::dispatch` bind both ends to [`HostSession`](crate::HostSession).

pub mod client;
pub mod protocol;
pub mod server;

pub use client::IpcClient;
pub use protocol::{IpcRequest, IpcResponse};
pub use server::{IpcDispatch, IpcServer, IpcServerHandle};
