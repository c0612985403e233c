//! Centralized configuration for bufsync.
//!
//! Constants for the content codec, the persistence trigger and the local IPC
//! transport. Per-buffer settings (`fileencodings`, `fileformats`) live on the
//! host and are read at call time.

use crate::codec::FileFormat;
use std::time::Duration;

/// Content codec defaults.
pub struct CodecConfig;

impl CodecConfig {
    /// Encoding used when nothing else can be detected.
    pub const DEFAULT_ENCODING: &'static str = "utf-8";
    /// Non-ASCII bytes needed before a legacy encoding guess is trusted.
    pub const MIN_DETECTION_BYTES: usize = 8;
    /// Line-ending used when the text contains no separators.
    pub const DEFAULT_FORMAT: FileFormat = FileFormat::Unix;
    /// Buffer option read for candidate encodings.
    pub const ENCODINGS_OPTION: &'static str = "&fileencodings";
    /// Buffer option read for candidate fileformats.
    pub const FORMATS_OPTION: &'static str = "&fileformats";
}

/// Persistence trigger names registered on the host.
pub struct ConcreteConfig;

impl ConcreteConfig {
    /// Buffer variable holding the materialized content.
    pub const CACHE_VAR: &'static str = "bufsync_concrete_cache";
    /// Autocommand group owning the `BufReadCmd` hooks.
    pub const AUGROUP: &'static str = "bufsync_concrete";
}

/// Local IPC transport limits.
pub struct IpcConfig;

impl IpcConfig {
    /// Largest accepted frame payload (16MB).
    pub const MAX_IPC_MESSAGE_SIZE: usize = 16 * 1024 * 1024;
    pub const MAX_IPC_CONNECTIONS: usize = 32;
    pub const IPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const IPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);
}
