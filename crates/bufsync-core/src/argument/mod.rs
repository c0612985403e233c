//! Command-style argument parsing.
//!
//! Arguments are split into `++name=value` options, `-x`/`--name` flags and
//! everything else:
//!
//! ```
//! use bufsync::argument::parse;
//!
//! let (opts, flags, residue) = parse(&["++enc=sjis", "--keepalt", "notes.txt"]);
//! assert_eq!(opts.get("enc"), Some("sjis"));
//! assert!(flags.contains_key("keepalt"));
//! assert_eq!(residue, vec!["notes.txt"]);
//! ```

mod flags;
mod opts;

pub use flags::{format_flag, format_flags, parse_flags, validate_flags, FlagValue, Flags};
pub use opts::{format_opt, format_opts, parse, parse_opts, validate_opts, Opts};

use crate::codec::{DecodeOptions, FileFormat};
use crate::Result;

/// Options understood by [`DecodeOptions::from_opts`].
pub const DECODE_OPTS: &[&str] = &["enc", "encoding", "ff", "fileformat"];

impl DecodeOptions {
    /// Decode hints from `++enc`/`++encoding` and `++ff`/`++fileformat`.
    ///
    /// Unrelated options are ignored; a bad fileformat is an error.
    pub fn from_opts(opts: &Opts) -> Result<Self> {
        let mut options = DecodeOptions::new();
        if let Some(encoding) = opts.get("enc").or_else(|| opts.get("encoding")) {
            options = options.with_encoding(encoding);
        }
        if let Some(format) = opts.get("ff").or_else(|| opts.get("fileformat")) {
            options = options.with_format(format.parse::<FileFormat>()?);
        }
        Ok(options)
    }
}
