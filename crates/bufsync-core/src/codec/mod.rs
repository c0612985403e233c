//! Content codec: raw bytes <-> the host's line-oriented buffer model.
//!
//! Decoding resolves two pieces of metadata alongside the lines themselves:
//! the character encoding and the line-ending convention ("fileformat").
//! Explicit hints are taken as-is; otherwise both are detected from the
//! content, narrowed by the host's candidate lists when those are known.
//!
//! # Example
//!
//! ```
//! use bufsync::codec::{decode, encode, DecodeOptions, FileFormat};
//!
//! let content = decode(b"a\r\nb\r\n", &DecodeOptions::default()).unwrap();
//! assert_eq!(content.lines, vec!["a", "b"]);
//! assert_eq!(content.format, FileFormat::Dos);
//! assert_eq!(content.encoding, "utf-8");
//!
//! let bytes = encode(&content.lines, &content.encoding, content.format).unwrap();
//! assert_eq!(bytes, b"a\r\nb\r\n");
//! ```

mod detect;
mod encoding;

pub use detect::{detect_encoding, detect_format, split_lines};
pub use encoding::{canonical_name, decode_lossy, decode_strict, encode_text, resolve_encoding};

use crate::config::CodecConfig;
use crate::{BufsyncError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Line-ending convention of buffer content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// `LF`
    Unix,
    /// `CR LF`
    Dos,
    /// `CR`
    Mac,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Unix => "unix",
            FileFormat::Dos => "dos",
            FileFormat::Mac => "mac",
        }
    }

    /// The separator written after every line.
    pub fn separator(&self) -> &'static str {
        match self {
            FileFormat::Unix => "\n",
            FileFormat::Dos => "\r\n",
            FileFormat::Mac => "\r",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = BufsyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unix" => Ok(FileFormat::Unix),
            "dos" => Ok(FileFormat::Dos),
            "mac" => Ok(FileFormat::Mac),
            other => Err(BufsyncError::UnsupportedFileFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Decoded buffer content together with the metadata it was decoded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedContent {
    /// Lines without their separators.
    pub lines: Vec<String>,
    /// Encoding name the bytes were decoded with.
    pub encoding: String,
    /// Line-ending convention the text was split with.
    pub format: FileFormat,
}

/// Hints and fallbacks for [`decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Explicit encoding. Skips detection; an unknown name is an error.
    pub encoding: Option<String>,
    /// Explicit fileformat. Skips detection.
    pub format: Option<FileFormat>,
    /// Encodings tried in order when detection fails.
    pub candidate_encodings: Vec<String>,
    /// Fileformats the detected one must belong to (first one otherwise).
    pub candidate_formats: Vec<FileFormat>,
    /// Encoding used, with replacement, when nothing else decodes cleanly.
    pub default_encoding: String,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            format: None,
            candidate_encodings: Vec::new(),
            candidate_formats: Vec::new(),
            default_encoding: CodecConfig::DEFAULT_ENCODING.to_string(),
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the explicit encoding.
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Set the explicit fileformat.
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Set the candidate encodings.
    pub fn with_candidate_encodings<I, S>(mut self, encodings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate_encodings = encodings.into_iter().map(Into::into).collect();
        self
    }

    /// Set the candidate fileformats.
    pub fn with_candidate_formats(mut self, formats: impl IntoIterator<Item = FileFormat>) -> Self {
        self.candidate_formats = formats.into_iter().collect();
        self
    }
}

/// Decode raw `bytes` into lines.
///
/// The returned encoding and fileformat are always resolved: explicit hints
/// come back verbatim, detected values come back under their host names.
pub fn decode(bytes: &[u8], options: &DecodeOptions) -> Result<DecodedContent> {
    let (text, encoding) = match &options.encoding {
        Some(name) => {
            let resolved = resolve_encoding(name)?;
            (decode_lossy(bytes, resolved), name.clone())
        }
        None => detect_and_decode(bytes, options)?,
    };

    let format = match options.format {
        Some(format) => format,
        None => {
            let detected = detect_format(&text);
            match options.candidate_formats.first() {
                Some(&first) if !options.candidate_formats.contains(&detected) => first,
                _ => detected,
            }
        }
    };

    debug!(
        "Decoded {} bytes as {} ({})",
        bytes.len(),
        encoding,
        format
    );

    Ok(DecodedContent {
        lines: split_lines(&text, format),
        encoding,
        format,
    })
}

fn detect_and_decode(bytes: &[u8], options: &DecodeOptions) -> Result<(String, String)> {
    if let Some(detected) = detect_encoding(bytes) {
        if let Some(text) = decode_strict(bytes, detected) {
            return Ok((text, canonical_name(detected).into_owned()));
        }
    }

    for name in &options.candidate_encodings {
        match resolve_encoding(name) {
            Ok(candidate) => {
                if let Some(text) = decode_strict(bytes, candidate) {
                    return Ok((text, name.clone()));
                }
            }
            Err(_) => debug!("Skipping unknown candidate encoding {}", name),
        }
    }

    let fallback = resolve_encoding(&options.default_encoding)?;
    Ok((
        decode_lossy(bytes, fallback),
        options.default_encoding.clone(),
    ))
}

/// Encode `lines` back into bytes, terminating every line.
pub fn encode<S: AsRef<str>>(lines: &[S], encoding: &str, format: FileFormat) -> Result<Vec<u8>> {
    let resolved = resolve_encoding(encoding)?;
    let separator = format.separator();

    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push_str(separator);
    }

    encode_text(&text, resolved, encoding)
}
