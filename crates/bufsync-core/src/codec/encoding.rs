//! Encoding name resolution and text <-> byte conversion.
//!
//! Hosts name encodings their own way (`cp932`, `latin1`, `utf-16` meaning
//! big endian), so names are looked up in a small alias table before falling
//! back to WHATWG labels.

use crate::{BufsyncError, Result};
use encoding_rs::{
    Encoding, BIG5, EUC_JP, EUC_KR, GB18030, GBK, ISO_2022_JP, MACINTOSH, REPLACEMENT, SHIFT_JIS,
    UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252, WINDOWS_874,
};
use std::borrow::Cow;

/// Host encoding names that are not (or not the same) WHATWG labels.
fn host_alias(key: &str) -> Option<&'static Encoding> {
    let encoding = match key {
        "default" => UTF_8,
        "cp932" => SHIFT_JIS,
        "japan" => EUC_JP,
        "cp936" | "euc-cn" | "prc" => GBK,
        "cp949" | "korea" => EUC_KR,
        "cp950" | "taiwan" => BIG5,
        "utf-16" | "ucs-2" => UTF_16BE,
        "ucs-2le" => UTF_16LE,
        "latin1" => WINDOWS_1252,
        "cp874" => WINDOWS_874,
        "macroman" => MACINTOSH,
        _ => return None,
    };
    Some(encoding)
}

/// Resolve a host or WHATWG encoding name.
pub fn resolve_encoding(name: &str) -> Result<&'static Encoding> {
    let key = name.trim().to_ascii_lowercase();

    if let Some(encoding) = host_alias(&key) {
        return Ok(encoding);
    }

    match Encoding::for_label(key.as_bytes()) {
        Some(encoding) if encoding != REPLACEMENT => Ok(encoding),
        _ => Err(BufsyncError::UnsupportedEncoding {
            encoding: name.to_string(),
        }),
    }
}

/// Host-style name for a detected encoding.
pub fn canonical_name(encoding: &'static Encoding) -> Cow<'static, str> {
    let name = match encoding {
        e if e == UTF_8 => "utf-8",
        e if e == SHIFT_JIS => "cp932",
        e if e == EUC_JP => "euc-jp",
        e if e == ISO_2022_JP => "iso-2022-jp",
        e if e == GBK => "cp936",
        e if e == GB18030 => "gb18030",
        e if e == BIG5 => "cp950",
        e if e == EUC_KR => "euc-kr",
        e if e == WINDOWS_1252 => "latin1",
        e if e == UTF_16LE => "utf-16le",
        e if e == UTF_16BE => "utf-16",
        e if e == MACINTOSH => "macroman",
        other => {
            let name = other.name().to_ascii_lowercase();
            return Cow::Owned(match name.strip_prefix("windows-") {
                Some(codepage) => format!("cp{}", codepage),
                None if name == "ibm866" => "cp866".to_string(),
                None => name,
            });
        }
    };
    Cow::Borrowed(name)
}

/// Decode `bytes`, failing on malformed input. A BOM for `encoding` is dropped.
pub fn decode_strict(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let body = strip_bom(bytes, encoding);
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(Cow::into_owned)
}

/// Decode `bytes`, substituting U+FFFD for malformed input.
pub fn decode_lossy(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        tracing::debug!("Malformed {} input replaced during decode", encoding.name());
    }
    text.into_owned()
}

/// Encode `text`. `label` is only used for error reporting.
///
/// UTF-16 is produced directly since the WHATWG encoders only emit
/// ASCII-compatible output.
pub fn encode_text(text: &str, encoding: &'static Encoding, label: &str) -> Result<Vec<u8>> {
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(BufsyncError::Unrepresentable {
            encoding: label.to_string(),
        });
    }
    Ok(bytes.into_owned())
}

fn strip_bom<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> &'a [u8] {
    match Encoding::for_bom(bytes) {
        Some((bom_encoding, len)) if bom_encoding == encoding => &bytes[len..],
        _ => bytes,
    }
}
