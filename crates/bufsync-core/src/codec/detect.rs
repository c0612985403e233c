//! Side-effect-free classifiers for raw content.
//!
//! Nothing in here talks to the host, so detection can be tested and reused
//! on any byte slice.

use super::FileFormat;
use crate::config::CodecConfig;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, BIG5, EUC_JP, EUC_KR, GB18030, GBK, ISO_2022_JP, SHIFT_JIS, UTF_8};

/// Guess the character encoding of `bytes`.
///
/// A byte order mark wins outright. Valid UTF-8 (which includes pure ASCII)
/// is UTF-8. Anything else goes through a statistical detector, whose guess
/// is only taken when the detector is confident, the guess is a multi-byte
/// legacy encoding, there are at least `CodecConfig::MIN_DETECTION_BYTES`
/// non-ASCII bytes to go on, and the guess decodes `bytes` without malformed
/// sequences. Single-byte encodings decode any input, so they are never
/// detected; callers list them as candidates instead.
///
/// Returns `None` when no encoding could be established.
pub fn detect_encoding(bytes: &[u8]) -> Option<&'static Encoding> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Some(encoding);
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Some(UTF_8);
    }

    let non_ascii = bytes.iter().filter(|b| !b.is_ascii()).count();
    if non_ascii < CodecConfig::MIN_DETECTION_BYTES {
        return None;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let (guess, confident) = detector.guess_assess(None, false);
    if !confident || !is_multibyte_legacy(guess) {
        return None;
    }

    guess
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|_| guess)
}

fn is_multibyte_legacy(encoding: &'static Encoding) -> bool {
    [SHIFT_JIS, EUC_JP, ISO_2022_JP, GBK, GB18030, BIG5, EUC_KR].contains(&encoding)
}

/// Classify the line-ending convention of `text`.
///
/// Any `CR LF` makes the whole text `dos`. Otherwise a bare `CR` makes it
/// `mac`. Everything else, including text without separators, is `unix`.
pub fn detect_format(text: &str) -> FileFormat {
    let bytes = text.as_bytes();
    let mut saw_cr = false;

    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\r' {
            if bytes.get(i + 1) == Some(&b'\n') {
                return FileFormat::Dos;
            }
            saw_cr = true;
        }
    }

    if saw_cr {
        FileFormat::Mac
    } else {
        FileFormat::Unix
    }
}

/// Split decoded text into lines for `format`.
///
/// A separator at the very end terminates the last line instead of opening an
/// empty one, and empty text has no lines at all. In `dos` text a bare LF
/// still ends a line; only the CR in front of it is optional.
pub fn split_lines(text: &str, format: FileFormat) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let separator = match format {
        FileFormat::Unix | FileFormat::Dos => '\n',
        FileFormat::Mac => '\r',
    };
    let body = text.strip_suffix(separator).unwrap_or(text);

    body.split(separator)
        .map(|line| match format {
            FileFormat::Dos => line.strip_suffix('\r').unwrap_or(line),
            _ => line,
        })
        .map(str::to_string)
        .collect()
}
