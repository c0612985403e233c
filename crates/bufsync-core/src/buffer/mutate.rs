//! Content mutators.
//!
//! Every mutation runs under the [`modifiable`] guard, so it succeeds on a
//! buffer with `'modifiable'` off and leaves the option as it found it.

use super::guard::modifiable;
use crate::codec::{self, DecodeOptions, DecodedContent, FileFormat};
use crate::config::CodecConfig;
use crate::host::{string_value, BufNr, HostSession};
use crate::Result;
use serde_json::Value;
use tracing::debug;

/// Options for [`append`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Insert after this 1-based line; `0` inserts before the first line.
    /// Defaults to the end of the buffer. Larger values clamp to the end.
    pub lnum: Option<usize>,
}

/// Options for [`replace`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceOptions {
    /// 1-based inclusive range to replace. `None` replaces the whole buffer;
    /// a `None` end means the last line.
    pub range: Option<(usize, Option<usize>)>,
}

fn owned<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines.iter().map(|line| line.as_ref().to_string()).collect()
}

/// Insert `lines` after `options.lnum`.
pub async fn append<S, L>(session: &S, bufnr: BufNr, lines: &[L], options: &AppendOptions) -> Result<()>
where
    S: HostSession + ?Sized,
    L: AsRef<str>,
{
    let lines = owned(lines);
    modifiable(session, bufnr, || async move {
        let count = session.line_count(bufnr).await?;
        let at = options.lnum.map_or(count, |lnum| lnum.min(count));
        debug!("Appending {} lines to buffer {} after {}", lines.len(), bufnr, at);
        session.set_lines(bufnr, at, Some(at), lines).await
    })
    .await
}

/// Replace the buffer, or `options.range` of it, with `lines`.
///
/// Replacing the whole buffer with nothing leaves a single empty line.
pub async fn replace<S, L>(
    session: &S,
    bufnr: BufNr,
    lines: &[L],
    options: &ReplaceOptions,
) -> Result<()>
where
    S: HostSession + ?Sized,
    L: AsRef<str>,
{
    let lines = owned(lines);
    modifiable(session, bufnr, || async move {
        replace_lines(session, bufnr, lines, options).await
    })
    .await
}

async fn replace_lines<S: HostSession + ?Sized>(
    session: &S,
    bufnr: BufNr,
    mut lines: Vec<String>,
    options: &ReplaceOptions,
) -> Result<()> {
    match options.range {
        None => {
            if lines.is_empty() {
                lines.push(String::new());
            }
            debug!("Replacing buffer {} with {} lines", bufnr, lines.len());
            session.set_lines(bufnr, 0, None, lines).await
        }
        Some((first, last)) => {
            let count = session.line_count(bufnr).await?;
            let start = first.saturating_sub(1).min(count);
            let end = last.map_or(count, |last| last.min(count)).max(start);
            debug!(
                "Replacing lines {}..{} of buffer {} with {} lines",
                start,
                end,
                bufnr,
                lines.len()
            );
            session.set_lines(bufnr, start, Some(end), lines).await
        }
    }
}

/// Decode `bytes` using the buffer's `'fileencodings'` and `'fileformats'`
/// as candidates.
///
/// Candidates already present in `options` are kept.
pub async fn decode_for<S: HostSession + ?Sized>(
    session: &S,
    bufnr: BufNr,
    bytes: &[u8],
    options: &DecodeOptions,
) -> Result<DecodedContent> {
    let mut options = options.clone();

    if options.encoding.is_none() && options.candidate_encodings.is_empty() {
        let value = session.get_var(bufnr, CodecConfig::ENCODINGS_OPTION).await?;
        options.candidate_encodings = comma_list(&value).map(str::to_string).collect();
    }

    if options.format.is_none() && options.candidate_formats.is_empty() {
        let value = session.get_var(bufnr, CodecConfig::FORMATS_OPTION).await?;
        options.candidate_formats = comma_list(&value)
            .filter_map(|name| name.parse::<FileFormat>().ok())
            .collect();
    }

    codec::decode(bytes, &options)
}

fn comma_list(value: &Value) -> impl Iterator<Item = &str> {
    let text = match value {
        Value::String(s) => s.as_str(),
        _ => "",
    };
    text.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Decode `bytes` and make them the buffer's content.
///
/// The resolved encoding and fileformat are stored in the buffer's
/// `'fileencoding'` and `'fileformat'` so a later write reproduces them.
pub async fn assign<S: HostSession + ?Sized>(
    session: &S,
    bufnr: BufNr,
    bytes: &[u8],
    options: &DecodeOptions,
) -> Result<DecodedContent> {
    let content = decode_for(session, bufnr, bytes, options).await?;

    let lines = content.lines.clone();
    let encoding = content.encoding.clone();
    let format = content.format;
    modifiable(session, bufnr, || async move {
        replace_lines(session, bufnr, lines, &ReplaceOptions::default()).await?;
        session
            .set_var(bufnr, "&fileencoding", Value::String(encoding))
            .await?;
        session
            .set_var(bufnr, "&fileformat", Value::from(format.as_str()))
            .await
    })
    .await?;

    debug!(
        "Assigned {} lines to buffer {} ({}, {})",
        content.lines.len(),
        bufnr,
        content.encoding,
        content.format
    );
    Ok(content)
}

/// Encode the buffer's lines with its own `'fileencoding'` and `'fileformat'`.
///
/// An empty `'fileencoding'` means utf-8.
pub async fn dump<S: HostSession + ?Sized>(session: &S, bufnr: BufNr) -> Result<Vec<u8>> {
    let lines = session.get_lines(bufnr, 0, None).await?;

    let encoding = string_value(&session.get_var(bufnr, "&fileencoding").await?);
    let encoding = if encoding.is_empty() {
        CodecConfig::DEFAULT_ENCODING.to_string()
    } else {
        encoding
    };

    let format = string_value(&session.get_var(bufnr, "&fileformat").await?);
    let format = if format.is_empty() {
        CodecConfig::DEFAULT_FORMAT
    } else {
        format.parse()?
    };

    codec::encode(&lines, &encoding, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    async fn lines(host: &MemoryHost, bufnr: BufNr) -> Vec<String> {
        host.get_lines(bufnr, 0, None).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_defaults_to_end_and_clamps() {
        let host = MemoryHost::new();
        append(&host, 1, &["a", "b"], &AppendOptions::default())
            .await
            .unwrap();
        assert_eq!(lines(&host, 1).await, vec!["", "a", "b"]);

        append(&host, 1, &["top"], &AppendOptions { lnum: Some(0) })
            .await
            .unwrap();
        append(&host, 1, &["tail"], &AppendOptions { lnum: Some(99) })
            .await
            .unwrap();
        assert_eq!(lines(&host, 1).await, vec!["top", "", "a", "b", "tail"]);
    }

    #[tokio::test]
    async fn test_replace_range_is_one_based_inclusive() {
        let host = MemoryHost::new();
        replace(&host, 1, &["a", "b", "c", "d"], &ReplaceOptions::default())
            .await
            .unwrap();
        replace(
            &host,
            1,
            &["X"],
            &ReplaceOptions {
                range: Some((2, Some(3))),
            },
        )
        .await
        .unwrap();
        assert_eq!(lines(&host, 1).await, vec!["a", "X", "d"]);

        replace(
            &host,
            1,
            &["Y", "Z"],
            &ReplaceOptions {
                range: Some((3, None)),
            },
        )
        .await
        .unwrap();
        assert_eq!(lines(&host, 1).await, vec!["a", "X", "Y", "Z"]);
    }

    #[tokio::test]
    async fn test_replace_with_nothing_leaves_one_empty_line() {
        let host = MemoryHost::new();
        replace(&host, 1, &["a", "b"], &ReplaceOptions::default())
            .await
            .unwrap();
        replace::<_, &str>(&host, 1, &[], &ReplaceOptions::default())
            .await
            .unwrap();
        assert_eq!(lines(&host, 1).await, vec![""]);
    }

    #[tokio::test]
    async fn test_decode_for_uses_buffer_fileformats() {
        let host = MemoryHost::new();
        host.set_var(1, "&fileformats", Value::from("dos"))
            .await
            .unwrap();

        // No CR at all, but the buffer only accepts dos.
        let content = decode_for(&host, 1, b"a\nb\n", &DecodeOptions::default())
            .await
            .unwrap();
        assert_eq!(content.format, FileFormat::Dos);
        assert_eq!(content.lines, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_dump_uses_buffer_encoding_and_format() {
        let host = MemoryHost::new();
        let options = DecodeOptions::new()
            .with_encoding("utf-16le")
            .with_format(FileFormat::Dos);
        let bytes = codec::encode(&["héllo", "wörld"], "utf-16le", FileFormat::Dos).unwrap();

        assign(&host, 1, &bytes, &options).await.unwrap();
        assert_eq!(dump(&host, 1).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_dump_of_fresh_buffer_is_utf8_unix() {
        let host = MemoryHost::new();
        replace(&host, 1, &["x"], &ReplaceOptions::default())
            .await
            .unwrap();
        assert_eq!(dump(&host, 1).await.unwrap(), b"x\n");
    }
}
