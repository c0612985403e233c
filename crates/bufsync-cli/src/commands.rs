//! Subcommand implementations.
//!
//! Each command works against any [`HostSession`] so it can be exercised
//! with an in-memory host.

use anyhow::{Context, Result};
use bufsync::argument::{self, DECODE_OPTS};
use bufsync::buffer::{self, OpenOptions, Opener};
use bufsync::{BufNr, DecodeOptions, HostSession};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

/// Resolve an optional buffer number, defaulting to the current buffer.
async fn target<S: HostSession + ?Sized>(session: &S, bufnr: Option<BufNr>) -> Result<BufNr> {
    match bufnr {
        Some(bufnr) => Ok(bufnr),
        None => Ok(session.buffer_number().await?),
    }
}

/// `bufsync open NAME`
pub async fn open<S: HostSession + ?Sized>(
    session: &S,
    name: &str,
    opener: &str,
    mods: &str,
) -> Result<Value> {
    let options = OpenOptions {
        mods: mods.to_string(),
        opener: opener.parse::<Opener>()?,
    };
    let identity = buffer::open(session, name, &options).await?;
    info!("Opened {:?} as buffer {}", name, identity.bufnr);
    Ok(serde_json::to_value(identity)?)
}

/// `bufsync assign [++enc=ENC] [++ff=FF] FILE`
///
/// `args` is the raw argument list; `++` options become decode hints and the
/// single remaining argument is the file to read.
pub async fn assign<S: HostSession + ?Sized>(
    session: &S,
    bufnr: Option<BufNr>,
    args: &[String],
) -> Result<Value> {
    let (opts, residue) = argument::parse_opts(args);
    argument::validate_opts(&opts, DECODE_OPTS)?;
    let path = match residue.as_slice() {
        [path] => path,
        [] => anyhow::bail!("assign needs a file to read"),
        _ => anyhow::bail!("assign takes one file, got {}", residue.join(" ")),
    };

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let bufnr = target(session, bufnr).await?;
    let content = buffer::assign(session, bufnr, &bytes, &DecodeOptions::from_opts(&opts)?).await?;

    info!(
        "Assigned {} lines from {} to buffer {}",
        content.lines.len(),
        path,
        bufnr
    );
    Ok(json!({
        "bufnr": bufnr,
        "lines": content.lines.len(),
        "encoding": content.encoding,
        "format": content.format,
    }))
}

/// `bufsync dump [--output FILE]`
///
/// Returns the encoded bytes when no output path is given.
pub async fn dump<S: HostSession + ?Sized>(
    session: &S,
    bufnr: Option<BufNr>,
    output: Option<&Path>,
) -> Result<Option<Vec<u8>>> {
    let bufnr = target(session, bufnr).await?;
    let bytes = buffer::dump(session, bufnr).await?;
    match output {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} bytes of buffer {} to {}", bytes.len(), bufnr, path.display());
            Ok(None)
        }
        None => Ok(Some(bytes)),
    }
}

/// `bufsync concrete`
pub async fn concrete<S: HostSession + ?Sized>(session: &S, bufnr: Option<BufNr>) -> Result<Value> {
    let bufnr = target(session, bufnr).await?;
    buffer::concrete(session, bufnr).await?;
    info!("Concreted buffer {}", bufnr);
    Ok(json!({ "bufnr": bufnr }))
}
