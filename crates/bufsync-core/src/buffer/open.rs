//! Buffer opener.

use crate::host::{BufferIdentity, HostSession};
use crate::{BufsyncError, Result};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Command used to show the opened buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Opener {
    /// Replace the buffer in the current window.
    #[default]
    Edit,
    Split,
    Vsplit,
    Tabedit,
}

impl Opener {
    pub fn as_str(&self) -> &'static str {
        match self {
            Opener::Edit => "edit",
            Opener::Split => "split",
            Opener::Vsplit => "vsplit",
            Opener::Tabedit => "tabedit",
        }
    }
}

impl fmt::Display for Opener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Opener {
    type Err = BufsyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "edit" => Ok(Opener::Edit),
            "split" => Ok(Opener::Split),
            "vsplit" => Ok(Opener::Vsplit),
            "tabedit" => Ok(Opener::Tabedit),
            other => Err(BufsyncError::UnknownOption {
                option: format!("opener={}", other),
            }),
        }
    }
}

/// Options for [`open`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Command modifiers such as `keepalt` or `botright`.
    pub mods: String,
    pub opener: Opener,
}

/// Percent-encode the characters the host command line would interpret.
///
/// `%` itself is always encoded so the host can decode the result back to
/// exactly `name`. A leading `+` would start a `+cmd` argument. Everything
/// else, including non-ASCII text, is kept.
pub fn escape_buffer_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let unsafe_char = (i == 0 && c == '+')
            || c.is_whitespace()
            || c.is_control()
            || matches!(
                c,
                '%' | '"' | '#' | '|' | '\\' | '*' | '?' | '[' | '<' | '>' | '`' | '$' | '{'
                    | '\'' | '!'
            );
        if unsafe_char {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{:02x}", byte));
            }
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Open the buffer named exactly `name` and make it current.
///
/// An existing buffer with that name is reused. Fails with
/// `BufferOpenFailed` when the host rejects the command or ends up on a
/// buffer with a different name.
pub async fn open<S: HostSession + ?Sized>(
    session: &S,
    name: &str,
    options: &OpenOptions,
) -> Result<BufferIdentity> {
    let failed = |reason: String| BufsyncError::BufferOpenFailed {
        name: name.to_string(),
        reason,
    };

    let existing = session.find_buffer(name).await.map_err(|e| failed(e.to_string()))?;
    let current = session
        .buffer_number()
        .await
        .map_err(|e| failed(e.to_string()))?;

    let command = match existing {
        Some(bufnr) if bufnr == current && options.opener == Opener::Edit => None,
        Some(bufnr) if options.opener == Opener::Edit => {
            Some(format!("{} buffer {}", options.mods, bufnr))
        }
        _ => Some(format!(
            "{} {} {}",
            options.mods,
            options.opener,
            escape_buffer_name(name)
        )),
    };

    if let Some(command) = command {
        let command = command.trim_start();
        debug!("Opening buffer {:?}: {}", name, command);
        session
            .execute(command)
            .await
            .map_err(|e| failed(e.to_string()))?;
    }

    let bufnr = session
        .buffer_number()
        .await
        .map_err(|e| failed(e.to_string()))?;
    let actual = session
        .buffer_name(bufnr)
        .await
        .map_err(|e| failed(e.to_string()))?;
    if actual != name {
        return Err(failed(format!("host named the buffer {:?}", actual)));
    }

    BufferIdentity::current(session).await
}
