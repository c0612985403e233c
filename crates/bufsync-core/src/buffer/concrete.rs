//! Persistence trigger.
//!
//! The buffer's current lines are cached in a buffer variable and a
//! buffer-local `BufReadCmd` autocommand reads them back, so reloading the
//! buffer with `:edit` shows the in-memory content instead of the backing
//! file. `'modified'` is cleared so that reload does not prompt.

use crate::config::ConcreteConfig;
use crate::host::{truthy, BufNr, HostSession};
use crate::Result;
use serde_json::Value;
use tracing::debug;

/// Make the current content of `bufnr` what a reload produces.
///
/// Calling it again replaces the cached content and the autocommand.
pub async fn concrete<S: HostSession + ?Sized>(session: &S, bufnr: BufNr) -> Result<()> {
    let lines = session.get_lines(bufnr, 0, None).await?;
    let modifiable = i32::from(truthy(&session.get_var(bufnr, "&modifiable").await?));

    debug!("Concreting {} lines of buffer {}", lines.len(), bufnr);
    session
        .set_var(bufnr, ConcreteConfig::CACHE_VAR, Value::from(lines))
        .await?;

    let group = ConcreteConfig::AUGROUP;
    session
        .execute(&format!("augroup {} | augroup END", group))
        .await?;
    session
        .execute(&format!("autocmd! {} * <buffer={}>", group, bufnr))
        .await?;
    session
        .execute(&format!(
            "autocmd {} BufReadCmd <buffer={}> {}",
            group,
            bufnr,
            reload_command(bufnr, modifiable)
        ))
        .await?;

    session.set_var(bufnr, "&modified", Value::from(0)).await
}

/// Command that refills `bufnr` from the cache, keeping `'modifiable'` as it
/// was when the content was concreted.
fn reload_command(bufnr: BufNr, modifiable: i32) -> String {
    let var = ConcreteConfig::CACHE_VAR;
    [
        format!("call setbufvar({}, '&modifiable', 1)", bufnr),
        format!("call deletebufline({}, 1, '$')", bufnr),
        format!(
            "call setbufline({}, 1, getbufvar({}, '{}'))",
            bufnr, bufnr, var
        ),
        format!("call setbufvar({}, '&modifiable', {})", bufnr, modifiable),
        format!("call setbufvar({}, '&modified', 0)", bufnr),
    ]
    .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    #[test]
    fn test_reload_command_shape() {
        let command = reload_command(3, 0);
        assert!(command.starts_with("call setbufvar(3, '&modifiable', 1) | "));
        assert!(command.contains("getbufvar(3, 'bufsync_concrete_cache')"));
        assert!(command.ends_with("call setbufvar(3, '&modified', 0)"));
    }

    #[tokio::test]
    async fn test_concrete_survives_reload() {
        let host = MemoryHost::new();
        host.write_file("foobar", ["on disk"]).unwrap();
        host.execute("edit foobar").await.unwrap();
        let bufnr = host.buffer_number().await.unwrap();
        host.set_lines(bufnr, 0, None, vec!["Hello".into(), "Darkness".into()])
            .await
            .unwrap();

        concrete(&host, bufnr).await.unwrap();
        assert!(!truthy(&host.get_var(bufnr, "&modified").await.unwrap()));

        host.execute("edit").await.unwrap();
        assert_eq!(
            host.get_lines(bufnr, 0, None).await.unwrap(),
            vec!["Hello", "Darkness"]
        );
    }

    #[tokio::test]
    async fn test_concrete_keeps_nomodifiable_after_reload() {
        let host = MemoryHost::new();
        host.set_lines(1, 0, None, vec!["locked".into()]).await.unwrap();
        host.execute("setlocal nomodifiable").await.unwrap();

        concrete(&host, 1).await.unwrap();
        host.execute("edit").await.unwrap();

        assert_eq!(host.get_lines(1, 0, None).await.unwrap(), vec!["locked"]);
        assert!(!truthy(&host.get_var(1, "&modifiable").await.unwrap()));
    }

    #[tokio::test]
    async fn test_concrete_twice_keeps_one_hook() {
        let host = MemoryHost::new();
        host.set_lines(1, 0, None, vec!["first".into()]).await.unwrap();
        concrete(&host, 1).await.unwrap();
        host.set_lines(1, 0, None, vec!["second".into()]).await.unwrap();
        concrete(&host, 1).await.unwrap();

        host.execute("edit").await.unwrap();
        assert_eq!(host.get_lines(1, 0, None).await.unwrap(), vec!["second"]);
    }
}
