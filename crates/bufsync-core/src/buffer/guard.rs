//! Scoped state guards.
//!
//! A guard captures some piece of host state, forces it into a target state,
//! runs a body and then always puts the captured state back, whether the body
//! succeeded or not. Restoration finishes before any error propagates.
//!
//! # Concurrency
//!
//! Guards are not serialized across independent callers. Two callers
//! guarding the same buffer or window at the same time on one host can
//! interleave their enter and restore phases, and each will restore what it
//! captured. Only run guards when you control all access to the affected
//! buffers and windows. Nested guards issued by one caller compose normally.

use crate::host::{truthy, BufNr, HostSession, WinId};
use crate::{BufsyncError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// Host state that can be captured, forced and restored.
#[async_trait]
pub trait ScopedState: Send + Sync {
    /// What [`capture`](Self::capture) records.
    type Saved: Send + Sync;

    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Read the current state. Must not change anything on the host.
    async fn capture(&self) -> Result<Self::Saved>;

    /// Move the host into the target state.
    async fn apply(&self, saved: &Self::Saved) -> Result<()>;

    /// Put the captured state back.
    async fn restore(&self, saved: Self::Saved) -> Result<()>;
}

/// Run `body` with `state` applied, restoring it afterwards.
///
/// Restore runs exactly once, even when `apply` or `body` fails. When both
/// the body and the restore fail the result is `GuardFailed` carrying both;
/// a restore failure after a successful body is `RestoreFailed`.
pub async fn with_guard<G, F, Fut, T>(state: &G, body: F) -> Result<T>
where
    G: ScopedState,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let saved = state.capture().await?;
    debug!("Entering {} guard", G::NAME);

    let outcome = match state.apply(&saved).await {
        Ok(()) => body().await,
        Err(e) => Err(e),
    };

    let restored = state.restore(saved).await;
    if let Err(e) = &restored {
        warn!("Failed to restore {} state: {}", G::NAME, e);
    } else {
        debug!("Restored {} state", G::NAME);
    }

    settle(G::NAME, outcome, restored)
}

fn settle<T>(guard: &'static str, outcome: Result<T>, restored: Result<()>) -> Result<T> {
    match (outcome, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(restore)) => Err(BufsyncError::RestoreFailed {
            guard,
            source: Box::new(restore),
        }),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(restore)) => Err(BufsyncError::GuardFailed {
            guard,
            error: Box::new(error),
            restore: Box::new(restore),
        }),
    }
}

/// Makes a buffer the current one.
pub struct BufferFocus<'a, S: ?Sized> {
    pub session: &'a S,
    pub bufnr: BufNr,
}

/// Window and buffer that were current when [`BufferFocus`] was captured.
#[derive(Debug, Clone, Copy)]
pub struct FocusSnapshot {
    pub winid: WinId,
    pub bufnr: BufNr,
}

#[async_trait]
impl<'a, S: HostSession + ?Sized> ScopedState for BufferFocus<'a, S> {
    type Saved = FocusSnapshot;

    const NAME: &'static str = "current buffer";

    async fn capture(&self) -> Result<FocusSnapshot> {
        Ok(FocusSnapshot {
            winid: self.session.window_id().await?,
            bufnr: self.session.buffer_number().await?,
        })
    }

    async fn apply(&self, saved: &FocusSnapshot) -> Result<()> {
        if saved.bufnr == self.bufnr {
            return Ok(());
        }
        match self.session.window_for_buffer(self.bufnr).await? {
            Some(winid) => {
                debug!("Switching to window {} for buffer {}", winid, self.bufnr);
                goto_window(self.session, winid).await
            }
            None => {
                debug!("Showing buffer {} in the current window", self.bufnr);
                self.session
                    .execute(&format!("noautocmd keepjumps keepalt buffer {}", self.bufnr))
                    .await
            }
        }
    }

    // A vanished window is an error; its buffer is not forced into
    // whichever window happens to be current instead.
    async fn restore(&self, saved: FocusSnapshot) -> Result<()> {
        if self.session.window_id().await? != saved.winid {
            goto_window(self.session, saved.winid).await?;
        }
        if self.session.buffer_number().await? != saved.bufnr {
            self.session
                .execute(&format!("noautocmd keepjumps keepalt buffer {}", saved.bufnr))
                .await?;
        }
        Ok(())
    }
}

/// `win_gotoid` reports a missing window only through its return value, so
/// check where we ended up.
async fn goto_window<S: HostSession + ?Sized>(session: &S, winid: WinId) -> Result<()> {
    session
        .execute(&format!("call win_gotoid({})", winid))
        .await?;
    let current = session.window_id().await?;
    if current != winid {
        return Err(BufsyncError::host(
            "win_gotoid",
            format!("Window {} does not exist (still in {})", winid, current),
        ));
    }
    Ok(())
}

/// Forces a buffer's `'modifiable'` option on.
pub struct ModifiableFlag<'a, S: ?Sized> {
    pub session: &'a S,
    pub bufnr: BufNr,
}

#[async_trait]
impl<'a, S: HostSession + ?Sized> ScopedState for ModifiableFlag<'a, S> {
    type Saved = Value;

    const NAME: &'static str = "modifiable";

    async fn capture(&self) -> Result<Value> {
        self.session.get_var(self.bufnr, "&modifiable").await
    }

    async fn apply(&self, saved: &Value) -> Result<()> {
        if truthy(saved) {
            return Ok(());
        }
        self.session
            .set_var(self.bufnr, "&modifiable", Value::from(1))
            .await
    }

    // The captured value wins over anything the body set.
    async fn restore(&self, saved: Value) -> Result<()> {
        self.session.set_var(self.bufnr, "&modifiable", saved).await
    }
}

/// Run `body` with `bufnr` as the current buffer, then switch back.
///
/// A window already showing `bufnr` is preferred; otherwise the buffer is
/// shown in the current window without firing autocommands.
pub async fn ensure<S, F, Fut, T>(session: &S, bufnr: BufNr, body: F) -> Result<T>
where
    S: HostSession + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_guard(&BufferFocus { session, bufnr }, body).await
}

/// Run `body` with `bufnr` modifiable, then restore the original flag.
pub async fn modifiable<S, F, Fut, T>(session: &S, bufnr: BufNr, body: F) -> Result<T>
where
    S: HostSession + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_guard(&ModifiableFlag { session, bufnr }, body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts phases and fails on demand.
    struct Recorder {
        fail_capture: bool,
        fail_apply: bool,
        fail_restore: bool,
        restores: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                fail_capture: false,
                fail_apply: false,
                fail_restore: false,
                restores: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScopedState for Recorder {
        type Saved = u32;
        const NAME: &'static str = "recorder";

        async fn capture(&self) -> Result<u32> {
            if self.fail_capture {
                return Err(BufsyncError::host("capture", "nope"));
            }
            Ok(7)
        }

        async fn apply(&self, _saved: &u32) -> Result<()> {
            if self.fail_apply {
                return Err(BufsyncError::host("apply", "nope"));
            }
            Ok(())
        }

        async fn restore(&self, saved: u32) -> Result<()> {
            assert_eq!(saved, 7);
            self.restores.fetch_add(1, Ordering::SeqCst);
            if self.fail_restore {
                return Err(BufsyncError::host("restore", "nope"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_guard_returns_body_value() {
        let recorder = Recorder::new();
        let value = with_guard(&recorder, || async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(recorder.restores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_body_error_passes_through_unchanged() {
        let recorder = Recorder::new();
        let err = with_guard(&recorder, || async {
            Err::<(), _>(BufsyncError::host("body", "E21"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, BufsyncError::HostCallFailed { ref call, .. } if call == "body"));
        assert_eq!(recorder.restores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_restore_failure_after_success() {
        let recorder = Recorder {
            fail_restore: true,
            ..Recorder::new()
        };
        let err = with_guard(&recorder, || async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, BufsyncError::RestoreFailed { guard: "recorder", .. }));
    }

    #[tokio::test]
    async fn test_guard_keeps_both_failures() {
        let recorder = Recorder {
            fail_restore: true,
            ..Recorder::new()
        };
        let err = with_guard(&recorder, || async {
            Err::<(), _>(BufsyncError::host("body", "E21"))
        })
        .await
        .unwrap_err();
        match &err {
            BufsyncError::GuardFailed { error, restore, .. } => {
                assert!(error.to_string().contains("body"));
                assert!(restore.to_string().contains("restore"));
            }
            other => panic!("Expected GuardFailed, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guard_restores_after_failed_apply_and_skips_body() {
        let recorder = Recorder {
            fail_apply: true,
            ..Recorder::new()
        };
        let ran = AtomicUsize::new(0);
        let err = with_guard(&recorder, || async {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("apply"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.restores.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_failed_capture_skips_restore() {
        let recorder = Recorder {
            fail_capture: true,
            ..Recorder::new()
        };
        assert!(with_guard(&recorder, || async { Ok(()) }).await.is_err());
        assert_eq!(recorder.restores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_modifiable_restores_captured_value_even_if_body_changes_it() {
        let host = MemoryHost::new();
        host.execute("setlocal nomodifiable").await.unwrap();

        modifiable(&host, 1, || async {
            assert!(truthy(&host.get_var(1, "&modifiable").await?));
            host.set_var(1, "&modifiable", Value::from(1)).await
        })
        .await
        .unwrap();

        assert!(!truthy(&host.get_var(1, "&modifiable").await.unwrap()));
    }

    #[tokio::test]
    async fn test_ensure_switches_and_returns() {
        let host = MemoryHost::new();
        host.execute("edit Hello").await.unwrap();
        let hello = host.buffer_number().await.unwrap();
        host.execute("edit World").await.unwrap();
        let world = host.buffer_number().await.unwrap();

        let seen = ensure(&host, hello, || async { host.buffer_number().await })
            .await
            .unwrap();
        assert_eq!(seen, hello);
        assert_eq!(host.buffer_number().await.unwrap(), world);
    }

    #[tokio::test]
    async fn test_ensure_reports_vanished_window() {
        let host = MemoryHost::new();
        host.execute("edit Hello").await.unwrap();
        let hello = host.buffer_number().await.unwrap();
        host.execute("new").await.unwrap();
        host.execute("edit World").await.unwrap();
        let world_window = host.window_id().await.unwrap();

        let err = ensure(&host, hello, || async {
            host.execute(&format!("call win_gotoid({}) | close", world_window))
                .await
        })
        .await
        .unwrap_err();

        match err {
            BufsyncError::RestoreFailed { guard, source } => {
                assert_eq!(guard, "current buffer");
                assert!(source.to_string().contains("win_gotoid"), "{}", source);
            }
            other => panic!("Expected RestoreFailed, got: {:?}", other),
        }
        // The surviving window keeps its own buffer
        assert_eq!(host.buffer_number().await.unwrap(), hello);
    }
}
