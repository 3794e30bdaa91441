// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-global convenience API mirroring the original's package-level
//! `graceful.Serve`/`graceful.Restart()`, backed by a lazily-populated
//! global restart handle (SPEC_FULL.md §9). `LifecycleEngine` remains the
//! first-class, independently constructible value; this module is a thin
//! wrapper for callers who want the single-process-wide convenience.

use std::sync::OnceLock;

use graceful_core::Options;
use parking_lot::Mutex;

use crate::engine::{LifecycleEngine, RestartHandle};
use crate::error::EngineError;

static RESTART_HANDLE: OnceLock<Mutex<Option<RestartHandle>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<RestartHandle>> {
    RESTART_HANDLE.get_or_init(|| Mutex::new(None))
}

/// Run `command` under graceful supervision until shutdown, publishing a
/// global restart handle for the duration so [`restart`] can be called
/// from anywhere in the process. Only one call should be in flight at a
/// time; a second concurrent call overwrites the published handle.
pub async fn serve(command: impl Into<String>, opts: Options) -> Result<(), EngineError> {
    let engine = LifecycleEngine::new(command, opts)?;
    *slot().lock() = Some(engine.restart_handle());
    let result = engine.serve().await;
    *slot().lock() = None;
    result
}

/// Trigger a restart of the process-global engine started via [`serve`].
/// Returns [`EngineError::RestartChannelClosed`] if no engine is currently
/// being served.
pub async fn restart() -> Result<(), EngineError> {
    let handle = slot().lock().clone();
    match handle {
        Some(h) => h.restart().await,
        None => Err(EngineError::RestartChannelClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn restart_without_a_running_engine_errors() {
        // Isolated from other tests only by the fact that nothing else in
        // this crate's test suite calls `serve()`.
        let err = restart().await.unwrap_err();
        assert!(matches!(err, EngineError::RestartChannelClosed));
    }
}
