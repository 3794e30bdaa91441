// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single worker generation: its OS process identity, lifecycle state,
//! and the exit-watcher task that reaps it.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Instant;

use graceful_core::GenerationState;
use parking_lot::Mutex;
use tokio::process::Child;
use tokio::sync::watch;

/// Outcome of waiting for a child to exit, as delivered by its watcher task.
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    Exited(ExitStatus),
    /// The OS `wait` call itself failed (e.g. ECHILD because something
    /// else reaped it first). Stringified since `std::io::Error` isn't
    /// `Clone` and multiple waiters may observe this outcome.
    WaitFailed(String),
}

/// One spawned worker child: OS identity, start time, lifecycle state, and
/// a watch channel that fires once the exit-watcher task reaps it.
pub struct Generation {
    pub seq: u32,
    pub pid: i32,
    pub started_at: Instant,
    state: Arc<Mutex<GenerationState>>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
}

impl Generation {
    pub fn state(&self) -> GenerationState {
        *self.state.lock()
    }

    pub fn set_state(&self, new: GenerationState) {
        *self.state.lock() = new;
    }

    /// Await this generation's exit. Cheap and repeatable: every caller
    /// (restart's "wait for old" step, shutdown, and the auto-restart
    /// unexpected-exit monitor) clones the same underlying watch channel.
    pub async fn wait_exit(&self) -> ExitOutcome {
        let mut rx = self.exit_rx.clone();
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                // Sender dropped without ever sending — watcher task panicked.
                return ExitOutcome::WaitFailed("exit watcher task terminated".to_string());
            }
        }
    }
}

/// Spawn a child, its reaper task, and wrap both into a [`Generation`] in
/// `Starting` state. Mirrors the teacher's coop-process reaper pattern
/// (`crates/daemon/src/adapters/agent/coop/spawn.rs`): a `tokio::spawn`ed
/// task that exclusively owns the `Child` and blocks on `wait()`, so the
/// caller never needs to poll for zombies.
pub fn spawn_generation(seq: u32, mut child: Child) -> Generation {
    let pid = child.id().map(|p| p as i32).unwrap_or(-1);
    let state = Arc::new(Mutex::new(GenerationState::Starting));
    let (tx, rx) = watch::channel(None);

    tokio::spawn(async move {
        let outcome = match child.wait().await {
            Ok(status) => ExitOutcome::Exited(status),
            Err(e) => ExitOutcome::WaitFailed(e.to_string()),
        };
        tracing::debug!(pid, ?outcome, "worker generation reaped");
        let _ = tx.send(Some(outcome));
    });

    Generation { seq, pid, started_at: Instant::now(), state, exit_rx: rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::process::Command;

    #[tokio::test]
    async fn reaps_and_reports_exit_status() {
        let child = Command::new("true").spawn().expect("spawn true");
        let gen = spawn_generation(1, child);
        assert_eq!(gen.state(), GenerationState::Starting);
        gen.set_state(GenerationState::Running);

        let outcome = tokio::time::timeout(Duration::from_secs(5), gen.wait_exit())
            .await
            .expect("watcher did not fire in time");
        match outcome {
            ExitOutcome::Exited(status) => assert!(status.success()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn wait_exit_is_repeatable() {
        let child = Command::new("true").spawn().expect("spawn true");
        let gen = spawn_generation(1, child);
        let _first = gen.wait_exit().await;
        let second = gen.wait_exit().await;
        assert!(matches!(second, ExitOutcome::Exited(_)));
    }
}
