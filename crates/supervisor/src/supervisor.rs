// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Supervisor`: owns the launch template and the current worker
//! generation, and implements `Start`/`RestartProcess`/`Shutdown` per
//! SPEC_FULL.md §4.3.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use graceful_core::{GenerationState, Options, TimeoutGuard};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;

use crate::error::SupervisorError;
use crate::generation::{spawn_generation, ExitOutcome, Generation};
use crate::listener::ListenerHandle;
use crate::spawn::{spawn_worker, LaunchTemplate, ReadinessPipe};

/// Tracks the single current worker generation and spawns replacements.
/// Cloning the `Arc<Generation>` out of `current` under the lock, then
/// operating on the clone, is how every method avoids holding the lock
/// across an `.await`.
pub struct Supervisor {
    template: LaunchTemplate,
    listeners: Vec<ListenerHandle>,
    options: Options,
    current: Mutex<Option<Arc<Generation>>>,
    next_seq: AtomicU32,
}

impl Supervisor {
    pub fn new(template: LaunchTemplate, listeners: Vec<ListenerHandle>, options: Options) -> Self {
        Self { template, listeners, options, current: Mutex::new(None), next_seq: AtomicU32::new(1) }
    }

    /// The generation currently in charge of the listening sockets, if any.
    /// Used by the lifecycle engine to watch for unexpected exits.
    pub fn current_generation(&self) -> Option<Arc<Generation>> {
        self.current.lock().clone()
    }

    /// Spawn the first worker generation. Transition: `Starting → Running`
    /// on success, `Starting → Failed` (child killed and reaped) on
    /// readiness failure or timeout.
    pub async fn start(&self, timeout: TimeoutGuard) -> Result<(), SupervisorError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let generation = self.spawn_and_await_ready(seq, &timeout).await?;
        *self.current.lock() = Some(Arc::new(generation));
        Ok(())
    }

    /// Zero-downtime restart. Protocol exactly per SPEC_FULL.md §4.3:
    /// snapshot old, spawn new, sleep `stop_old_delay`, signal + wait old,
    /// replace current. If the new generation exits unexpectedly before
    /// step 5, the restart fails and the old generation is retained as
    /// `current` — implemented here as a `tokio::select!` race between the
    /// new generation's exit and the stop-old sequence.
    pub async fn restart_process(
        &self,
        timeout: TimeoutGuard,
        stop_signal: Signal,
    ) -> Result<(), SupervisorError> {
        let old = {
            let guard = self.current.lock();
            match guard.as_ref() {
                Some(g) if g.state() == GenerationState::Running => Arc::clone(g),
                Some(_) => return Err(SupervisorError::OperationInProgress),
                None => return Err(SupervisorError::NotRunning),
            }
        };

        let started_at = Instant::now();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        // Step 2: on failure, `old` is untouched and the error is returned as-is.
        let new_generation = Arc::new(self.spawn_and_await_ready(seq, &timeout).await?);

        let stop_old = self.stop_old_and_wait(&old, &timeout, started_at, stop_signal);
        tokio::pin!(stop_old);

        tokio::select! {
            outcome = new_generation.wait_exit() => {
                tracing::warn!(
                    pid = new_generation.pid,
                    ?outcome,
                    "new generation exited unexpectedly during restart; retaining old generation"
                );
                Err(SupervisorError::WorkerExit { detail: describe_exit(&outcome) })
            }
            stop_result = &mut stop_old => {
                // Step 5 happens regardless of `stop_result`: the new
                // generation is already current, and errors from the
                // stop-old phase do not roll the restart back (spec.md §7).
                *self.current.lock() = Some(new_generation);
                stop_result
            }
        }
    }

    /// Send `signal` to the current generation and wait for exit, bounded
    /// by `timeout`. Idempotent no-op if nothing is running. On timeout,
    /// escalates to `SIGKILL` and still surfaces the timeout error.
    pub async fn shutdown(&self, timeout: TimeoutGuard, signal: Signal) -> Result<(), SupervisorError> {
        let generation = match self.current.lock().clone() {
            Some(g) => g,
            None => return Ok(()),
        };
        if generation.state().is_terminal() {
            return Ok(());
        }

        generation.set_state(GenerationState::Stopping);
        if let Err(source) = kill(Pid::from_raw(generation.pid), signal) {
            tracing::warn!(
                pid = generation.pid, %signal, %source,
                "signal delivery during shutdown failed; treating as already exited"
            );
        }

        match timeout.run(generation.wait_exit()).await {
            Ok(_outcome) => {
                generation.set_state(GenerationState::Stopped);
                Ok(())
            }
            Err(_elapsed) => {
                self.force_kill(&generation, GenerationState::Stopped).await;
                Err(SupervisorError::Timeout {
                    operation: "shutdown",
                    elapsed: timeout.duration().unwrap_or(Duration::ZERO),
                })
            }
        }
    }

    /// Steps 3-4 of `restart_process`: sleep `stop_old_delay` (consuming the
    /// restart operation's own deadline budget, per SPEC_FULL.md §9), then
    /// signal and wait for the old generation, escalating on timeout.
    async fn stop_old_and_wait(
        &self,
        old: &Generation,
        timeout: &TimeoutGuard,
        started_at: Instant,
        stop_signal: Signal,
    ) -> Result<(), SupervisorError> {
        if self.options.stop_old_delay > Duration::ZERO {
            let remaining = timeout.remaining_after(started_at.elapsed());
            let sleep_for = match remaining {
                Some(budget) => self.options.stop_old_delay.min(budget),
                None => self.options.stop_old_delay,
            };
            tokio::time::sleep(sleep_for).await;
        }

        old.set_state(GenerationState::Stopping);
        if let Err(source) = kill(Pid::from_raw(old.pid), stop_signal) {
            tracing::warn!(
                pid = old.pid, %stop_signal, %source,
                "signal delivery to old generation failed; treating as already exited"
            );
        }

        let remaining = timeout.remaining_after(started_at.elapsed());
        let stop_guard = TimeoutGuard::new(remaining);
        match stop_guard.run(old.wait_exit()).await {
            Ok(_outcome) => {
                old.set_state(GenerationState::Stopped);
                Ok(())
            }
            Err(_elapsed) => {
                self.force_kill(old, GenerationState::Stopped).await;
                Err(SupervisorError::Timeout {
                    operation: "restart (stop old)",
                    elapsed: timeout.duration().unwrap_or_else(|| started_at.elapsed()),
                })
            }
        }
    }

    /// Spawn one generation and, if a readiness hook is configured, await
    /// it before returning a `Running` generation. On readiness failure or
    /// timeout, the child is killed and reaped and `Failed` is the
    /// generation's final state before it is dropped.
    async fn spawn_and_await_ready(
        &self,
        seq: u32,
        timeout: &TimeoutGuard,
    ) -> Result<Generation, SupervisorError> {
        let readiness_pipe = if self.options.wait_ready_fn.is_some() {
            Some(ReadinessPipe::new().map_err(SupervisorError::Spawn)?)
        } else {
            None
        };

        let child = spawn_worker(&self.template, &self.listeners, readiness_pipe.as_ref())
            .map_err(SupervisorError::Spawn)?;
        let generation = spawn_generation(seq, child);

        if let (Some(wait_ready_fn), Some(pipe)) = (&self.options.wait_ready_fn, readiness_pipe) {
            pipe.supervisor_end.set_nonblocking(true).map_err(SupervisorError::Spawn)?;
            let stream = tokio::net::UnixStream::from_std(pipe.supervisor_end)
                .map_err(SupervisorError::Spawn)?;

            match timeout.run(wait_ready_fn(vec![stream])).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.force_kill(&generation, GenerationState::Failed).await;
                    return Err(SupervisorError::Readiness(e.to_string()));
                }
                Err(_elapsed) => {
                    self.force_kill(&generation, GenerationState::Failed).await;
                    return Err(SupervisorError::Timeout {
                        operation: "start (readiness)",
                        elapsed: timeout.duration().unwrap_or_default(),
                    });
                }
            }
        }

        generation.set_state(GenerationState::Running);
        Ok(generation)
    }

    async fn force_kill(&self, generation: &Generation, terminal_state: GenerationState) {
        if let Err(source) = kill(Pid::from_raw(generation.pid), Signal::SIGKILL) {
            tracing::warn!(
                pid = generation.pid, %source,
                "SIGKILL delivery failed (process likely already gone)"
            );
        }
        let _ = generation.wait_exit().await;
        generation.set_state(terminal_state);
    }
}

fn describe_exit(outcome: &ExitOutcome) -> String {
    match outcome {
        ExitOutcome::Exited(status) => status.to_string(),
        ExitOutcome::WaitFailed(msg) => msg.clone(),
    }
}
