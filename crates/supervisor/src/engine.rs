// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The top-level `LifecycleEngine`: signal multiplexing, manual restarts,
//! and auto-restart on unexpected exit, per SPEC_FULL.md §4.4.

use std::sync::Arc;

use graceful_core::{GenerationState, Options, SignalSet, TimeoutGuard};
use nix::sys::signal::Signal;
use tokio::sync::{mpsc, oneshot};

use crate::backoff::AutoRestartBackoff;
use crate::error::{EngineError, SupervisorError};
use crate::listener::{listeners_env_entry, prepare_listeners};
use crate::spawn::LaunchTemplate;
use crate::supervisor::Supervisor;

struct RestartRequest {
    reply: oneshot::Sender<Result<(), EngineError>>,
}

/// A cheap, cloneable in-process handle to request a restart and await its
/// completion, serialized with every other restart source through the
/// engine's selection loop (spec.md §4.5).
#[derive(Clone)]
pub struct RestartHandle {
    tx: mpsc::Sender<RestartRequest>,
}

impl RestartHandle {
    pub async fn restart(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RestartRequest { reply: reply_tx })
            .await
            .map_err(|_| EngineError::RestartChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::RestartChannelClosed)?
    }
}

/// Orchestrates one worker's entire lifetime: builds the supervisor
/// template, launches the initial `Start`, then multiplexes restart
/// signals, the manual-restart channel, shutdown signals, and (when
/// enabled) unexpected-exit auto-restart, exactly one event at a time.
pub struct LifecycleEngine {
    supervisor: Arc<Supervisor>,
    restart_signals: SignalSet,
    shutdown_signals: SignalSet,
    graceful_stop_signal: Signal,
    auto_restart_enabled: bool,
    start_timeout: Option<std::time::Duration>,
    restart_timeout: Option<std::time::Duration>,
    shutdown_timeout: Option<std::time::Duration>,
    restart_tx: mpsc::Sender<RestartRequest>,
    restart_rx: mpsc::Receiver<RestartRequest>,
}

impl LifecycleEngine {
    /// Resolve `opts` (binding/preparing its listeners into inheritable fd
    /// handles) against `command` and build a not-yet-running engine.
    pub fn new(command: impl Into<String>, mut opts: Options) -> Result<Self, EngineError> {
        let raw_listeners = std::mem::take(&mut opts.listeners);
        let listener_handles = prepare_listeners(raw_listeners)?;

        let mut env = opts.env.clone();
        env.push(listeners_env_entry(&listener_handles));

        let template = LaunchTemplate { program: command.into(), args: opts.args.clone(), env };

        let restart_signals = opts.restart_signals.clone();
        let shutdown_signals = opts.shutdown_signals.clone();
        let graceful_stop_signal = opts.graceful_stop_signal;
        let auto_restart_enabled = opts.auto_restart_enabled;
        let start_timeout = opts.start_timeout;
        let restart_timeout = opts.restart_timeout;
        let shutdown_timeout = opts.shutdown_timeout;

        let supervisor = Arc::new(Supervisor::new(template, listener_handles, opts));
        let (restart_tx, restart_rx) = mpsc::channel(1);

        Ok(Self {
            supervisor,
            restart_signals,
            shutdown_signals,
            graceful_stop_signal,
            auto_restart_enabled,
            start_timeout,
            restart_timeout,
            shutdown_timeout,
            restart_tx,
            restart_rx,
        })
    }

    /// A cloneable handle callers can use to request a restart from
    /// outside the `serve` future (e.g. the process-global convenience API
    /// in `singleton.rs`).
    pub fn restart_handle(&self) -> RestartHandle {
        RestartHandle { tx: self.restart_tx.clone() }
    }

    /// Run the engine to completion: the initial `Start`, then the
    /// selection loop, until a shutdown signal is handled or a fatal error
    /// occurs.
    ///
    /// Takes `self` by value and destructures it so `restart_rx` moves into
    /// a plain local: ownership alone proves the selection loop below runs
    /// at most once, with no `Mutex`/`Option` bookkeeping needed to enforce it.
    pub async fn serve(self) -> Result<(), EngineError> {
        let LifecycleEngine {
            supervisor,
            restart_signals,
            shutdown_signals,
            graceful_stop_signal,
            auto_restart_enabled,
            start_timeout,
            restart_timeout,
            shutdown_timeout,
            restart_tx: _,
            mut restart_rx,
        } = self;

        let start_guard = TimeoutGuard::new(start_timeout);
        let (done_tx, mut done_rx) = oneshot::channel();
        let start_supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            let result = start_supervisor.start(start_guard).await;
            let _ = done_tx.send(result.map_err(EngineError::from));
        });

        let mut restart_signal_rx = register_signals(&restart_signals)?;
        let mut shutdown_signal_rx = register_signals(&shutdown_signals)?;
        let mut backoff = AutoRestartBackoff::new();

        loop {
            let unexpected_exit = watch_current_generation(&supervisor);
            tokio::pin!(unexpected_exit);

            tokio::select! {
                result = &mut done_rx => {
                    return result.unwrap_or(Err(EngineError::RestartChannelClosed));
                }
                _ = restart_signal_rx.recv() => {
                    tracing::info!("restart signal received");
                    do_restart(&supervisor, restart_timeout, graceful_stop_signal).await?;
                }
                Some(req) = restart_rx.recv() => {
                    let result = do_restart(&supervisor, restart_timeout, graceful_stop_signal).await;
                    let _ = req.reply.send(result);
                }
                sig = shutdown_signal_rx.recv() => {
                    tracing::info!(?sig, "shutdown signal received");
                    return do_shutdown(&supervisor, shutdown_timeout, graceful_stop_signal).await;
                }
                generation_exit = &mut unexpected_exit, if auto_restart_enabled => {
                    if let Some(()) = generation_exit {
                        let delay = backoff.next_delay();
                        if !delay.is_zero() {
                            tracing::warn!(?delay, "backing off before auto-restart");
                            tokio::time::sleep(delay).await;
                        }
                        if let Err(e) = do_restart(&supervisor, restart_timeout, graceful_stop_signal).await {
                            tracing::error!(error = %e, "auto-restart failed");
                        } else {
                            backoff.reset();
                        }
                    }
                }
            }
        }
    }
}

/// Resolves once the current generation exits while still `Running` (i.e.
/// nobody asked it to stop) — step 5 of spec.md §4.4: this path never
/// touches `done_rx`.
async fn watch_current_generation(supervisor: &Supervisor) -> Option<()> {
    let generation = match supervisor.current_generation() {
        Some(g) => g,
        // Nothing running right now (e.g. mid-restart window before the
        // new generation replaces `current`) — never resolve, so this
        // branch just idles until the next loop iteration re-evaluates it.
        None => return std::future::pending::<Option<()>>().await,
    };
    if generation.state() != GenerationState::Running {
        return std::future::pending::<Option<()>>().await;
    }
    generation.wait_exit().await;
    (generation.state() == GenerationState::Running).then_some(())
}

async fn do_restart(
    supervisor: &Supervisor,
    restart_timeout: Option<std::time::Duration>,
    graceful_stop_signal: Signal,
) -> Result<(), EngineError> {
    let guard = TimeoutGuard::new(restart_timeout);
    supervisor
        .restart_process(guard, graceful_stop_signal)
        .await
        .map_err(EngineError::from)
}

async fn do_shutdown(
    supervisor: &Supervisor,
    shutdown_timeout: Option<std::time::Duration>,
    graceful_stop_signal: Signal,
) -> Result<(), EngineError> {
    let guard = TimeoutGuard::new(shutdown_timeout);
    supervisor
        .shutdown(guard, graceful_stop_signal)
        .await
        .map_err(EngineError::from)
}

fn register_signals(set: &SignalSet) -> Result<SignalMultiplexer, SupervisorError> {
    SignalMultiplexer::new(set)
}

/// Merges a `SignalSet` into one `mpsc::Receiver<Signal>`: one
/// `tokio::signal::unix::Signal` stream per distinct signal, each fed into
/// a shared, buffered channel so multiple arrivals while the engine is
/// busy coalesce into "at least one pending follow-up" rather than being
/// dropped (spec.md §4.4 ordering guarantee).
struct SignalMultiplexer {
    rx: mpsc::Receiver<Signal>,
    _tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl SignalMultiplexer {
    fn new(set: &SignalSet) -> Result<Self, SupervisorError> {
        let (tx, rx) = mpsc::channel(set_len(set).max(1));
        let mut tasks = Vec::new();
        for sig in set.iter() {
            let kind = to_signal_kind(sig)?;
            let mut stream = tokio::signal::unix::signal(kind)
                .map_err(SupervisorError::Spawn)?;
            let tx = tx.clone();
            tasks.push(tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if tx.send(sig).await.is_err() {
                        break;
                    }
                }
            }));
        }
        Ok(Self { rx, _tasks: tasks })
    }

    async fn recv(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }
}

fn set_len(set: &SignalSet) -> usize {
    set.iter().count()
}

fn to_signal_kind(signal: Signal) -> Result<tokio::signal::unix::SignalKind, SupervisorError> {
    Ok(tokio::signal::unix::SignalKind::from_raw(signal as i32))
}
