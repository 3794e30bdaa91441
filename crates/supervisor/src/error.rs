// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the supervisor and lifecycle engine, per SPEC_FULL.md §7.

use std::time::Duration;

use graceful_core::ConfigError;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Errors the `Supervisor` can return from `start`, `restart_process`, and
/// `shutdown`.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("readiness hook reported not-ready: {0}")]
    Readiness(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout { operation: &'static str, elapsed: Duration },

    #[error("worker exited unexpectedly: {detail}")]
    WorkerExit { detail: String },

    #[error("failed to deliver signal {signal} to pid {pid}: {source}")]
    SignalDelivery { signal: Signal, pid: i32, #[source] source: nix::Error },

    #[error("no current worker generation (supervisor not started)")]
    NotRunning,

    #[error("a restart or shutdown is already in progress")]
    OperationInProgress,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors `LifecycleEngine::serve` can return.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("engine's manual-restart channel closed unexpectedly")]
    RestartChannelClosed,
}
