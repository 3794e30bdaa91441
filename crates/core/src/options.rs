// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolved configuration for a `graceful` run: defaults, signal sets, and
//! the timeout contexts `Start`/`RestartProcess`/`Shutdown` run under.

use std::future::Future;
use std::net::TcpListener;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixStream;

use crate::signal::{
    default_graceful_stop_signal, default_restart_signals, default_shutdown_signals, Signal,
    SignalSet,
};

/// Error type a readiness hook may return; boxed so callers aren't forced
/// into any particular error hierarchy.
pub type ReadinessHookError = Box<dyn std::error::Error + Send + Sync + 'static>;

type ReadyFuture = Pin<Box<dyn Future<Output = Result<(), ReadinessHookError>> + Send>>;

/// A readiness probe invoked once after spawn, with the supervisor-side
/// ends of the readiness pipes. Must resolve to `Ok(())` before the worker
/// is considered `Running`.
pub type WaitReadyFn = Arc<dyn Fn(Vec<UnixStream>) -> ReadyFuture + Send + Sync>;

/// Fully resolved options for a supervisor run. Build one with
/// [`OptionsBuilder`] (via [`Options::builder`]); construction always
/// starts from [`Options::defaults`] so every field not explicitly set
/// matches spec.
///
/// Not `Clone`: `listeners` are owned, bound sockets, handed to the
/// `LifecycleEngine` exactly once (mirrors `WithListeners` in the
/// original, which likewise takes ownership).
pub struct Options {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub listeners: Vec<TcpListener>,
    pub wait_ready_fn: Option<WaitReadyFn>,
    pub auto_restart_enabled: bool,
    pub restart_signals: SignalSet,
    pub shutdown_signals: SignalSet,
    pub graceful_stop_signal: Signal,
    pub start_timeout: Option<Duration>,
    pub restart_timeout: Option<Duration>,
    pub shutdown_timeout: Option<Duration>,
    pub stop_old_delay: Duration,
}

impl Options {
    /// Defaults exactly as spec.md §3: inherited environment, `{SIGHUP}`
    /// restart set, `{SIGINT, SIGTERM, SIGQUIT}` shutdown set, `SIGTERM`
    /// graceful-stop signal, unbounded timeouts, 1s stop-old delay.
    pub fn defaults() -> Self {
        Self {
            args: Vec::new(),
            env: std::env::vars().collect(),
            listeners: Vec::new(),
            wait_ready_fn: None,
            auto_restart_enabled: false,
            restart_signals: default_restart_signals(),
            shutdown_signals: default_shutdown_signals(),
            graceful_stop_signal: default_graceful_stop_signal(),
            start_timeout: None,
            restart_timeout: None,
            shutdown_timeout: None,
            stop_old_delay: Duration::from_secs(1),
        }
    }

    pub fn builder() -> OptionsBuilder {
        OptionsBuilder(Self::defaults())
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            start: self.start_timeout,
            restart: self.restart_timeout,
            shutdown: self.shutdown_timeout,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::defaults()
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("args", &self.args)
            .field("env_count", &self.env.len())
            .field("listener_count", &self.listeners.len())
            .field("wait_ready_fn", &self.wait_ready_fn.is_some())
            .field("auto_restart_enabled", &self.auto_restart_enabled)
            .field("restart_signals", &self.restart_signals)
            .field("shutdown_signals", &self.shutdown_signals)
            .field("graceful_stop_signal", &self.graceful_stop_signal)
            .field("start_timeout", &self.start_timeout)
            .field("restart_timeout", &self.restart_timeout)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("stop_old_delay", &self.stop_old_delay)
            .finish()
    }
}

/// Functional-option-style builder, mirroring the original `With*` API
/// (`option.go`) while reading as idiomatic Rust.
pub struct OptionsBuilder(Options);

impl OptionsBuilder {
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.0.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the worker environment. Replaces the inherited-environment
    /// default entirely, matching `WithEnv`'s documented "if set, the new
    /// process uses exactly this" semantics.
    pub fn env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.0.env = env.into_iter().collect();
        self
    }

    /// Hand over ownership of pre-bound listeners for the worker to
    /// inherit. Mirrors `WithListeners` in the original.
    pub fn listeners(mut self, listeners: impl IntoIterator<Item = TcpListener>) -> Self {
        self.0.listeners = listeners.into_iter().collect();
        self
    }

    pub fn wait_ready_fn(mut self, f: WaitReadyFn) -> Self {
        self.0.wait_ready_fn = Some(f);
        self
    }

    pub fn auto_restart_enabled(mut self, enabled: bool) -> Self {
        self.0.auto_restart_enabled = enabled;
        self
    }

    pub fn restart_signals(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.0.restart_signals = SignalSet::new(signals);
        self
    }

    pub fn shutdown_signals(mut self, signals: impl IntoIterator<Item = Signal>) -> Self {
        self.0.shutdown_signals = SignalSet::new(signals);
        self
    }

    pub fn graceful_stop_signal(mut self, signal: Signal) -> Self {
        self.0.graceful_stop_signal = signal;
        self
    }

    pub fn timeouts(
        mut self,
        start: Option<Duration>,
        restart: Option<Duration>,
        shutdown: Option<Duration>,
    ) -> Self {
        self.0.start_timeout = start;
        self.0.restart_timeout = restart;
        self.0.shutdown_timeout = shutdown;
        self
    }

    pub fn stop_old_delay(mut self, delay: Duration) -> Self {
        self.0.stop_old_delay = delay;
        self
    }

    pub fn build(self) -> Options {
        self.0
    }
}

/// The three timeout budgets an operation may run under. `None` means
/// unbounded, exactly as `option.go`'s zero-duration convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timeouts {
    pub start: Option<Duration>,
    pub restart: Option<Duration>,
    pub shutdown: Option<Duration>,
}

/// A bounded-or-unbounded deadline for one lifecycle operation.
///
/// Wraps `tokio::time::timeout` so call sites don't need to branch on
/// whether a duration was configured — unbounded just means "don't wrap".
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard(Option<Duration>);

impl TimeoutGuard {
    pub fn new(duration: Option<Duration>) -> Self {
        Self(duration)
    }

    pub fn unbounded() -> Self {
        Self(None)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.0
    }

    /// Run `fut` to completion, or time out if a bound was configured.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, tokio::time::error::Elapsed>
    where
        F: Future<Output = T>,
    {
        match self.0 {
            Some(d) => tokio::time::timeout(d, fut).await,
            None => Ok(fut.await),
        }
    }

    /// Remaining budget after `elapsed` has already passed, or `None` if
    /// unbounded. Used to time `stop_old_delay` against the same deadline
    /// as the rest of a restart (see SPEC_FULL.md §9).
    pub fn remaining_after(&self, elapsed: Duration) -> Option<Duration> {
        self.0.map(|d| d.saturating_sub(elapsed))
    }
}
