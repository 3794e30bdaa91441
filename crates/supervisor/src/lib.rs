// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! graceful-supervisor: process spawning, fd inheritance, and the
//! lifecycle engine for the `graceful` socket-inheriting supervisor.
//!
//! `unsafe` is denied crate-wide except in [`spawn`], which carries its own
//! `#![allow(unsafe_code)]` for the one `pre_exec` closure that attaches
//! extra fds to a spawned child — `std::process::Command` has no safe API
//! for that. See DESIGN.md.

mod backoff;
mod engine;
mod error;
mod generation;
mod listener;
mod singleton;
mod spawn;
mod supervisor;

pub use backoff::AutoRestartBackoff;
pub use engine::{LifecycleEngine, RestartHandle};
pub use error::{EngineError, SupervisorError};
pub use generation::{ExitOutcome, Generation};
pub use listener::{listeners_env_entry, prepare_listeners, ListenerHandle};
pub use singleton::{restart, serve};
pub use spawn::{spawn_worker, LaunchTemplate, ReadinessPipe};
pub use supervisor::Supervisor;
