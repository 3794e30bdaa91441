// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fd-attachment mechanics: turn a set of listener handles (and an optional
//! readiness-pipe worker end) into extra fds 3.. in a spawned child.

#![allow(unsafe_code)]

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt as _;
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::listener::ListenerHandle;

/// Immutable per-spawn template: program, argv tail, and extra env vars.
/// Reused unmodified across every generation.
#[derive(Clone, Debug)]
pub struct LaunchTemplate {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// The supervisor's retained end of a readiness channel, plus the raw fd of
/// the end handed to the child.
pub struct ReadinessPipe {
    pub supervisor_end: UnixStream,
    child_fd: OwnedFd,
}

impl ReadinessPipe {
    pub fn new() -> io::Result<Self> {
        let (supervisor_end, child_end) = UnixStream::pair()?;
        Ok(Self { supervisor_end, child_fd: OwnedFd::from(child_end) })
    }
}

/// Spawn one worker generation: listener fds attached starting at fd 3,
/// followed by the readiness pipe's child end (if any), in that order.
///
/// # Safety-relevant design
/// The `pre_exec` closure below runs in the forked child between `fork` and
/// `execve`, single-threaded, with no Rust allocator or lock state shared
/// with the parent. It calls only `dup2`, which is async-signal-safe. This
/// is the one place in the crate `unsafe` is required — `std::process::Command`
/// has no safe API for attaching arbitrary fds beyond stdin/stdout/stderr.
pub fn spawn_worker(
    template: &LaunchTemplate,
    listeners: &[ListenerHandle],
    readiness_pipe: Option<&ReadinessPipe>,
) -> io::Result<Child> {
    let mut dup_fds: Vec<OwnedFd> = Vec::with_capacity(listeners.len() + 1);
    for handle in listeners {
        dup_fds.push(handle.try_clone_owned()?);
    }
    if let Some(pipe) = readiness_pipe {
        dup_fds.push(pipe.child_fd.try_clone()?);
    }
    let raw_fds: Vec<RawFd> = dup_fds.iter().map(|fd| fd.as_raw_fd()).collect();

    let mut command = Command::new(&template.program);
    command.args(&template.args);
    for (key, value) in &template.env {
        command.env(key, value);
    }
    command.stdin(Stdio::inherit());
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());
    command.kill_on_drop(false);

    // SAFETY: see module and function doc above.
    unsafe {
        command.pre_exec(move || {
            for (i, fd) in raw_fds.iter().enumerate() {
                let target = 3 + i as RawFd;
                if *fd != target {
                    nix::unistd::dup2(*fd, target).map_err(|_| io::Error::last_os_error())?;
                }
                // `try_clone_owned`'s underlying `F_DUPFD_CLOEXEC` sets
                // CLOEXEC on every dup, including one that already landed
                // on its target slot without a `dup2` call; clear it here
                // unconditionally so the fd survives this `execve`.
                nix::fcntl::fcntl(
                    target,
                    nix::fcntl::FcntlArg::F_SETFD(nix::fcntl::FdFlag::empty()),
                )
                .map_err(|_| io::Error::last_os_error())?;
            }
            Ok(())
        });
    }

    let result = command.spawn();
    // The duplicated fds (`dup_fds`) live in the parent only to keep the
    // originals open until after `fork`; the child's copies at fds 3.. are
    // independent kernel-level dups and survive this drop.
    drop(dup_fds);
    result
}
