// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconstruct listeners a worker process inherited from its supervisor,
//! per the frozen `GRACEFUL_LISTENERS` wire format in `graceful_core::wire`.

#![allow(unsafe_code)]

use std::net::TcpListener;
use std::os::fd::{FromRawFd, RawFd};

use graceful_core::{parse_listener_addrs, GRACEFUL_LISTENERS_ENV};
use nix::sys::stat::{fstat, SFlag};

use crate::error::WorkerError;

/// Confirm `fd` is actually an open socket before trusting it enough to
/// construct a `TcpListener` from it. Catches a supervisor/worker fd-layout
/// mismatch (e.g. a stale `GRACEFUL_LISTENERS` pointing past the fds the
/// parent actually attached) instead of handing back a `TcpListener` wrapping
/// an arbitrary, possibly non-socket descriptor.
fn check_is_socket(fd: RawFd) -> Result<(), WorkerError> {
    let st = fstat(fd).map_err(|source| WorkerError::Reconstruct {
        fd,
        source: std::io::Error::from_raw_os_error(source as i32),
    })?;
    let mode = SFlag::from_bits_truncate(st.st_mode);
    if !mode.contains(SFlag::S_IFSOCK) {
        return Err(WorkerError::Reconstruct {
            fd,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "fd is open but is not a socket",
            ),
        });
    }
    Ok(())
}

/// One inherited listener paired with the address string the supervisor
/// reported for it.
pub struct InheritedListener {
    pub listener: TcpListener,
    pub addr: String,
}

/// Just the address strings, in fd order — for workers that only need to
/// know what to bind/log, not the listeners themselves.
pub fn inherited_addrs() -> Vec<String> {
    parse_listener_addrs(&std::env::var(GRACEFUL_LISTENERS_ENV).unwrap_or_default())
}

/// Reconstruct every listener the supervisor attached starting at fd 3, in
/// the order `GRACEFUL_LISTENERS` lists them.
///
/// # Safety-relevant design
/// Each fd `3 + i` is assumed to be a socket the supervisor `dup2`'d for
/// this exact process and address, per the wire contract; `from_raw_fd`
/// takes ownership of it. Calling this more than once would double-own the
/// same fds — callers should call it exactly once, early in `main`.
pub fn inherited_listeners() -> Result<Vec<InheritedListener>, WorkerError> {
    let addrs = inherited_addrs();
    let mut listeners = Vec::with_capacity(addrs.len());
    for (i, addr) in addrs.into_iter().enumerate() {
        let fd = 3 + i as RawFd;
        check_is_socket(fd)?;
        // SAFETY: fd `3 + i` is confirmed open and a socket above, and is
        // the `i`-th listener `dup2`'d into this child by the supervisor
        // before `execve` — not otherwise owned by this process.
        let listener = unsafe { TcpListener::from_raw_fd(fd) };
        listeners.push(InheritedListener { listener, addr });
    }
    Ok(listeners)
}

/// Return the inherited listener bound to `addr` if the supervisor
/// provided one, otherwise bind a fresh one. Mirrors the original's
/// `InheritOrListenTCP`, useful for workers that can also run standalone.
pub fn inherit_or_listen_tcp(addr: &str) -> Result<TcpListener, WorkerError> {
    let inherited = inherited_listeners()?;
    for entry in inherited {
        if entry.addr == addr {
            return Ok(entry.listener);
        }
    }
    TcpListener::bind(addr).map_err(|source| WorkerError::Bind { addr: addr.to_string(), source })
}
