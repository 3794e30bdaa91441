// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket Inheritance: turn owned listeners into fds a worker child can
//! inherit starting at fd 3, and the `GRACEFUL_LISTENERS` env var that
//! tells it which address belongs to which fd.

use std::net::TcpListener;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use graceful_core::{format_listener_addrs, ConfigError, GRACEFUL_LISTENERS_ENV};

/// One supervisor-owned listener, paired with its bound address.
///
/// The underlying socket is shared by handoff to every worker generation;
/// it is closed only when this handle is dropped (i.e. when the
/// `LifecycleEngine` that owns it is torn down), never between
/// generations.
pub struct ListenerHandle {
    listener: TcpListener,
    addr: String,
}

impl ListenerHandle {
    /// Wrap an already-bound TCP listener for inheritance. Only stream
    /// (TCP) listeners are supported; this mirrors the original's type
    /// switch in `createListenerFiles`, which only handles `*net.TCPListener`.
    pub fn from_tcp_listener(listener: TcpListener) -> Result<Self, ConfigError> {
        let addr = listener.local_addr().map_err(ConfigError::Io)?.to_string();
        Ok(Self { listener, addr })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }

    /// Duplicate the underlying fd. Used right before spawn so the child's
    /// copy (and `CLOEXEC` toggling on it) never touches the supervisor's
    /// own long-lived fd.
    pub(crate) fn try_clone_owned(&self) -> std::io::Result<OwnedFd> {
        self.listener.try_clone().map(OwnedFd::from)
    }
}

/// All-or-nothing conversion of owned listeners into inheritable handles.
///
/// Every listener in `listeners` must be a kind this crate knows how to
/// inherit. On the first unsupported kind or I/O error, handles already
/// produced for earlier entries are dropped (closing their duplicated fds)
/// before the error returns — callers still own, and may close, the
/// original `listeners` themselves.
pub fn prepare_listeners(
    listeners: Vec<TcpListener>,
) -> Result<Vec<ListenerHandle>, ConfigError> {
    let mut handles = Vec::with_capacity(listeners.len());
    for listener in listeners {
        match ListenerHandle::from_tcp_listener(listener) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                // `handles` drops here, closing everything materialized so far.
                return Err(err);
            }
        }
    }
    Ok(handles)
}

/// Build the `GRACEFUL_LISTENERS` environment entry for the given handles,
/// in the same order they'll be attached as extra fds starting at fd 3.
pub fn listeners_env_entry(handles: &[ListenerHandle]) -> (String, String) {
    let addrs: Vec<String> = handles.iter().map(|h| h.addr().to_string()).collect();
    (GRACEFUL_LISTENERS_ENV.to_string(), format_listener_addrs(&addrs))
}
