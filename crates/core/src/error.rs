// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared, low-level error variants. Higher-level crates wrap these rather
//! than re-deriving the same cases.

use thiserror::Error;

/// Errors raised while resolving configuration or preparing listeners for
/// inheritance, before any process has been spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("listener is not an inheritable stream socket: {0}")]
    UnsupportedListenerKind(String),

    #[error("failed to prepare listener fd for inheritance: {0}")]
    Io(#[source] std::io::Error),
}
