// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to reconstruct inherited listener at fd {fd}: {source}")]
    Reconstruct { fd: i32, #[source] source: std::io::Error },

    #[error("failed to bind fresh listener for {addr}: {source}")]
    Bind { addr: String, #[source] source: std::io::Error },
}
