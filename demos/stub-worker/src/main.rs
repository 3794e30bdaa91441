// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal worker used to exercise the supervisor end-to-end: inherits its
//! first listener, serves `GET /ping` and `GET /delay`, and drains
//! in-flight requests on SIGTERM before exiting. Mirrors the stub HTTP
//! server the original test suite spawns as a child process
//! (`cmd/testdata/stub_http.go`), minus the `net/http` dependency this
//! workspace has no equivalent for.
//!
//! Three environment variables let the integration suite misbehave this
//! worker on demand, in lieu of maintaining a separate binary per scenario:
//! `STUB_BIND_DELAY_MS` (sleep before touching the inherited listener),
//! `STUB_EXIT_AFTER_MS` + `STUB_EXIT_CODE` (exit unprompted once serving).

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinSet;

#[tokio::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Some(delay) = env_millis("STUB_BIND_DELAY_MS") {
        tokio::time::sleep(delay).await;
    }

    if let (Some(after), code) = (env_millis("STUB_EXIT_AFTER_MS"), env_exit_code()) {
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tracing::warn!(code, "stub worker exiting unprompted");
            std::process::exit(code);
        });
    }

    let inherited = graceful_worker::inherited_listeners()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let std_listener = inherited
        .into_iter()
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no inherited listener on fd 3"))?
        .listener;
    std_listener.set_nonblocking(true)?;
    let listener = tokio::net::TcpListener::from_std(std_listener)?;

    tracing::info!(addr = ?listener.local_addr()?, "stub worker listening");

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                handlers.spawn(async move {
                    if let Err(e) = handle_connection(stream).await {
                        tracing::debug!(error = %e, "connection handler error");
                    }
                });
            }
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received, draining in-flight requests");
                break;
            }
        }
    }

    while handlers.join_next().await.is_some() {}
    tracing::info!("stub worker drained, exiting");
    Ok(())
}

/// Reads one request line, ignores headers, and writes a tiny fixed
/// response for `/ping` and `/delay`. Not a real HTTP implementation —
/// just enough for the integration tests' plain `GET` probes.
async fn handle_connection(mut stream: TcpStream) -> io::Result<()> {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let path = request.split_whitespace().nth(1).unwrap_or("/");

    let body: &[u8] = match path {
        "/delay" => {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            b"ok"
        }
        _ => b"ok",
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.shutdown().await?;
    Ok(())
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.parse::<u64>().ok().map(Duration::from_millis)
}

fn env_exit_code() -> i32 {
    std::env::var("STUB_EXIT_CODE").ok().and_then(|v| v.parse().ok()).unwrap_or(1)
}
