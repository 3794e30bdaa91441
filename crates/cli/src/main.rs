// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `graceful`: bind listeners, spawn a worker that inherits them, and keep
//! it alive across manual restarts and signals until shutdown.
//!
//! ```text
//! graceful -l 127.0.0.1:8080 -l 127.0.0.1:8081 --auto-restart-enabled -- ./worker --flag
//! ```

mod exit_error;

use std::net::TcpListener;
use std::time::Duration;

use clap::Parser;
use exit_error::ExitError;
use graceful_core::Options;

/// Process supervisor providing zero-downtime restart and graceful
/// shutdown for socket-based server programs.
#[derive(Debug, Parser)]
#[command(name = "graceful", version, about)]
struct Cli {
    /// Address to bind and hand to the worker as an inherited listener.
    /// Repeat to bind more than one.
    #[arg(short = 'l', long = "listen", value_name = "ADDR")]
    listen: Vec<String>,

    /// Extra `KEY=VALUE` environment variable for the worker. Repeat for
    /// more than one. Appended to the inherited environment.
    #[arg(short = 'e', long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Restart the worker automatically (with capped exponential backoff)
    /// if it exits unexpectedly.
    #[arg(long)]
    auto_restart_enabled: bool,

    /// Timeout for the initial `Start`, e.g. "10s".
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    start_timeout: Duration,

    /// Timeout for `RestartProcess`, e.g. "20s".
    #[arg(long, value_parser = humantime::parse_duration, default_value = "20s")]
    restart_timeout: Duration,

    /// Timeout for `Shutdown`, e.g. "10s".
    #[arg(long, value_parser = humantime::parse_duration, default_value = "10s")]
    shutdown_timeout: Duration,

    /// Delay between a new generation becoming ready and the old
    /// generation being signaled to stop.
    #[arg(long, value_parser = humantime::parse_duration, default_value = "1s")]
    stop_old_delay: Duration,

    /// The worker program and its arguments, after `--`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    command: Vec<String>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    Ok((key.to_string(), value.to_string()))
}

fn bind_listeners(addrs: &[String]) -> Result<Vec<TcpListener>, ExitError> {
    addrs
        .iter()
        .map(|addr| {
            TcpListener::bind(addr)
                .map_err(|e| ExitError::usage(format!("failed to bind {addr}: {e}")))
        })
        .collect()
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let listeners = bind_listeners(&cli.listen)?;

    let (program, args) = cli
        .command
        .split_first()
        .ok_or_else(|| ExitError::usage("a worker command is required after `--`"))?;

    let mut env: Vec<(String, String)> = std::env::vars().collect();
    env.extend(cli.env);

    let builder = Options::builder()
        .args(args.to_vec())
        .env(env)
        .listeners(listeners)
        .auto_restart_enabled(cli.auto_restart_enabled)
        .timeouts(Some(cli.start_timeout), Some(cli.restart_timeout), Some(cli.shutdown_timeout))
        .stop_old_delay(cli.stop_old_delay);

    graceful_supervisor::serve(program.clone(), builder.build())
        .await
        .map_err(|e| ExitError::runtime(e.to_string()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e.message, "graceful exited with an error");
        eprintln!("graceful: {}", e.message);
        std::process::exit(e.code);
    }
}
