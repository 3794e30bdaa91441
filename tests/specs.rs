// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios driving the compiled `graceful` binary against the
//! stub worker, mirroring `cmd/graceful_test.go` in the original test
//! suite: spawn the supervisor as a real child process, poke it with real
//! signals and real TCP requests, and assert on the process tree.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serial_test::serial;

fn bin(name: &str) -> PathBuf {
    assert_cmd::cargo::cargo_bin(name)
}

/// Bind an ephemeral port and immediately release it, the same race the
/// original test helper (`freeTCPAddr`) accepts.
fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local_addr");
    drop(listener);
    addr.to_string()
}

struct Graceful {
    child: Child,
    addr: String,
}

impl Graceful {
    fn spawn(addr: &str, flags: &[&str], worker_env: &[(&str, &str)]) -> Self {
        let mut cmd = Command::new(bin("graceful"));
        cmd.arg("-l").arg(addr).args(flags).arg("--").arg(bin("graceful-stub-worker"));
        for (k, v) in worker_env {
            cmd.env(k, v);
        }
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        let child = cmd.spawn().expect("spawn graceful");
        Self { child, addr: addr.to_string() }
    }

    fn pid(&self) -> i32 {
        self.child.id() as i32
    }

    fn sigterm(&self) {
        let _ = kill(Pid::from_raw(self.pid()), Signal::SIGTERM);
    }

    fn sighup(&self) {
        let _ = kill(Pid::from_raw(self.pid()), Signal::SIGHUP);
    }

    /// Wait for the supervisor itself to exit, returning its status code.
    fn wait_exit(&mut self, timeout: Duration) -> Option<i32> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                return status.code();
            }
            if Instant::now() >= deadline {
                return None;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for Graceful {
    fn drop(&mut self) {
        let _ = kill(Pid::from_raw(self.pid()), Signal::SIGKILL);
        let _ = self.child.wait();
    }
}

fn http_get(addr: &str, path: &str) -> Option<u16> {
    let mut stream = TcpStream::connect(addr).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).ok()?;
    let mut response = String::new();
    stream.read_to_string(&mut response).ok()?;
    let status_line = response.lines().next()?;
    status_line.split_whitespace().nth(1)?.parse().ok()
}

fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// pids of live processes whose parent pid is `ppid`, read straight out of
/// `/proc`, same approach as the original's `ps`-backed `findProcesses`.
fn children_of(ppid: i32) -> Vec<i32> {
    let mut out = Vec::new();
    let Ok(entries) = std::fs::read_dir("/proc") else { return out };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(entry.path().join("stat")) else { continue };
        // Fields after the `(comm)` block are space separated; ppid is field 4.
        let Some(after_comm) = stat.rsplit_once(')') else { continue };
        let fields: Vec<&str> = after_comm.1.split_whitespace().collect();
        if let Some(pp) = fields.get(1).and_then(|s| s.parse::<i32>().ok()) {
            if pp == ppid {
                out.push(pid);
            }
        }
    }
    out
}

fn pid_alive(pid: i32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}

fn wait_no_descendants(timeout: Duration, pids: &[i32]) -> bool {
    wait_until(timeout, || pids.iter().all(|&p| !pid_alive(p)))
}

#[test]
#[serial]
fn s1_start_and_shutdown() {
    let addr = free_addr();
    let mut g = Graceful::spawn(&addr, &[], &[]);

    assert!(
        wait_until(Duration::from_secs(1), || !children_of(g.pid()).is_empty()),
        "worker should be spawned"
    );
    let worker_pid = children_of(g.pid())[0];

    assert!(
        wait_until(Duration::from_secs(1), || http_get(&addr, "/ping") == Some(200)),
        "ping should eventually succeed"
    );

    g.sigterm();
    let code = g.wait_exit(Duration::from_secs(1));
    assert_eq!(code, Some(0), "clean shutdown exits 0");
    assert!(wait_no_descendants(Duration::from_secs(1), &[worker_pid]));
}

#[test]
#[serial]
fn s2_graceful_restart_under_load() {
    let addr = free_addr();
    let mut g = Graceful::spawn(&addr, &[], &[]);

    assert!(wait_until(Duration::from_secs(1), || !children_of(g.pid()).is_empty()));
    let old_worker = children_of(g.pid())[0];

    let addr_clone = addr.clone();
    let delay_during_restart = std::thread::spawn(move || http_get(&addr_clone, "/delay"));
    std::thread::sleep(Duration::from_millis(100));
    g.sighup();

    assert_eq!(delay_during_restart.join().unwrap(), Some(200));
    assert!(
        wait_no_descendants(Duration::from_secs(10), &[old_worker]),
        "old worker should terminate after restart"
    );
    assert!(
        wait_until(Duration::from_secs(1), || {
            children_of(g.pid()).iter().any(|&p| p != old_worker)
        }),
        "a new worker should be running"
    );
    assert_eq!(http_get(&addr, "/delay"), Some(200));

    g.sigterm();
    assert_eq!(g.wait_exit(Duration::from_secs(1)), Some(0));
}

#[test]
#[serial]
fn s3_restart_storm_holds_one_worker_alive_under_contention() {
    let addr = free_addr();
    let mut g = Graceful::spawn(&addr, &[], &[]);
    assert!(wait_until(Duration::from_secs(1), || !children_of(g.pid()).is_empty()));

    // Scaled down from the wall-clock-heavy version of this property for
    // suite speed; the contention shape (GETs racing SIGHUPs) is unchanged.
    let duration = Duration::from_secs(3);
    let deadline = Instant::now() + duration;

    let addr_clone = addr.clone();
    let requester = std::thread::spawn(move || {
        let mut saw_non_200 = false;
        while Instant::now() < deadline {
            if http_get(&addr_clone, "/delay") != Some(200) {
                saw_non_200 = true;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        saw_non_200
    });

    let supervisor_pid = g.pid();
    let restarter = std::thread::spawn(move || {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            let _ = kill(Pid::from_raw(supervisor_pid), Signal::SIGHUP);
            std::thread::sleep(Duration::from_secs(1));
        }
    });

    let saw_non_200 = requester.join().unwrap();
    restarter.join().unwrap();
    assert!(!saw_non_200, "no GET should fail during restart contention");

    assert!(
        wait_until(Duration::from_secs(2), || children_of(g.pid()).len() == 1),
        "exactly one worker should be alive once contention settles"
    );
    let last_worker = children_of(g.pid())[0];

    g.sigterm();
    assert_eq!(g.wait_exit(Duration::from_secs(2)), Some(0));
    assert!(wait_no_descendants(Duration::from_secs(1), &[last_worker]));
}

#[test]
#[serial]
fn s5_unexpected_exit_without_auto_restart_fails_serve() {
    let addr = free_addr();
    let mut g = Graceful::spawn(
        &addr,
        &[],
        &[("STUB_EXIT_AFTER_MS", "200"), ("STUB_EXIT_CODE", "1")],
    );

    let code = g.wait_exit(Duration::from_millis(800));
    assert_eq!(code, Some(1), "unexpected worker exit should fail the supervisor");
    assert!(wait_no_descendants(Duration::from_secs(1), &children_of(g.pid())));
}

#[test]
#[serial]
fn s6_unexpected_exit_with_auto_restart_keeps_serving() {
    let addr = free_addr();
    let mut g = Graceful::spawn(
        &addr,
        &["--auto-restart-enabled"],
        &[("STUB_EXIT_AFTER_MS", "200"), ("STUB_EXIT_CODE", "1")],
    );

    assert!(wait_until(Duration::from_secs(1), || !children_of(g.pid()).is_empty()));
    let first_worker = children_of(g.pid())[0];

    assert!(
        wait_until(Duration::from_secs(3), || {
            children_of(g.pid()).iter().any(|&p| p != first_worker)
        }),
        "supervisor should respawn the worker after its unexpected exit"
    );

    g.sigterm();
    let code = g.wait_exit(Duration::from_secs(1));
    assert_eq!(code, Some(0), "Serve should return cleanly once shut down");
    assert!(wait_no_descendants(Duration::from_secs(1), &children_of(g.pid())));
}
