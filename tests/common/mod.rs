//! Shared integration-test harness: an in-process run store, a scripted
//! `escaperoom play` child process, and one-shot command runs.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use escaperoom::persistence::{MemoryStore, RunStore};
use escaperoom::server;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default timeout for waiting on child output.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Path to the compiled binary.
pub const BIN: &str = env!("CARGO_BIN_EXE_escaperoom");

/// Returns the path to a test fixture.
#[must_use]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the binary to completion with `args`.
#[allow(clippy::missing_panics_doc)]
#[must_use]
pub fn run_command(args: &[&str]) -> Output {
    std::process::Command::new(BIN)
        .args(args)
        .env_remove("ESCAPEROOM_STORE_URL")
        .env_remove("ESCAPEROOM_PREFS")
        .env_remove("ESCAPEROOM_SCENARIO")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run escaperoom")
}

/// A run store served over HTTP from this process.
pub struct TestStore {
    pub store: Arc<MemoryStore>,
    pub addr: SocketAddr,
    cancel: CancellationToken,
}

impl TestStore {
    /// Starts a store on an ephemeral localhost port.
    #[allow(clippy::missing_panics_doc)]
    pub async fn start() -> Self {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let shared: Arc<dyn RunStore> = store.clone();
        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            server::serve(
                shared,
                "127.0.0.1:0".parse().expect("valid addr"),
                server_cancel,
                move |bound| {
                    let _ = tx.send(bound);
                },
            )
            .await
            .expect("store server failed");
        });

        let addr = tokio::time::timeout(DEFAULT_TIMEOUT, rx)
            .await
            .expect("store did not bind in time")
            .expect("store task ended before binding");
        Self { store, addr, cancel }
    }

    /// Base URL of the store.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A running `escaperoom play` child fed line by line.
///
/// The child is killed on drop.
pub struct PlayProcess {
    child: Child,
    stdin: tokio::process::ChildStdin,
    reader: BufReader<tokio::process::ChildStdout>,
    transcript: String,
}

impl PlayProcess {
    /// Spawns `escaperoom play` with extra `args`.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn(args: &[&str]) -> Self {
        let mut child = Command::new(BIN)
            .arg("--quiet")
            .arg("play")
            .args(args)
            .env_remove("ESCAPEROOM_STORE_URL")
            .env_remove("ESCAPEROOM_PREFS")
            .env_remove("ESCAPEROOM_SCENARIO")
            .env("NO_COLOR", "1")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn escaperoom play");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");
        Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            transcript: String::new(),
        }
    }

    /// Sends one command line.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send(&mut self, line: &str) {
        self.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("failed to write to stdin");
        self.stdin.flush().await.expect("failed to flush stdin");
    }

    /// Reads stdout until a line contains `needle`; returns that line.
    #[allow(clippy::missing_panics_doc)]
    pub async fn expect_line(&mut self, needle: &str) -> String {
        let result = tokio::time::timeout(DEFAULT_TIMEOUT, async {
            let mut line = String::new();
            loop {
                line.clear();
                let n = self.reader.read_line(&mut line).await.expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF waiting for {needle:?}\n{}", self.transcript);
                self.transcript.push_str(&line);
                if line.contains(needle) {
                    return line.trim_end().to_string();
                }
            }
        })
        .await;
        result.unwrap_or_else(|_| panic!("timed out waiting for {needle:?}\n{}", self.transcript))
    }

    /// Closes stdin and waits for the process to exit.
    #[allow(clippy::missing_panics_doc)]
    pub async fn finish(self) -> std::process::ExitStatus {
        let Self { mut child, stdin, .. } = self;
        drop(stdin);
        match tokio::time::timeout(DEFAULT_TIMEOUT, child.wait()).await {
            Ok(status) => status.expect("wait failed"),
            Err(_) => {
                child.kill().await.expect("failed to kill child");
                panic!("play did not exit after EOF");
            }
        }
    }
}
