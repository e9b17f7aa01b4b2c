//! Launches the optional companion process and relays its output into the
//! gateway log for as long as it runs.

use futures::future;
use futures::stream::{self, Stream, StreamExt};
use log::{debug, error, info, warn};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::SplitStream;

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    /// Script file name, looked up in `working_dir`.
    pub script: String,
    /// Program the script is handed to.
    pub runtime: String,
    pub working_dir: PathBuf,
    pub startup_delay: Duration,
}

/// Owns the background task that owns the child. Dropping it detaches the
/// task; the companion keeps running alongside the gateway.
pub struct CompanionHandle {
    task: JoinHandle<Option<ExitStatus>>,
}

impl CompanionHandle {
    /// Resolves once the companion exits and its output is drained. `None`
    /// when it could not be started or awaited.
    pub async fn wait(self) -> Option<ExitStatus> {
        self.task.await.ok().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Stdout,
    Stderr,
}

pub struct Supervisor {
    config: CompanionConfig,
}

impl Supervisor {
    pub fn new(config: CompanionConfig) -> Self {
        Supervisor { config }
    }

    pub fn script_path(&self) -> PathBuf {
        self.config.working_dir.join(&self.config.script)
    }

    /// Starts supervision. Returns `None` without doing anything when the
    /// companion script is absent.
    pub fn start(self) -> Option<CompanionHandle> {
        let script = self.script_path();
        if !script.is_file() {
            info!(
                "No companion found at '{}'. Skipping supervision.",
                script.display()
            );
            return None;
        }
        let task = tokio::spawn(async move { self.run().await });
        Some(CompanionHandle { task })
    }

    async fn run(self) -> Option<ExitStatus> {
        let name = self.config.script.clone();
        if !self.config.startup_delay.is_zero() {
            debug!(
                "Waiting {:?} before launching companion '{}'",
                self.config.startup_delay, name
            );
            tokio::time::sleep(self.config.startup_delay).await;
        }

        info!("Launching companion: {} {}", self.config.runtime, name);
        let mut child = match Command::new(&self.config.runtime)
            .arg(&self.config.script)
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to launch companion '{}': {}", name, e);
                return None;
            }
        };

        let stdout = child.stdout.take().map(BufReader::new);
        let stderr = child.stderr.take().map(BufReader::new);
        let relayed = match (stdout, stderr) {
            (Some(out), Some(err)) => relay(&name, out, err).await,
            (Some(out), None) => relay(&name, out, tokio::io::empty()).await,
            (None, Some(err)) => relay(&name, tokio::io::empty(), err).await,
            (None, None) => 0,
        };
        debug!("Relayed {} lines from companion '{}'", relayed, name);

        match child.wait().await {
            Ok(status) => {
                info!("Process Terminated:: companion '{}' exited with {}", name, status);
                Some(status)
            }
            Err(e) => {
                error!("Process Terminated:: failed to await companion '{}': {}", name, e);
                None
            }
        }
    }
}

/// Splits a channel into lines, ending the stream right after the first read
/// error so a broken pipe is reported once.
fn lines_until_error<R>(reader: R) -> impl Stream<Item = io::Result<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    SplitStream::new(reader.split(b'\n')).scan(false, |failed, line| {
        if *failed {
            return future::ready(None);
        }
        *failed = line.is_err();
        future::ready(Some(line))
    })
}

/// Forwards both output channels line by line until both reach end of
/// stream. Returns the number of lines logged.
pub async fn relay<O, E>(name: &str, stdout: O, stderr: E) -> usize
where
    O: AsyncBufRead + Unpin,
    E: AsyncBufRead + Unpin,
{
    let out = lines_until_error(stdout).map(|line| (Channel::Stdout, line));
    let err = lines_until_error(stderr).map(|line| (Channel::Stderr, line));
    let mut lines = stream::select(out, err);

    let mut count = 0;
    while let Some((channel, line)) = lines.next().await {
        match line {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let text = text.trim_end_matches('\r');
                match channel {
                    Channel::Stdout => info!("[{}] {}", name, text),
                    Channel::Stderr => warn!("[{}] {}", name, text),
                }
                count += 1;
            }
            Err(e) => {
                warn!("Stopped reading {:?} of companion '{}': {}", channel, name, e);
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir, script: &str) -> CompanionConfig {
        CompanionConfig {
            script: script.to_string(),
            runtime: "sh".to_string(),
            working_dir: dir.path().to_path_buf(),
            startup_delay: Duration::from_millis(10),
        }
    }

    #[actix_rt::test]
    async fn absent_companion_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        assert!(Supervisor::new(config(&dir, "server.js")).start().is_none());
    }

    #[actix_rt::test]
    async fn relays_both_channels() {
        let stdout: &[u8] = b"listening on 3000\r\nready\n";
        let stderr: &[u8] = b"deprecated \xff api";
        assert_eq!(relay("server.js", stdout, stderr).await, 3);
    }

    struct BrokenPipe;

    impl tokio::io::AsyncRead for BrokenPipe {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<io::Result<()>> {
            std::task::Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")))
        }
    }

    #[actix_rt::test]
    async fn failing_channel_is_dropped_after_first_error() {
        let stdout: &[u8] = b"still talking\n";
        let relayed = tokio::time::timeout(
            Duration::from_secs(5),
            relay("server.js", stdout, BufReader::new(BrokenPipe)),
        )
        .await
        .expect("relay stops on a failing channel");
        assert_eq!(relayed, 1);
    }

    #[actix_rt::test]
    async fn empty_output_relays_nothing() {
        assert_eq!(relay("server.js", tokio::io::empty(), tokio::io::empty()).await, 0);
    }

    #[cfg(unix)]
    #[actix_rt::test]
    async fn companion_runs_to_completion() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("companion.sh"),
            "echo started\necho oops >&2\nexit 3\n",
        )
        .unwrap();
        let handle = Supervisor::new(config(&dir, "companion.sh"))
            .start()
            .expect("companion present");
        let status = handle.wait().await.expect("exit status");
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[actix_rt::test]
    async fn missing_runtime_is_logged_not_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("server.js"), "").unwrap();
        let mut cfg = config(&dir, "server.js");
        cfg.runtime = "definitely-not-a-real-runtime".to_string();
        let handle = Supervisor::new(cfg).start().expect("companion present");
        assert!(handle.wait().await.is_none());
    }
}
