//! External process execution with output capture and hang detection.
//!
//! [`ProcessRunner::run`] spawns one child, drains stdout and stderr into a single
//! buffer, and polls the child at a fixed interval. Whenever the unresponsive
//! timeout elapses while the child is still alive, the caller's callback decides
//! whether to keep waiting or to terminate it.

use camino::Utf8PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Interval between liveness checks of the child process
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for the pipe readers to reach EOF once the child is gone
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Errors that prevent a run from being attempted at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("External tool executable path is not set")]
    ExecutableNotSet,
}

/// What to do when a child process has been running longer than the unresponsive timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitDecision {
    /// Reset the timeout and keep waiting
    KeepWaiting,
    /// Kill the child now
    Terminate,
}

/// A fully described child process invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: Utf8PathBuf,
    pub args: Vec<String>,
    /// Extra environment variables, set on the child only
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Arguments joined into one string, for logging
    pub fn argument_string(&self) -> String {
        self.args
            .iter()
            .map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("\"{}\"", arg)
                } else {
                    arg.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Terminal outcome of a process run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// The process ran and exited on its own (any exit code)
    pub succeeded: bool,

    /// The unresponsive callback asked for the process to be killed
    pub was_cancelled_by_user: bool,

    /// Everything read from stdout and stderr, regardless of outcome
    pub combined_output: String,

    /// Exit code, only when the process exited normally
    pub exit_code: Option<i32>,

    /// Wall-clock time between spawn and completion
    pub duration: Duration,
}

impl ProcessResult {
    fn spawn_failed() -> Self {
        Self::default()
    }
}

enum Completion {
    Exited(ExitStatus),
    Terminated,
    Lost,
}

/// Runs external tools to completion or cancellation
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run `spec` until it exits or `on_unresponsive` asks for termination.
    ///
    /// `on_unresponsive` receives the total time elapsed since spawn. Spawn
    /// failures are not errors: they produce an unsuccessful result with no
    /// output and no exit code.
    ///
    /// # Errors
    /// [`ProcessError::ExecutableNotSet`] if the program path is empty.
    pub async fn run<F>(
        &self,
        spec: &ProcessSpec,
        unresponsive_timeout: Duration,
        mut on_unresponsive: F,
    ) -> Result<ProcessResult, ProcessError>
    where
        F: FnMut(Duration) -> WaitDecision,
    {
        if spec.program.as_str().trim().is_empty() {
            return Err(ProcessError::ExecutableNotSet);
        }

        let mut cmd = Command::new(spec.program.as_std_path());
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        tracing::info!("Running {} {}", spec.program, spec.argument_string());

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(
                    "There was an issue running \"{}\": {}. Check the path to the executable in your settings.",
                    spec.program,
                    e
                );
                return Ok(ProcessResult::spawn_failed());
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        drop(tx);

        let mut output = Vec::new();
        // None when the timeout is too far out to represent: never prompt
        let mut deadline = Instant::now().checked_add(unresponsive_timeout);

        let completion = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Completion::Exited(status),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Lost track of {}: {}", spec.program, e);
                    break Completion::Lost;
                }
            }

            drain(&mut rx, &mut output);

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                match on_unresponsive(start.elapsed()) {
                    WaitDecision::KeepWaiting => {
                        tracing::info!(
                            "{} still running after {:.1}s, waiting longer",
                            spec.program,
                            start.elapsed().as_secs_f64()
                        );
                        deadline = Instant::now().checked_add(unresponsive_timeout);
                    }
                    WaitDecision::Terminate => {
                        tracing::warn!("Terminating {} before completion", spec.program);
                        break Completion::Terminated;
                    }
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        };

        if !matches!(completion, Completion::Exited(_)) {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill {}: {}", spec.program, e);
            }
        }

        finish_pumps(pumps).await;
        drain(&mut rx, &mut output);

        let combined_output = String::from_utf8_lossy(&output).into_owned();
        let duration = start.elapsed();

        let result = match completion {
            Completion::Exited(status) => ProcessResult {
                succeeded: true,
                was_cancelled_by_user: false,
                combined_output,
                exit_code: status.code(),
                duration,
            },
            Completion::Terminated => ProcessResult {
                succeeded: false,
                was_cancelled_by_user: true,
                combined_output,
                exit_code: None,
                duration,
            },
            Completion::Lost => ProcessResult {
                succeeded: false,
                was_cancelled_by_user: false,
                combined_output,
                exit_code: None,
                duration,
            },
        };

        tracing::info!(
            "{} output:\n{}\nReturn Code: {}",
            spec.program,
            result.combined_output,
            result
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "none".to_string())
        );

        if result.succeeded {
            tracing::info!(
                "Execution complete in {:.2}s",
                result.duration.as_secs_f32()
            );
        } else {
            tracing::error!("Execution failed");
        }

        Ok(result)
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward everything readable from `reader` to `tx` until EOF
async fn pump<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("Pipe read failed: {}", e);
                break;
            }
        }
    }
}

/// Wait briefly for the pipe readers to hit EOF, then abandon them.
///
/// A grandchild that inherited the pipes can keep them open after the child exits.
async fn finish_pumps(pumps: Vec<JoinHandle<()>>) {
    for mut handle in pumps {
        if tokio::time::timeout(PIPE_DRAIN_GRACE, &mut handle)
            .await
            .is_err()
        {
            tracing::debug!("Pipe reader still busy after exit, abandoning it");
            handle.abort();
        }
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Vec<u8>>, output: &mut Vec<u8>) {
    while let Ok(chunk) = rx.try_recv() {
        output.extend_from_slice(&chunk);
    }
}
