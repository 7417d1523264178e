//! Async subprocess spawning with captured output and a hard timeout.
//!
//! The relay makes exactly one bounded subprocess call per request, so all
//! that is needed here is: spawn, collect stdout/stderr lines, kill on
//! timeout, report the exit status.

use anyhow::{Context, Result};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Output line from a spawned process.
#[derive(Debug, Clone)]
enum ProcessOutput {
    Stdout(String),
    Stderr(String),
}

/// Configuration for spawning a process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// The program to execute.
    pub program: String,
    /// Arguments to pass to the program.
    pub args: Vec<String>,
    /// Timeout for the entire process execution.
    pub timeout: Option<Duration>,
}

impl ProcessOptions {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Result from a completed process.
#[derive(Debug)]
pub struct ProcessResult {
    /// Exit status of the process.
    pub status: ExitStatus,
    /// All stdout lines collected.
    pub stdout: Vec<String>,
    /// All stderr lines collected.
    pub stderr: Vec<String>,
    /// Whether the process was killed due to timeout.
    pub timed_out: bool,
}

impl ProcessResult {
    /// Check if the process exited successfully within its time bound.
    pub fn success(&self) -> bool {
        self.status.success() && !self.timed_out
    }

    /// Get stdout as a single string.
    pub fn stdout_string(&self) -> String {
        self.stdout.join("\n")
    }

    /// Get stderr as a single string.
    pub fn stderr_string(&self) -> String {
        self.stderr.join("\n")
    }

    /// Get the exit code, if available.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Spawn a process and collect all output until it exits or times out.
///
/// On timeout the child is killed and `timed_out` is set; the caller decides
/// what a timeout means (the relay treats it as inference failure).
pub async fn spawn_process(options: ProcessOptions) -> Result<ProcessResult> {
    let mut cmd = Command::new(&options.program);
    cmd.args(&options.args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn process: {}", options.program))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (tx, mut rx) = mpsc::channel::<ProcessOutput>(1000);

    if let Some(stdout) = stdout {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(ProcessOutput::Stdout(line)).await.is_err() {
                    break;
                }
            }
        });
    }

    if let Some(stderr) = stderr {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(ProcessOutput::Stderr(line)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Drop the original sender so the channel closes when the readers finish.
    drop(tx);

    let mut stdout_lines = Vec::new();
    let mut stderr_lines = Vec::new();
    let mut timed_out = false;

    let collect_future = async {
        while let Some(output) = rx.recv().await {
            match output {
                ProcessOutput::Stdout(line) => stdout_lines.push(line),
                ProcessOutput::Stderr(line) => stderr_lines.push(line),
            }
        }
    };

    if let Some(duration) = options.timeout {
        if timeout(duration, collect_future).await.is_err() {
            timed_out = true;
            let _ = child.kill().await;
        }
    } else {
        collect_future.await;
    }

    let status = child
        .wait()
        .await
        .context("Failed to wait for process to exit")?;

    Ok(ProcessResult {
        status,
        stdout: stdout_lines,
        stderr: stderr_lines,
        timed_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_echo() {
        let result = spawn_process(ProcessOptions::new("echo").arg("hello world"))
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout, vec!["hello world"]);
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_nonexistent() {
        let result = spawn_process(ProcessOptions::new("nonexistent_command_12345")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_spawn_with_timeout() {
        let result = spawn_process(
            ProcessOptions::new("sleep")
                .arg("10")
                .timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        assert!(result.timed_out);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_spawn_stderr() {
        let result = spawn_process(ProcessOptions::new("sh").arg("-c").arg("echo error >&2"))
            .await
            .unwrap();

        assert!(result.success());
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, vec!["error"]);
    }

    #[tokio::test]
    async fn test_exit_code() {
        let result = spawn_process(ProcessOptions::new("sh").arg("-c").arg("exit 42"))
            .await
            .unwrap();

        assert!(!result.success());
        assert_eq!(result.code(), Some(42));
    }
}
