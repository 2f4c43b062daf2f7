//! External tool runner with captured output and a hard wall-clock timeout.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProcessError;

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` to completion. A process still alive after `timeout` is
/// killed and reaped before the timeout error is returned.
pub async fn run<I, S>(command: &str, args: I, timeout: Duration) -> Result<ProcessOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let started = Instant::now();
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let mut stdout = child.stdout.take().map(drain);
    let mut stderr = child.stderr.take().map(drain);

    // Pipes may be held open by descendants, so the bound covers draining too.
    let finished = tokio::time::timeout(timeout, async {
        let status = child.wait().await;
        let output = ProcessOutput {
            stdout: collect(stdout.as_mut()).await,
            stderr: collect(stderr.as_mut()).await,
        };
        (status, output)
    })
    .await;

    let (status, output) = match finished {
        Ok((status, output)) => {
            let status = status.map_err(|err| ProcessError::Io {
                command: command.to_string(),
                message: err.to_string(),
            })?;
            (status, output)
        }
        Err(_) => {
            warn!(command, timeout_ms = timeout.as_millis() as u64, "Process timed out, killing");
            // kill() also waits, so the child is reaped here.
            if let Err(err) = child.kill().await {
                warn!(command, "Failed to kill timed out process: {}", err);
            }
            for handle in stdout.iter().chain(stderr.iter()) {
                handle.abort();
            }
            return Err(ProcessError::Timeout {
                command: command.to_string(),
                timeout,
            });
        }
    };

    debug!(
        command,
        code = ?status.code(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Process finished"
    );

    if status.success() {
        return Ok(output);
    }

    let detail = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };

    Err(ProcessError::NonZeroExit {
        command: command.to_string(),
        code: status.code(),
        output: detail,
    })
}

fn drain<R>(mut reader: R) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        buf
    })
}

async fn collect(handle: Option<&mut JoinHandle<Vec<u8>>>) -> String {
    match handle {
        Some(handle) => handle
            .await
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default(),
        None => String::new(),
    }
}
