use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::WorkerError;

const MAX_STDERR_CHARS: usize = 512;

/// Runs `program` as a child process and returns its stdout.
///
/// The child is killed when `timeout` elapses. A non-zero exit or death by
/// signal is reported as [`WorkerError::Crash`], distinct from
/// [`WorkerError::Timeout`].
pub async fn run_isolated(
    operation: &str,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<Vec<u8>, WorkerError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| WorkerError::Spawn {
            program: program.to_string(),
            source: e,
        })?;

    // Dropping the pending future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| WorkerError::Io {
            path: program.into(),
            source: e,
        })?,
        Err(_) => {
            tracing::warn!(
                operation,
                program,
                timeout_ms = timeout.as_millis() as u64,
                "Worker timed out, killed"
            );
            return Err(WorkerError::Timeout {
                operation: operation.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
        return Err(WorkerError::Crash {
            operation: operation.to_string(),
            code: output.status.code(),
            stderr,
        });
    }

    Ok(output.stdout)
}
