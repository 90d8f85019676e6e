//! Child process execution with output capture, timeout and cancellation.
//!
//! [`run_command`] is the single place the pipeline spawns an external
//! process. The caller sets program, arguments and working directory; this
//! module wires the pipes, waits, and turns the result into a
//! [`RenderOutput`].

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::engine::{RenderError, RenderOutput};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output beyond the limit is read and dropped so a verbose renderer can
/// neither exhaust memory nor block on a full pipe.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

enum Waited {
    Finished(std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)>),
    TimedOut,
    Cancelled,
}

/// Spawn `cmd`, capture stdout/stderr, and wait for it to exit.
///
/// `timeout` bounds the whole run, including draining the output pipes,
/// which stay open as long as any process that inherited them is alive.
/// The child runs in its own process group, which is killed when this
/// function returns or its future is dropped (for example when the HTTP
/// request is abandoned), so no background process it started outlives it.
pub async fn run_command(
    cmd: &mut Command,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<RenderOutput, RenderError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + timeout;

    let mut child = cmd
        .spawn()
        .map_err(|source| RenderError::Spawn { program, source })?;
    // Kills stray background processes however this function is left,
    // including when the future is dropped.
    let _group = ProcessGroupGuard(child.id());

    // Read both streams concurrently so a full pipe cannot block the child.
    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let run = async {
        let status = child.wait().await?;
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        Ok::<_, std::io::Error>((status, stdout, stderr))
    };

    let waited = tokio::select! {
        biased;
        () = cancel.cancelled() => Waited::Cancelled,
        () = tokio::time::sleep_until(deadline) => Waited::TimedOut,
        result = run => Waited::Finished(result),
    };

    match waited {
        Waited::Finished(Ok((status, stdout_bytes, stderr_bytes))) => Ok(RenderOutput {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            exit_code: status.code().unwrap_or(-1),
            duration_ms: start.elapsed().as_millis() as u64,
        }),
        Waited::Finished(Err(e)) => {
            abort_readers(&stdout_task, &stderr_task);
            Err(RenderError::Io(e))
        }
        Waited::TimedOut => {
            kill(&mut child).await;
            abort_readers(&stdout_task, &stderr_task);
            Err(RenderError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            })
        }
        Waited::Cancelled => {
            kill(&mut child).await;
            abort_readers(&stdout_task, &stderr_task);
            Err(RenderError::Cancelled)
        }
    }
}

/// Kill the child and reap it. Failures are logged; the process may
/// already have exited.
async fn kill(child: &mut Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill render process");
    }
}

fn abort_readers(
    stdout_task: &tokio::task::JoinHandle<Vec<u8>>,
    stderr_task: &tokio::task::JoinHandle<Vec<u8>>,
) {
    stdout_task.abort();
    stderr_task.abort();
}

/// Kills the child's process group on drop.
struct ProcessGroupGuard(Option<u32>);

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        kill_process_group(self.0);
    }
}

/// SIGKILL every process in the group led by the child.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    let Some(pgid) = pgid else {
        return;
    };
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };

    // Safety: killpg only takes plain integers; a group with no members
    // left reports ESRCH.
    let ret = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(error = %err, pgid, "Failed to kill render process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

/// Read an entire output stream, keeping at most [`MAX_OUTPUT_BYTES`].
///
/// The rest is drained so the writer never sees a closed pipe.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}
