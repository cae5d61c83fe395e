//! Running local programs with a timeout

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Time a program gets to exit after SIGTERM before the group is killed
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How long output is still collected once the program itself is gone.
/// Descendants that keep the pipes open are not waited for.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Outcome of running a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramRun {
    /// Program exited on its own
    Completed { code: Option<i32>, output: String },
    /// Program was stopped after the timeout
    TimedOut { output: String },
    /// Path does not exist or cannot be executed
    NotRunnable,
}

/// Check that `path` is a regular file the current user may execute
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Run `path` with `args`, capturing combined stdout/stderr.
///
/// The program runs in its own process group. On timeout the whole group is
/// terminated, so the call returns within `timeout` plus the kill and drain
/// grace periods even when the program forked.
pub async fn run_program(path: &Path, args: &[String], timeout: Duration) -> Result<ProgramRun> {
    if !is_executable(path) {
        return Ok(ProgramRun::NotRunnable);
    }

    let mut command = Command::new(path);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
            debug!(path = %path.display(), error = %e, "Program not runnable");
            return Ok(ProgramRun::NotRunnable);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to start {}", path.display()));
        }
    };
    let pid = child.id();

    let stdout = Capture::spawn(child.stdout.take());
    let stderr = Capture::spawn(child.stderr.take());

    let code = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => Some(status.context("Failed to wait for program")?.code()),
        Err(_) => {
            warn!(path = %path.display(), timeout_secs = timeout.as_secs(), "Program timed out");
            terminate(&mut child, pid).await;
            None
        }
    };

    let (mut output, err) = tokio::join!(stdout.finish(), stderr.finish());
    if !err.is_empty() {
        if !output.is_empty() {
            output.push_str("\n--- stderr ---\n");
        }
        output.push_str(&err);
    }

    Ok(match code {
        Some(code) => ProgramRun::Completed { code, output },
        None => ProgramRun::TimedOut { output },
    })
}

/// Output collected in the background so a partial read survives a timeout
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let task = tokio::spawn(async move {
            let Some(mut reader) = reader else {
                return;
            };
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                }
            }
        });

        Self { buffer, task }
    }

    async fn finish(self) -> String {
        let mut task = self.task;
        if tokio::time::timeout(DRAIN_GRACE, &mut task).await.is_err() {
            debug!("Pipe still held open by a descendant, stopped reading");
            task.abort();
        }

        let bytes = self.buffer.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).trim_end().to_string()
    }
}

/// SIGTERM the process group, then SIGKILL whatever is left of it
async fn terminate(child: &mut Child, pid: Option<u32>) {
    signal_group(pid, false);
    let exited = tokio::time::timeout(KILL_GRACE, child.wait()).await.is_ok();

    // Descendants that ignored SIGTERM
    signal_group(pid, true);
    if !exited {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, kill: bool) {
    let Some(pid) = pid else {
        return;
    };
    let signal = if kill { libc::SIGKILL } else { libc::SIGTERM };
    // Negative pid addresses the whole group
    unsafe {
        libc::kill(-(pid as i32), signal);
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _kill: bool) {}
