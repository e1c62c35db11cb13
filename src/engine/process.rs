// Process spawning and stream plumbing primitives. No download-domain knowledge lives here.
use super::*;
use std::ffi::OsStr;
#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;
use tokio::process::{Child, ChildStderr, ChildStdout};

#[cfg(target_os = "windows")]
pub(super) const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub(super) fn hidden_command(program: impl AsRef<OsStr>) -> Command {
    let mut command = Command::new(program);
    #[cfg(target_os = "windows")]
    {
        command.creation_flags(CREATE_NO_WINDOW);
    }
    // Dropping a handle must never leave an orphaned child behind.
    command.kill_on_drop(true);
    command
}

pub(super) struct StreamedChild {
    pub(super) child: Child,
    pub(super) stdout: ChildStdout,
    pub(super) stderr: ChildStderr,
}

pub(super) fn spawn_streamed(binary: &Path, args: &[String]) -> Result<StreamedChild, String> {
    let mut child = hidden_command(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| format!("Failed to start {}: {error}", binary.display()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "Failed to capture stdout for progress tracking.".to_string())?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| "Failed to capture stderr for progress tracking.".to_string())?;
    Ok(StreamedChild {
        child,
        stdout,
        stderr,
    })
}

// Exactly one terminal result per child: either the natural exit code or
// None after a kill request (also None when the OS reports no code, e.g. a signal).
pub(super) async fn supervise_child(mut child: Child, kill: Arc<Notify>) -> Option<i32> {
    tokio::select! {
        status = child.wait() => status.ok().and_then(|value| value.code()),
        _ = kill.notified() => {
            let _ = child.start_kill();
            child.wait().await.ok().and_then(|value| value.code())
        }
    }
}

pub(super) struct CapturedRun {
    pub(super) success: bool,
    pub(super) stdout: String,
    pub(super) stderr: String,
}

pub(super) async fn run_captured(binary: &Path, args: &[&str]) -> Result<CapturedRun, String> {
    let output = hidden_command(binary)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|error| format!("Failed to execute {}: {error}", binary.display()))?;
    Ok(CapturedRun {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

pub(super) async fn read_lossy_process_line<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    raw_buffer: &mut Vec<u8>,
) -> Result<Option<String>, std::io::Error> {
    raw_buffer.clear();
    let bytes_read = reader.read_until(b'\n', raw_buffer).await?;
    if bytes_read == 0 {
        return Ok(None);
    }
    while matches!(raw_buffer.last(), Some(b'\n' | b'\r')) {
        raw_buffer.pop();
    }
    Ok(Some(String::from_utf8_lossy(raw_buffer).to_string()))
}
