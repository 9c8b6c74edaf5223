//! Backend command runner: prompt on stdin, bounded capture, hard timeout.

use std::io::{self, ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Limits applied to one backend command run.
#[derive(Debug, Clone, Copy)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Bytes kept per stream; the rest is drained and counted.
    pub output_limit_bytes: usize,
}

/// What a finished (or killed) command produced.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub dropped_bytes: u64,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last `max_lines` lines of stderr, for error messages.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        lines[lines.len().saturating_sub(max_lines)..].join("\n")
    }
}

/// Spawn `cmd`, write `input` to its stdin and collect both output streams.
///
/// Streams are drained on scoped reader threads while the child runs, so a
/// chatty child never blocks on a full pipe. A child that outlives
/// `limits.timeout` is killed and reported with `timed_out` set.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs()))]
pub fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    limits: ProcessLimits,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().context("spawn command")?;
    debug!(pid = child.id(), "spawned backend command");

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("stderr was not piped"))?;
    let limit = limits.output_limit_bytes;

    thread::scope(|scope| {
        let stdout_reader = scope.spawn(move || capture(stdout, limit));
        let stderr_reader = scope.spawn(move || capture(stderr, limit));

        feed_stdin(&mut child, input)?;
        let (status, timed_out) = wait_or_kill(&mut child, limits.timeout)?;

        let (stdout, stdout_dropped) = stdout_reader
            .join()
            .map_err(|_| anyhow!("stdout reader panicked"))?
            .context("read stdout")?;
        let (stderr, stderr_dropped) = stderr_reader
            .join()
            .map_err(|_| anyhow!("stderr reader panicked"))?
            .context("read stderr")?;

        let dropped_bytes = stdout_dropped + stderr_dropped;
        if dropped_bytes > 0 {
            warn!(dropped_bytes, limit, "command output exceeded limit");
        }
        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(ProcessOutput {
            status,
            stdout,
            stderr,
            dropped_bytes,
            timed_out,
        })
    })
}

fn feed_stdin(child: &mut Child, input: &[u8]) -> Result<()> {
    let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("stdin was not piped"))?;
    match stdin.write_all(input) {
        Ok(()) => Ok(()),
        // Child exited without reading its input; its status tells the rest.
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {
            debug!("child closed stdin early");
            Ok(())
        }
        Err(err) => Err(err).context("write stdin"),
    }
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
    child.kill().context("kill command")?;
    let status = child.wait().context("reap killed command")?;
    Ok((status, true))
}

/// Keep the first `limit` bytes of `reader` and count what is discarded.
fn capture<R: Read>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, u64)> {
    let mut kept = Vec::new();
    reader.by_ref().take(limit as u64).read_to_end(&mut kept)?;
    let dropped = io::copy(&mut reader, &mut io::sink())?;
    Ok((kept, dropped))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn limits(timeout: Duration, output_limit_bytes: usize) -> ProcessLimits {
        ProcessLimits {
            timeout,
            output_limit_bytes,
        }
    }

    #[test]
    fn echoes_prompt_through_cat() {
        let output = run_with_input(
            Command::new("cat"),
            b"persona\n\nprompt",
            limits(Duration::from_secs(5), 1024),
        )
        .expect("run cat");
        assert!(output.status.success());
        assert_eq!(output.stdout_text(), "persona\n\nprompt");
        assert!(!output.timed_out);
    }

    #[test]
    fn output_beyond_limit_is_dropped() {
        let tight = limits(Duration::from_secs(5), 16);
        let output = run_with_input(Command::new("cat"), &[b'x'; 64], tight).expect("run cat");
        assert_eq!(output.stdout.len(), 16);
        assert_eq!(output.dropped_bytes, 48);
    }

    #[test]
    fn slow_command_is_killed() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let output =
            run_with_input(cmd, b"", limits(Duration::from_millis(100), 1024)).expect("run sleep");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 'a\\nb\\nc\\n' >&2; exit 3"]);
        let output =
            run_with_input(cmd, b"", limits(Duration::from_secs(5), 1024)).expect("run sh");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr_tail(2), "b\nc");
    }
}
