//! Running short-lived child processes, such as version probes, with a time
//! limit and bounded capture.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long a child may run and how much of each stream is kept.
#[derive(Debug, Clone, Copy)]
pub struct ProcessLimits {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// What a child printed before it exited or was killed.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped across both streams once the limit was reached.
    pub dropped_bytes: usize,
    pub timed_out: bool,
}

impl CapturedOutput {
    /// Stdout followed by stderr, lossily decoded.
    pub fn combined_lossy(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

type Capture = JoinHandle<Result<(Vec<u8>, usize)>>;

/// Run `cmd` with no stdin, draining both output streams while it runs.
///
/// A child still running at `limits.timeout` is killed and reported with
/// `timed_out` set rather than as an error.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_ms = limits.timeout.as_millis()))]
pub fn run_captured(mut cmd: Command, limits: ProcessLimits) -> Result<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn command")?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout = capture(stdout, limits.output_limit_bytes);
    let stderr = capture(stderr, limits.output_limit_bytes);

    let (status, timed_out) = match child.wait_timeout(limits.timeout).context("wait")? {
        Some(status) => (status, false),
        None => {
            warn!("child exceeded its time limit, killing");
            child.kill().context("kill")?;
            (child.wait().context("wait after kill")?, true)
        }
    };

    let (stdout, stdout_dropped) = finish(stdout).context("collect stdout")?;
    let (stderr, stderr_dropped) = finish(stderr).context("collect stderr")?;
    let dropped_bytes = stdout_dropped + stderr_dropped;

    debug!(code = ?status.code(), timed_out, dropped_bytes, "child finished");
    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
        dropped_bytes,
        timed_out,
    })
}

fn capture<R: Read + Send + 'static>(reader: R, limit: usize) -> Capture {
    thread::spawn(move || read_bounded(reader, limit))
}

fn finish(handle: Capture) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
}

/// Read `reader` to the end, keeping at most `limit` bytes.
fn read_bounded<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0;
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok((kept, dropped));
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
}
