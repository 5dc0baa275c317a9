//! Blocking subprocess execution with a deadline

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a finished process
#[derive(Debug)]
pub(super) struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Why a process produced no output
#[derive(Debug)]
pub(super) enum RunError {
    /// argv was empty
    EmptyCommand,
    /// The program could not be started
    Spawn(std::io::Error),
    /// Waiting on the child failed
    Wait(std::io::Error),
    /// The deadline passed; the child has been killed
    Timeout,
}

/// Run `argv` in `cwd`, feeding `input` on stdin, and wait at most `timeout`
///
/// stdin, stdout and stderr are serviced on helper threads while the caller
/// polls for exit.
pub(super) fn run_with_input(
    argv: &[String],
    cwd: &Path,
    input: &[u8],
    timeout: Duration,
) -> Result<ProcessOutput, RunError> {
    let (program, args) = argv.split_first().ok_or(RunError::EmptyCommand)?;

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RunError::Spawn)?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let writer = child.stdin.take().map(|mut stdin| {
        let input = input.to_vec();
        // Broken pipe is expected when the child exits without reading
        thread::spawn(move || {
            let _ = stdin.write_all(&input);
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Timeout);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::Wait(e));
            }
        }
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }

    Ok(ProcessOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
