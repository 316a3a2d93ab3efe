//! Process runner
//!
//! Launches one external executable and streams both of its output pipes,
//! line by line, into an output sink while waiting for it to exit.
//! Arguments are passed as a literal list; no shell is involved.

use isorun_core::{OutputLine, StreamKind};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use crate::error::{Result, RunnerError};
use crate::sink::{OutputSink, SinkSummary, SinkWriter};

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit status, absent when the child was killed by a signal
    pub code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    /// Lines appended to the sink from both streams
    pub lines_captured: usize,
}

impl ProcessExit {
    fn from_status(status: ExitStatus, lines_captured: usize) -> Self {
        Self {
            code: status.code(),
            signal: exit_signal(&status),
            lines_captured,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Runs child processes with their output captured into a sink
#[derive(Clone)]
pub struct ProcessRunner {
    sink: Arc<dyn OutputSink>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Creates a runner writing to `sink`
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink,
            timeout: None,
        }
    }

    /// Kills children whose run, including draining their output, takes
    /// longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs `program` with `args` and waits for it to exit
    ///
    /// Stdin is closed, stdout and stderr are piped and read concurrently.
    /// Ordering within each stream is preserved; lines of the two streams
    /// interleave in arrival order. The call returns only once the child
    /// has exited and both streams are drained. With a timeout set, one
    /// deadline covers both; on expiry the child's whole process group is
    /// killed and the stream readers are abandoned.
    ///
    /// # Returns
    /// The exit of the child, whatever its status. Errors are reserved for
    /// children that could not be launched, waited on, or whose output
    /// could not be captured, and for timeouts.
    pub async fn run<I, S>(&self, program: &Path, args: I) -> Result<ProcessExit>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so background descendants can be killed with it
        #[cfg(unix)]
        command.process_group(0);

        debug!("Launching process: {:?}", command.as_std());

        let mut child = command.spawn().map_err(|source| RunnerError::Launch {
            program: program.to_path_buf(),
            source,
        })?;
        let pid = child.id();

        let (sender, writer) = SinkWriter::channel(Arc::clone(&self.sink));
        let writer = writer.spawn();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, StreamKind::Stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, StreamKind::Stderr, sender.clone()));
        }
        drop(sender);

        let abort_handles: Vec<AbortHandle> =
            readers.iter().map(JoinHandle::abort_handle).collect();
        let drained = wait_and_drain(&mut child, readers, program);

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, drained).await {
                Ok(status) => status,
                Err(_) => {
                    warn!(
                        "Process {} exceeded {:?}, killing it",
                        program.display(),
                        limit
                    );
                    kill_process_group(pid);
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill {}: {}", program.display(), e);
                    }
                    // Descendants outside the group may still hold the pipes
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    Err(RunnerError::TimedOut {
                        program: program.to_path_buf(),
                        limit,
                    })
                }
            },
            None => drained.await,
        };

        let summary = writer.await.unwrap_or_else(|e| SinkSummary {
            error: Some(std::io::Error::other(format!("sink writer failed: {}", e))),
            ..SinkSummary::default()
        });

        let status = status?;

        if let Some(source) = summary.error {
            return Err(RunnerError::Capture {
                path: self.sink.location(),
                source,
            });
        }

        let exit = ProcessExit::from_status(status, summary.lines_written);
        debug!(
            "Process {} exited with {:?} ({} line(s) captured)",
            program.display(),
            exit.code,
            exit.lines_captured
        );

        Ok(exit)
    }
}

/// Waits for the child to exit, then for both stream readers to finish
async fn wait_and_drain(
    child: &mut Child,
    readers: Vec<JoinHandle<usize>>,
    program: &Path,
) -> Result<ExitStatus> {
    let status = child.wait().await.map_err(|source| RunnerError::Wait {
        program: program.to_path_buf(),
        source,
    });

    if status.is_err() {
        for reader in &readers {
            reader.abort();
        }
    }

    for reader in readers {
        match reader.await {
            Ok(count) => debug!("Reader finished after {} line(s)", count),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!("Output reader for {} panicked: {}", program.display(), e),
        }
    }

    status
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };

    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        debug!("Failed to kill process group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn spawn_reader<R>(stream: R, kind: StreamKind, sender: UnboundedSender<OutputLine>) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(forward_lines(stream, kind, sender))
}

/// Forwards every line of `stream` to `sender`, returning the line count
///
/// A final line without terminator still counts. Read errors end the
/// stream early rather than failing the stage.
async fn forward_lines<R>(stream: R, kind: StreamKind, sender: UnboundedSender<OutputLine>) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if sender.send(OutputLine::from_raw(kind, &buf)).is_err() {
                    break;
                }
                count += 1;
            }
            Err(e) => {
                warn!("Failed to read child {}: {}", kind, e);
                break;
            }
        }
    }

    count
}
