//! Output sink
//!
//! Child output ends up in a single append-only log shared by every stage
//! of a run. Lines from both streams of a child are funneled through one
//! channel into a [`SinkWriter`], which is the only task that touches the
//! sink, so concurrent readers can never interleave partial writes. Appends
//! are blocking file I/O, so the writer lives on the blocking thread pool.

use isorun_core::OutputLine;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Destination for captured output lines
pub trait OutputSink: Send + Sync {
    /// Appends one line followed by a line terminator
    ///
    /// An empty line still appends a bare terminator.
    fn append(&self, line: &str) -> io::Result<()>;

    /// Human-readable location, used in diagnostics
    fn location(&self) -> PathBuf;
}

/// File-backed sink
///
/// Each append is an independent open/write/close cycle; no handle is held
/// between calls. Missing parent directories are created on demand.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl OutputSink for FileSink {
    fn append(&self, line: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Single write so the line and its terminator land together
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes())
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}

/// In-memory sink
///
/// Uses Arc<Mutex<Vec<String>>> so clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line appended so far
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn append(&self, line: &str) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|e| io::Error::other(format!("Failed to lock memory sink: {}", e)))?;
        lines.push(line.to_string());
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

/// What a [`SinkWriter`] did before its channel closed
#[derive(Debug, Default)]
pub struct SinkSummary {
    /// Lines successfully appended
    pub lines_written: usize,
    /// Lines received after the sink failed and dropped
    pub lines_dropped: usize,
    /// First append error, if any
    pub error: Option<io::Error>,
}

/// Serialized writer draining a channel of output lines into a sink
pub struct SinkWriter {
    sink: Arc<dyn OutputSink>,
    receiver: mpsc::UnboundedReceiver<OutputLine>,
}

impl SinkWriter {
    /// Creates a writer and the sender that feeds it
    ///
    /// The writer finishes once every sender clone has been dropped.
    pub fn channel(sink: Arc<dyn OutputSink>) -> (mpsc::UnboundedSender<OutputLine>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { sink, receiver })
    }

    /// Runs the writer on the blocking thread pool
    pub fn spawn(self) -> JoinHandle<SinkSummary> {
        tokio::task::spawn_blocking(move || self.run())
    }

    /// Appends lines in arrival order until all senders are gone
    ///
    /// Blocks the calling thread; must not be called from async code. After
    /// the first failed append nothing more is written, but the channel
    /// keeps being drained so producers never stall.
    pub fn run(mut self) -> SinkSummary {
        let mut summary = SinkSummary::default();

        while let Some(line) = self.receiver.blocking_recv() {
            if summary.error.is_some() {
                summary.lines_dropped += 1;
                continue;
            }

            match self.sink.append(&line.text) {
                Ok(()) => summary.lines_written += 1,
                Err(e) => {
                    error!(
                        "Failed to append {} line to {}: {}",
                        line.stream,
                        self.sink.location().display(),
                        e
                    );
                    summary.lines_dropped += 1;
                    summary.error = Some(e);
                }
            }
        }

        debug!(
            "Sink writer for {} finished: {} written, {} dropped",
            self.sink.location().display(),
            summary.lines_written,
            summary.lines_dropped
        );

        summary
    }
}
