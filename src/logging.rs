//! Logging setup.
//!
//! Installs a `tracing` subscriber with up to two sinks:
//!
//! - console: formatted events on stderr
//! - file: events appended to a log file through a [`BufferedFileSink`]
//!
//! The file sink buffers in memory and drains to disk when the buffer
//! reaches a size threshold, when the periodic flush timer fires, and on
//! close. [`LogHandle`] owns the sink for the lifetime of a scan.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default interval between background flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Buffered bytes that trigger an immediate flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 2048;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which sinks to install and how verbose they are.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Echo events to stderr.
    pub console: bool,
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Append events to a file.
    pub file: Option<FileSinkConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console: false,
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Location and flush policy of the log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSinkConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub flush_interval: Duration,
    pub flush_threshold: usize,
}

impl FileSinkConfig {
    /// An empty name gets a timestamped default; a name without an
    /// extension gets `.log` appended.
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: normalize_file_name(file_name.into()),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.flush_interval = interval;
        }
        self
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// `port_scanner_<unix-nanos>.log`
pub fn default_file_name() -> String {
    format!(
        "port_scanner_{}.log",
        Local::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

fn normalize_file_name(name: String) -> String {
    let name = name.trim();
    if name.is_empty() {
        default_file_name()
    } else if !name.contains('.') {
        format!("{}.log", name)
    } else {
        name.to_string()
    }
}

/// Install the global subscriber described by `config`.
///
/// Must run inside a tokio runtime for the periodic file flush to be
/// scheduled. If a global subscriber is already set the existing one is
/// kept, but the returned handle still owns the file sink.
pub fn init(config: &LogConfig) -> io::Result<LogHandle> {
    let sink = config
        .file
        .as_ref()
        .map(BufferedFileSink::open)
        .transpose()?;

    let console_layer = config.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_timer(LocalTimestamp)
            .with_target(false)
    });
    let file_layer = sink.as_ref().map(|sink| {
        tracing_subscriber::fmt::layer()
            .with_writer(sink.writer())
            .with_timer(LocalTimestamp)
            .with_target(false)
            .with_ansi(false)
    });
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("global subscriber already installed");
    }

    Ok(LogHandle { sink })
}

/// Scoped owner of the logging resources.
#[derive(Debug, Default)]
pub struct LogHandle {
    sink: Option<BufferedFileSink>,
}

impl LogHandle {
    /// A handle with no file sink.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_sink(sink: BufferedFileSink) -> Self {
        Self { sink: Some(sink) }
    }

    /// Path of the log file, when file logging is on.
    pub fn log_path(&self) -> Option<&Path> {
        self.sink.as_ref().map(BufferedFileSink::path)
    }

    /// Flush buffered output and release the log file.
    pub fn close(self) -> io::Result<()> {
        match self.sink {
            Some(mut sink) => sink.close(),
            None => Ok(()),
        }
    }
}

struct SinkState {
    buffer: Vec<u8>,
    file: Option<File>,
}

impl SinkState {
    fn drain(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            if !self.buffer.is_empty() {
                file.write_all(&self.buffer)?;
                file.flush()?;
            }
        }
        self.buffer.clear();
        Ok(())
    }
}

fn lock(shared: &Mutex<SinkState>) -> MutexGuard<'_, SinkState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Append-only log file behind a mutex-protected buffer.
pub struct BufferedFileSink {
    shared: Arc<Mutex<SinkState>>,
    threshold: usize,
    path: PathBuf,
    ticker: Option<JoinHandle<()>>,
}

impl BufferedFileSink {
    /// Create the directory if needed, open the file for appending and
    /// start the flush timer when a tokio runtime is available.
    pub fn open(config: &FileSinkConfig) -> io::Result<Self> {
        fs::create_dir_all(&config.directory)?;
        let path = config.path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let shared = Arc::new(Mutex::new(SinkState {
            buffer: Vec::with_capacity(config.flush_threshold),
            file: Some(file),
        }));
        let ticker = tokio::runtime::Handle::try_current().ok().map(|runtime| {
            runtime.spawn(flush_periodically(
                Arc::downgrade(&shared),
                config.flush_interval.max(Duration::from_millis(1)),
            ))
        });

        Ok(Self {
            shared,
            threshold: config.flush_threshold,
            path,
            ticker,
        })
    }

    /// A writer feeding this sink. Cheap to clone.
    pub fn writer(&self) -> SinkWriter {
        SinkWriter {
            shared: Arc::clone(&self.shared),
            threshold: self.threshold,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain the buffer to the file now.
    pub fn flush(&self) -> io::Result<()> {
        lock(&self.shared).drain()
    }

    /// Stop the timer, drain the buffer and close the file.
    ///
    /// Writes arriving afterwards are discarded.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let mut state = lock(&self.shared);
        let result = state.drain();
        state.file = None;
        state.buffer.clear();
        result
    }
}

impl Drop for BufferedFileSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for BufferedFileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedFileSink")
            .field("path", &self.path)
            .field("threshold", &self.threshold)
            .finish()
    }
}

async fn flush_periodically(shared: Weak<Mutex<SinkState>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let result = lock(&shared).drain();
        if let Err(e) = result {
            eprintln!("log flush failed: {}", e);
        }
    }
}

/// Handle used by the `fmt` layer to write into a [`BufferedFileSink`].
#[derive(Clone)]
pub struct SinkWriter {
    shared: Arc<Mutex<SinkState>>,
    threshold: usize,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.shared);
        if state.file.is_none() {
            return Ok(buf.len());
        }
        state.buffer.extend_from_slice(buf);
        if state.buffer.len() >= self.threshold {
            state.drain()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.shared).drain()
    }
}

impl<'a> MakeWriter<'a> for SinkWriter {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Local wall-clock timestamps, `YYYY-MM-DD HH:MM:SS`.
struct LocalTimestamp;

impl FormatTime for LocalTimestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}
