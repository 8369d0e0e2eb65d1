// =============================================================================
// Output Sink — one `;`-joined line per candle, to stdout or an append-only log
// =============================================================================
//
// File destinations are opened, appended to and closed on every write. No
// handle survives between records, so a long-running stream never leaks a
// descriptor and external log rotation between writes is picked up.
// =============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::candle::Candle;

/// Column order of every emitted line.
pub const OUTPUT_FORMAT: &str = "SYMBOL;ctm;ctmString;open;high;low;close;volume;quoteid";

/// Where candle lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Verbose mode: standard output, the filesystem is never touched.
    Stdout,
    LogFile(PathBuf),
}

#[derive(Debug)]
pub enum SinkError {
    EmptyPath,
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Write {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "no log file name given"),
            Self::Open { path, source } => {
                write!(f, "unable to open output file {}: {source}", path.display())
            }
            Self::Write {
                path: Some(path),
                source,
            } => write!(f, "unable to write to {}: {source}", path.display()),
            Self::Write { path: None, source } => {
                write!(f, "unable to write to stdout: {source}")
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EmptyPath => None,
            Self::Open { source, .. } | Self::Write { source, .. } => Some(source),
        }
    }
}

/// Render a candle as one output line (without the trailing newline).
///
/// Embedded `;` in the symbol or timestamp text are not escaped. An absent
/// quote id renders as `0` so every line keeps nine columns.
pub fn format_line(candle: &Candle) -> String {
    format!(
        "{};{};{};{};{};{};{};{};{}",
        candle.symbol,
        candle.timestamp_millis,
        candle.timestamp_text,
        candle.open,
        candle.high,
        candle.low,
        candle.close,
        candle.volume,
        candle.quote_id.unwrap_or(0),
    )
}

/// Stateless writer bound to a single destination.
#[derive(Debug, Clone)]
pub struct CandleSink {
    destination: Destination,
}

impl CandleSink {
    pub fn new(destination: Destination) -> Self {
        Self { destination }
    }

    /// Write one candle. Each call is independent; nothing is buffered.
    pub fn write(&self, candle: &Candle) -> Result<(), SinkError> {
        let line = format_line(candle);
        match &self.destination {
            Destination::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{line}")
                    .and_then(|_| out.flush())
                    .map_err(|source| SinkError::Write { path: None, source })
            }
            Destination::LogFile(path) => append_line(path, &line),
        }
    }
}

fn append_line(path: &Path, line: &str) -> Result<(), SinkError> {
    if path.as_os_str().is_empty() {
        return Err(SinkError::EmptyPath);
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    // Single write call so the whole line lands in one append.
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
        .map_err(|source| SinkError::Write {
            path: Some(path.to_path_buf()),
            source,
        })?;

    debug!(path = %path.display(), "candle appended");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
