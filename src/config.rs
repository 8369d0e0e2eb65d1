// =============================================================================
// Configuration Resolver — CLI, config file and environment merged once
// =============================================================================
//
// Precedence is CLI > config file > environment: a value given on the command
// line is never replaced by the file, the file only fills the gaps, and the
// environment (optionally seeded from `.env`) fills whatever is left.
//
// Config file format, one entry per line:
//
//   # comment
//   USERNAME=12345678
//   PASSWORD=secret
//   SYMBOL=EURUSD
//   LOGFILE=/var/log/gather/eurusd.log
//
// Keys are matched by exact prefix and the rest of the line is taken verbatim.
// =============================================================================

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::sink::Destination;
use crate::types::ServerMode;

const KEY_USERNAME: &str = "USERNAME=";
const KEY_PASSWORD: &str = "PASSWORD=";
const KEY_SYMBOL: &str = "SYMBOL=";
const KEY_LOGFILE: &str = "LOGFILE=";

const ENV_USERNAME: &str = "GATHER_USERNAME";
const ENV_PASSWORD: &str = "GATHER_PASSWORD";
const ENV_SYMBOL: &str = "GATHER_SYMBOL";
const ENV_LOGFILE: &str = "GATHER_LOGFILE";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ConfigError {
    /// A required field is still empty after all sources were merged.
    Missing(&'static str),
    UnreadableFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(field) => write!(f, "{field} required"),
            Self::UnreadableFile { path, source } => {
                write!(f, "unable to read config file {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Missing(_) => None,
            Self::UnreadableFile { source, .. } => Some(source),
        }
    }
}

// =============================================================================
// ConfigLayer — the string-valued fields a single source may supply
// =============================================================================

/// Values from one configuration source. Empty strings are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLayer {
    pub symbol: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub log_file: Option<String>,
}

impl ConfigLayer {
    pub fn new(
        symbol: Option<String>,
        username: Option<String>,
        password: Option<String>,
        log_file: Option<String>,
    ) -> Self {
        Self {
            symbol: non_empty(symbol),
            username: non_empty(username),
            password: non_empty(password),
            log_file: non_empty(log_file),
        }
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "config file loaded");
        Ok(Self::parse(&text))
    }

    /// Parse config file text. Unknown lines are ignored; a key repeated later
    /// in the file replaces the earlier value.
    pub fn parse(text: &str) -> Self {
        let mut layer = Self::default();
        for line in text.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(v) = line.strip_prefix(KEY_USERNAME) {
                layer.username = non_empty(Some(v.to_string()));
            } else if let Some(v) = line.strip_prefix(KEY_PASSWORD) {
                layer.password = non_empty(Some(v.to_string()));
            } else if let Some(v) = line.strip_prefix(KEY_SYMBOL) {
                layer.symbol = non_empty(Some(v.to_string()));
            } else if let Some(v) = line.strip_prefix(KEY_LOGFILE) {
                layer.log_file = non_empty(Some(v.to_string()));
            }
        }
        layer
    }

    /// Environment layer (`GATHER_*`). Callers load `.env` beforehand.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(ENV_SYMBOL).ok(),
            std::env::var(ENV_USERNAME).ok(),
            std::env::var(ENV_PASSWORD).ok(),
            std::env::var(ENV_LOGFILE).ok(),
        )
    }

    /// Fill every field still unset in `self` from `fallback`.
    pub fn or(self, fallback: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            symbol: self.symbol.or(fallback.symbol),
            username: self.username.or(fallback.username),
            password: self.password.or(fallback.password),
            log_file: self.log_file.or(fallback.log_file),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// =============================================================================
// Flags — non-layered switches that only come from the command line
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    pub server: ServerMode,
    pub verbose: bool,
    pub debug: bool,
    /// Raw `-t` value; only a positive number enables historical mode.
    pub history_seconds: i64,
}

// =============================================================================
// EffectiveConfig
// =============================================================================

/// Fully resolved run parameters. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub symbol: String,
    pub username: String,
    pub password: String,
    /// Always `Some` unless `verbose` is set.
    pub log_file: Option<PathBuf>,
    pub server: ServerMode,
    pub verbose: bool,
    pub debug: bool,
    pub history_lookback_secs: Option<u64>,
}

impl EffectiveConfig {
    /// Verbose runs write to stdout even when a log file was configured.
    pub fn destination(&self) -> Destination {
        if self.verbose {
            Destination::Stdout
        } else {
            Destination::LogFile(self.log_file.clone().unwrap_or_default())
        }
    }
}

/// Merge the three sources and validate required fields in the order
/// symbol, username, password, log file.
pub fn resolve(
    cli: ConfigLayer,
    file: Option<ConfigLayer>,
    env: ConfigLayer,
    flags: RunFlags,
) -> Result<EffectiveConfig, ConfigError> {
    let merged = cli.or(file.unwrap_or_default()).or(env);

    let symbol = merged.symbol.ok_or(ConfigError::Missing("symbol"))?;
    let username = merged.username.ok_or(ConfigError::Missing("username"))?;
    let password = merged.password.ok_or(ConfigError::Missing("password"))?;

    let log_file = match (flags.verbose, merged.log_file) {
        (_, Some(path)) => Some(PathBuf::from(path)),
        (true, None) => None,
        (false, None) => return Err(ConfigError::Missing("logfile")),
    };

    let history_lookback_secs = u64::try_from(flags.history_seconds)
        .ok()
        .filter(|secs| *secs > 0);

    Ok(EffectiveConfig {
        symbol,
        username,
        password,
        log_file,
        server: flags.server,
        verbose: flags.verbose,
        debug: flags.debug,
        history_lookback_secs,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
