use crate::config::ConfigError;
use crate::sink::SinkError;
use crate::xtb::AuthError;

/// Fatal outcome of a collection run. Nothing here is retried.
#[derive(Debug)]
pub enum GatherError {
    Config(ConfigError),
    Auth(AuthError),
    Sink(SinkError),
    /// Transport or protocol failure from the broker connection.
    Broker(anyhow::Error),
    /// The live stream ended on the broker side.
    StreamClosed { written: u64 },
}

impl std::fmt::Display for GatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {e}"),
            Self::Auth(e) => write!(f, "authentication failed: {e}"),
            Self::Sink(e) => write!(f, "output error: {e}"),
            Self::Broker(e) => write!(f, "broker error: {e:#}"),
            Self::StreamClosed { written } => {
                write!(f, "candle stream closed after {written} records")
            }
        }
    }
}

impl std::error::Error for GatherError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Auth(e) => Some(e),
            Self::Sink(e) => Some(e),
            Self::Broker(e) => Some(&**e),
            Self::StreamClosed { .. } => None,
        }
    }
}

impl From<ConfigError> for GatherError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SinkError> for GatherError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

impl From<anyhow::Error> for GatherError {
    /// Credential rejections surface as [`GatherError::Auth`]; everything else
    /// is a broker failure.
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<AuthError>() {
            Ok(auth) => Self::Auth(auth),
            Err(other) => Self::Broker(other),
        }
    }
}
