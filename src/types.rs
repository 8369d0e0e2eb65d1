// =============================================================================
// Shared types used across the collector
// =============================================================================

/// Which broker environment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Demo,
    Live,
}

impl Default for ServerMode {
    fn default() -> Self {
        Self::Demo
    }
}

impl std::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Demo => write!(f, "Demo"),
            Self::Live => write!(f, "Live"),
        }
    }
}

/// Chart bar granularity, valued in minutes as the broker expects. History
/// is only ever requested in one-minute bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    M1,
}

impl Period {
    pub fn minutes(self) -> u32 {
        match self {
            Self::M1 => 1,
        }
    }
}

/// Closed millisecond interval `[start_ms, end_ms]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}
