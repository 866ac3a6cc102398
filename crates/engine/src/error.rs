use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine commands, identifier parsing and configuration.
#[derive(Debug)]
pub enum EngineError {
    UnknownTimeline(String),
    UnknownDirection(String),
    UnknownViewMode(String),
    InvalidSeekTime(f64),
    InvalidProgress(f64),
    InvalidVolume(f64),
    InvalidConfig {
        reason: String,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigParse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTimeline(value) => write!(f, "unknown timeline: {value}"),
            Self::UnknownDirection(value) => write!(f, "unknown direction: {value}"),
            Self::UnknownViewMode(value) => write!(f, "unknown view mode: {value}"),
            Self::InvalidSeekTime(value) => write!(f, "invalid seek time: {value}"),
            Self::InvalidProgress(value) => write!(f, "invalid progress percentage: {value}"),
            Self::InvalidVolume(value) => write!(f, "invalid volume: {value}"),
            Self::InvalidConfig { reason } => write!(f, "invalid session config: {reason}"),
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config {} ({source})", path.display())
            }
            Self::ConfigParse { path, source } => match path {
                Some(path) => write!(f, "failed to parse config {} ({source})", path.display()),
                None => write!(f, "failed to parse config ({source})"),
            },
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigParse { source, .. } => Some(source),
            _ => None,
        }
    }
}
