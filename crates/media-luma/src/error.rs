use std::fmt::{Display, Formatter};

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, LumaError>;

/// Error type for requests to the video-generation service.
#[derive(Debug)]
pub enum LumaError {
    MissingApiKey,
    MissingPrompt,
    MissingGenerationId,
    Api {
        status: u16,
        body: String,
    },
    Transport(String),
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    Decode {
        source: serde_json::Error,
        body: String,
    },
    Encode(serde_json::Error),
    TimedOut {
        id: String,
        attempts: u32,
    },
}

impl LumaError {
    /// Whether a status poll that failed with this error is worth repeating.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::MissingApiKey
                | Self::MissingPrompt
                | Self::MissingGenerationId
                | Self::Encode(_)
                | Self::TimedOut { .. }
        )
    }
}

impl Display for LumaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "generation API key not configured"),
            Self::MissingPrompt => write!(f, "prompt is required"),
            Self::MissingGenerationId => write!(f, "generation id is required"),
            Self::Api { status, body } => {
                write!(f, "generation API error ({status}): {}", body.trim())
            }
            Self::Transport(message) => write!(f, "generation API unreachable: {message}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Decode { source, body } => {
                write!(f, "invalid generation response ({source}): {}", body.trim())
            }
            Self::Encode(err) => write!(f, "failed to encode generation request: {err}"),
            Self::TimedOut { id, attempts } => {
                write!(f, "generation {id} not finished after {attempts} status checks")
            }
        }
    }
}

impl std::error::Error for LumaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}
