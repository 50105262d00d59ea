use std::path::PathBuf;

/// Errors surfaced by the stores, collaborators and job registration.
#[derive(Debug, thiserror::Error)]
pub enum LcError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Missing or malformed configuration (bad time, unknown weekday, empty credential...).
    #[error("configuration error: {0}")]
    Config(String),
}

impl LcError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this is a configuration problem rather than a transient failure.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type LcResult<T> = Result<T, LcError>;
