use std::fmt;
use std::path::PathBuf;

use crate::models::signal::SignalKind;

pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOp {
    FindForDay,
    FindLatest,
    ListRange,
    Append,
}

impl fmt::Display for HistoryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HistoryOp::FindForDay => "find latest for day",
            HistoryOp::FindLatest => "find latest",
            HistoryOp::ListRange => "list range",
            HistoryOp::Append => "append",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PostureError {
    /// A signal category could not be read; no partial score is produced.
    #[error("signal unavailable ({signal}): {source}")]
    SignalUnavailable {
        signal: SignalKind,
        #[source]
        source: SourceError,
    },

    #[error("history store unavailable during {operation}: {source}")]
    HistoryUnavailable {
        operation: HistoryOp,
        #[source]
        source: SourceError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

pub type PostureResult<T> = Result<T, PostureError>;

impl PostureError {
    pub fn signal(signal: SignalKind, source: SourceError) -> Self {
        Self::SignalUnavailable { signal, source }
    }

    pub fn history(operation: HistoryOp, source: SourceError) -> Self {
        Self::HistoryUnavailable { operation, source }
    }

    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_signal_failure(&self) -> bool {
        matches!(self, Self::SignalUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_error_names_the_category() {
        let err = PostureError::signal(SignalKind::Threats, "connection reset".into());
        let text = err.to_string();
        assert!(text.contains("threats"));
        assert!(text.contains("connection reset"));
        assert!(err.is_signal_failure());
    }

    #[test]
    fn history_error_names_the_operation() {
        let err = PostureError::history(HistoryOp::Append, "disk full".into());
        assert!(err.to_string().contains("append"));
        assert!(!err.is_signal_failure());
    }
}
