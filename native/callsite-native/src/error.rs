//! Errors for the fallible shell around the rewriter.
//!
//! The rewriting core never fails: bad input degrades to "no rewrite". Only
//! option parsing and filesystem work (cache persistence, source discovery)
//! surface errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallsiteError {
    /// Options parsed but describe an unusable configuration.
    #[error("invalid transform options: {message}")]
    InvalidOptions { message: String },

    /// Options JSON could not be deserialized.
    #[error("failed to parse transform options: {0}")]
    OptionsJson(#[from] serde_json::Error),

    #[error("failed to encode cache entry: {source}")]
    CacheEncode {
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl CallsiteError {
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
