use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading or creating the shared token.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token file exists but could not be read.
    #[error("failed to read token file '{path}': {source}")]
    Read {
        /// Token file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The token file or its directory could not be written.
    #[error("failed to write token file '{path}': {source}")]
    Write {
        /// Token file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The operating system random source failed.
    #[error("failed to generate token: {source}")]
    Generate {
        /// Underlying random source error.
        #[source]
        source: rand::Error,
    },
}

impl TokenError {
    pub(crate) fn read(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
