use std::fmt;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use super::SECURITY_TARGET;
use super::errors::TokenError;
use super::files::atomic_write;

/// Number of random bytes behind each token; the persisted form is hex.
pub const TOKEN_BYTES: usize = 32;

/// Owns the shared secret for the lifetime of the process.
///
/// The token is immutable once loaded. Its `Debug` output is redacted so the
/// guard can be embedded in logged structures without leaking the secret.
#[derive(Clone)]
pub struct TokenGuard {
    token: String,
    path: Option<Utf8PathBuf>,
}

impl TokenGuard {
    /// Loads the token stored at `path`, creating and persisting a fresh one
    /// when the file is missing or empty.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] when the file cannot be read or written, or when
    /// the random source fails.
    pub fn load_or_create(path: &Utf8Path) -> Result<Self, TokenError> {
        if let Some(token) = Self::read_existing(path)? {
            debug!(target: SECURITY_TARGET, path = %path, "loaded shared token");
            return Ok(Self {
                token,
                path: Some(path.to_owned()),
            });
        }

        let token = generate_token()?;
        atomic_write(path, token.as_bytes()).map_err(|source| TokenError::write(path, source))?;
        info!(target: SECURITY_TARGET, path = %path, "created shared token");
        Ok(Self {
            token,
            path: Some(path.to_owned()),
        })
    }

    /// Reads the token stored at `path` without creating one.
    ///
    /// Returns `Ok(None)` when the file does not exist or holds only
    /// whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Read`] for IO failures other than a missing file.
    pub fn read_existing(path: &Utf8Path) -> Result<Option<String>, TokenError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_owned()))
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TokenError::read(path, source)),
        }
    }

    /// Builds a guard around an in-memory token that is never persisted.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            path: None,
        }
    }

    /// Compares `candidate` with the shared token in constant time.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        bool::from(candidate.as_bytes().ct_eq(self.token.as_bytes()))
    }

    /// Secret value, for callers that must embed it in outbound requests.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// File the token was loaded from, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for TokenGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGuard")
            .field("token", &"<redacted>")
            .field("path", &self.path)
            .finish()
    }
}

fn generate_token() -> Result<String, TokenError> {
    let mut bytes = [0_u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|source| TokenError::Generate { source })?;
    Ok(hex::encode(bytes))
}
