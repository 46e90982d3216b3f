//! # Error Taxonomy
//!
//! Typed errors for the library layer. The binary wraps these in `anyhow`
//! with context, the way the rest of the CLI reports failures.
//!
//! - [`CatalogError`]: a catalog lookup failed. Recovered per item by the
//!   builders and the reconciler; only a failed top-level playlist listing
//!   escapes to the caller.
//! - [`StateError`]: the recommendation state is inconsistent with the
//!   requested transition. Always surfaced.
//! - [`StoreError`]: reading or writing the persisted state failed.

use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the music catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Connection refused, timed out, TLS failure, ...
    #[error("catalog transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("catalog returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Too many requests, even after waiting for the advertised delay.
    #[error("catalog rate limit exceeded for {0}")]
    RateLimited(String),

    /// Credentials missing, rejected, or could not be refreshed.
    #[error("catalog authorization failed: {0}")]
    Auth(String),

    #[error("catalog response could not be decoded: {0}")]
    Decode(String),

    #[error("not found in catalog: {0}")]
    NotFound(String),
}

impl CatalogError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Auth(_) | Self::Decode(_) | Self::NotFound(_) => false,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Invariant violations in the recommendation state.
///
/// These indicate corruption or misuse, never bad input data, and are
/// distinct from the silently skipped data-hygiene cases.
#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("no album is currently selected")]
    NoActiveSelection,

    #[error("'{album}' by '{artist}' is still in progress; retire it before choosing another")]
    SelectionActive { album: String, artist: String },

    #[error("selected album '{album}' is not in the recommendations for artist '{artist}'")]
    AlbumNotRecommended { album: String, artist: String },

    #[error("cutoff must lie strictly between 0 and 1, got {0}")]
    InvalidCutoff(f64),
}

/// Failure loading or persisting the state files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state already initialized at {0} (use --force to rebuild)")]
    AlreadyInitialized(PathBuf),

    #[error("no state found at {0}; run `gimme init` first")]
    NotInitialized(PathBuf),
}
