use std::fmt;
use thiserror::Error;

use crate::db::CacheError;
use crate::remote::RemoteError;

/// One of the independently fetched parts of a full load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSlice {
    Recipes,
    Favorites,
    Collections,
    /// The locally stored set of downloaded recipe ids.
    Downloads,
}

impl fmt::Display for SyncSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncSlice::Recipes => write!(f, "recipes"),
            SyncSlice::Favorites => write!(f, "favorites"),
            SyncSlice::Collections => write!(f, "collections"),
            SyncSlice::Downloads => write!(f, "downloads"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceFailure {
    pub slice: SyncSlice,
    pub reason: String,
}

impl fmt::Display for SliceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.slice, self.reason)
    }
}

fn join_failures(failures: &[SliceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by the sync coordinator.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Backend unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Partial sync failure ({})", join_failures(.0))]
    PartialSync(Vec<SliceFailure>),

    #[error("Local cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    /// Slices that failed, for a partial sync.
    pub fn failed_slices(&self) -> Vec<SyncSlice> {
        match self {
            SyncError::PartialSync(failures) => failures.iter().map(|f| f.slice).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::NotAuthenticated => SyncError::NotAuthenticated,
            RemoteError::NotFound(what) => SyncError::NotFound(what),
            RemoteError::Unavailable(reason) => SyncError::RemoteUnavailable(reason),
            RemoteError::Decode(reason) => {
                SyncError::RemoteUnavailable(format!("malformed document {}", reason))
            }
        }
    }
}
