//! Error types for the scrapper
//!
//! Every variant carries the [`ResourceKind`] whose traversal produced it, so a
//! single error returned from a concurrent run still says where it came from.

use super::model::ResourceKind;
use thiserror::Error;

/// Errors produced while building listers or walking their pages
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// The backend client for a resource kind could not be constructed
    #[error("failed to initialize {kind} client: {source:#}")]
    Initialization {
        kind: ResourceKind,
        #[source]
        source: anyhow::Error,
    },

    /// Advancing to the next page failed
    #[error("failed to advance {kind} page: {source:#}")]
    Fetch {
        kind: ResourceKind,
        #[source]
        source: anyhow::Error,
    },

    /// The run was cancelled before the next page was requested
    #[error("{kind} listing cancelled before next page")]
    Cancelled { kind: ResourceKind },

    /// The run deadline passed before the next page was requested
    #[error("{kind} listing exceeded the run deadline")]
    DeadlineExceeded { kind: ResourceKind },

    /// The item handler rejected a record
    #[error("failed to process {kind} page: {source:#}")]
    Handler {
        kind: ResourceKind,
        #[source]
        source: anyhow::Error,
    },

    /// A lister task panicked or was aborted
    #[error("lister task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ScrapeError {
    /// Resource kind the error originated from, if known
    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Initialization { kind, .. }
            | Self::Fetch { kind, .. }
            | Self::Cancelled { kind }
            | Self::DeadlineExceeded { kind }
            | Self::Handler { kind, .. } => Some(*kind),
            Self::Task(_) => None,
        }
    }

    /// Whether the error ended a traversal at a fetch boundary
    /// (failed fetch, cancellation or deadline)
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Cancelled { .. } | Self::DeadlineExceeded { .. }
        )
    }

    /// Whether the error came from the item handler
    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }

    /// Whether the error only reflects a sibling's failure or the deadline
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::DeadlineExceeded { .. })
    }
}
