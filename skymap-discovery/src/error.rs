//! Error types for the skymap-discovery crate.

use skymap_graph::{LabelError, NodeKeyError, StoreError};
use thiserror::Error;

/// A record could not be given a graph identity.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Resource type cannot be used as a label: {0}")]
    Label(#[from] LabelError),

    #[error("Resource has no usable key: {0}")]
    Key(#[from] NodeKeyError),
}

/// Errors from the enumeration collaborator.
#[derive(Debug, Clone, Error)]
pub enum ListError {
    /// Credentials are missing, expired or rejected.
    #[error("Credential check failed: {0}")]
    Credentials(String),

    /// The provider rejected or failed a list call.
    #[error("{0}")]
    Provider(String),
}

/// Errors from the detail-fetch collaborator.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("No detail available for {service}/{kind}/{id}")]
    NotFound {
        service: String,
        kind: String,
        id: String,
    },

    #[error("Detail fetch for {service}/{kind}/{id} failed: {message}")]
    Provider {
        service: String,
        kind: String,
        id: String,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Unexpected response shape: {0}")]
    Malformed(String),
}

/// Errors that abort a projection run.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The store became unreachable; remaining projection was skipped.
    #[error("Graph store unavailable, projection aborted: {0}")]
    StorageUnavailable(#[source] StoreError),

    #[error("Invalid account identity: {0}")]
    Account(#[from] RecordError),
}

/// Errors that abort a discovery run before any work starts.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Enumeration credentials rejected: {0}")]
    Credentials(#[source] ListError),

    #[error("Failed to read snapshot {path}: {source}")]
    SnapshotRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse snapshot {path}: {message}")]
    SnapshotParse { path: String, message: String },

    #[error("Invalid exclude pattern {pattern:?}: {message}")]
    ExcludePattern { pattern: String, message: String },

    #[error("Unknown service: {0}")]
    UnknownService(String),
}
