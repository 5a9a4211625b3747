//! Error types for the file store.
//!
//! Backend failures are classified exactly once, at the client boundary,
//! into a [`BackendError`] carrying a closed [`ErrorKind`].  The store
//! then translates those into [`StoreError`] variants that speak in
//! file-system terms (file not found, directory not found, ...).

use std::time::Duration;

use thiserror::Error;

use crate::path::PathError;

/// Result alias used by every [`crate::storage::client::ObjectStoreClient`] call.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result alias used by the store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The bucket or object does not exist.
    NotFound,
    /// A conditional request (If-Match) did not hold.
    PreconditionFailed,
    /// A transient conflict, e.g. a concurrent bucket creation in flight.
    Conflict,
    /// The bucket already exists and is owned by the caller.
    AlreadyExists,
    /// Anything else.
    Other,
}

impl ErrorKind {
    /// Short, stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::Other => "other",
        }
    }
}

/// A classified failure reported by an object-store backend.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    kind: ErrorKind,
    message: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_precondition_failed(&self) -> bool {
        self.kind == ErrorKind::PreconditionFailed
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

/// A single key that could not be removed during a directory delete.
#[derive(Debug, Clone)]
pub struct FailedDelete {
    /// Object key within the bucket.
    pub key: String,
    /// The backend failure for that key.
    pub error: BackendError,
}

/// Per-key outcome of a directory delete fan-out.
#[derive(Debug, Clone, Default)]
pub struct DeleteReport {
    /// Keys that are gone (including keys that were already absent).
    pub deleted: Vec<String>,
    /// Keys whose delete request failed.
    pub failed: Vec<FailedDelete>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors surfaced by the file store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path string could not be parsed.
    #[error("invalid path '{path}': {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },

    /// The path is the wrong kind for the requested operation.
    #[error("invalid argument for '{path}': {message}")]
    InvalidArgument { path: String, message: String },

    /// The bucket name violates backend naming rules.
    #[error("invalid bucket name '{name}'")]
    InvalidBucketName { name: String },

    /// The operation can never succeed on this path (e.g. deleting root).
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// No object exists at the path.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// No bucket or prefix exists at the path.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: String },

    /// A non-recursive delete found content under the prefix.
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty { path: String },

    /// Some objects under the prefix could not be deleted.
    #[error("could not delete {} of {} objects under {path}", report.failed.len(), report.failed.len() + report.deleted.len())]
    DeleteIncomplete { path: String, report: DeleteReport },

    /// A write did not complete within its allotted time.
    #[error("writing {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    /// An unclassified backend failure, propagated unchanged.
    #[error("backend error on {path}: {source}")]
    Backend {
        path: String,
        #[source]
        source: BackendError,
    },

    /// Local I/O failure (local files, caller-supplied streams).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Wrap a backend failure for `path` without reinterpreting it.
    pub fn backend(path: impl ToString, source: BackendError) -> Self {
        StoreError::Backend {
            path: path.to_string(),
            source,
        }
    }

    /// Label used by the operation metrics.
    pub fn label(&self) -> &'static str {
        match self {
            StoreError::InvalidPath { .. } => "invalid_path",
            StoreError::InvalidArgument { .. } => "invalid_argument",
            StoreError::InvalidBucketName { .. } => "invalid_bucket_name",
            StoreError::InvalidOperation { .. } => "invalid_operation",
            StoreError::FileNotFound { .. } => "file_not_found",
            StoreError::DirectoryNotFound { .. } => "directory_not_found",
            StoreError::DirectoryNotEmpty { .. } => "directory_not_empty",
            StoreError::DeleteIncomplete { .. } => "delete_incomplete",
            StoreError::Timeout { .. } => "timeout",
            StoreError::Backend { .. } => "backend",
            StoreError::Io(_) => "io",
        }
    }
}
