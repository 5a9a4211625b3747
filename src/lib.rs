//! bucketfs -- hierarchical file-store semantics over object-storage buckets.
//!
//! Paths look like `/bucket/dir/file`.  Buckets are the top-level
//! directories, key prefixes ending in `/` are nested directories, and
//! empty directories are kept visible by zero-byte marker objects.
//! Objects are versioned by ETag, which enables conditional reads.
//!
//! The store talks to the backend through the [`ObjectStoreClient`]
//! trait; an S3 implementation and an in-memory one are provided.

pub mod config;
pub mod errors;
pub mod metrics;
pub mod path;
pub mod retry;
pub mod storage;
pub mod store;

pub use errors::{BackendError, DeleteReport, ErrorKind, StoreError, StoreResult};
pub use path::{PathKind, StorePath};
pub use storage::client::{ETag, ObjectReader, ObjectStoreClient};
pub use store::{ObjectFileStore, ObjectWriter, StoreOptions};
