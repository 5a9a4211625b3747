//! Object-store backends.
//!
//! The [`client::ObjectStoreClient`] trait abstracts over the service
//! holding the buckets.  Implementations include an AWS S3 client (any
//! S3-compatible endpoint) and an in-memory store used for tests and dry
//! runs.

pub mod aws;
pub mod client;
pub mod memory;
