//! Abstract object-store client trait.
//!
//! [`ObjectStoreClient`] is the complete capability set the file store
//! needs from a backend: bucket listing and lifecycle, delimiter-aware
//! object listing with continuation markers, and per-object head, get,
//! put, and delete.  Every failure is returned as an already-classified
//! [`BackendError`] so callers never inspect raw SDK errors.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::errors::BackendResult;

/// Boxed future returned by every client method.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;

/// Streaming object content.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Opaque per-object version token.
///
/// Backends usually return the token wrapped in double quotes; comparison
/// via [`ETag::matches`] ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare two tags, ignoring surrounding quotes.
    pub fn matches(&self, other: &str) -> bool {
        strip_etag_quotes(&self.0) == strip_etag_quotes(other)
    }
}

impl std::fmt::Display for ETag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ETag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ETag {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Strip surrounding double quotes from an ETag string for comparison.
pub fn strip_etag_quotes(etag: &str) -> &str {
    let etag = etag.trim();
    if etag.starts_with('"') && etag.ends_with('"') && etag.len() >= 2 {
        &etag[1..etag.len() - 1]
    } else {
        etag
    }
}

/// A bucket visible to the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    pub name: String,
    pub created: DateTime<Utc>,
}

/// Result of a metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: ETag,
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Keys matched directly by the prefix (no delimiter after it).
    pub keys: Vec<String>,
    /// Grouped child prefixes, each ending in the delimiter.
    pub common_prefixes: Vec<String>,
    /// Marker for the next page; `None` once the listing is exhausted.
    pub next_marker: Option<String>,
}

/// Content and metadata returned by a get.
pub struct ObjectContent {
    pub etag: Option<ETag>,
    pub content_length: Option<u64>,
    pub reader: ObjectReader,
}

impl std::fmt::Debug for ObjectContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectContent")
            .field("etag", &self.etag)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Payload of a put.
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// In-memory bytes.
    Bytes(Bytes),
    /// A local file streamed from disk.
    File(PathBuf),
}

impl ObjectBody {
    pub fn empty() -> Self {
        ObjectBody::Bytes(Bytes::new())
    }
}

/// Async object-store contract.
pub trait ObjectStoreClient: Send + Sync + 'static {
    /// Short identifier for logs (e.g. `aws-s3:eu-west-1`).
    fn name(&self) -> &str;

    /// Whether the backend accepts `name` as a bucket name.
    fn is_valid_bucket_name(&self, name: &str) -> bool {
        crate::path::is_plain_bucket_name(name)
    }

    /// List every bucket owned by the account.
    fn list_buckets(&self) -> ClientFuture<'_, Vec<BucketInfo>>;

    /// Create a bucket.  An already-owned bucket fails with
    /// [`crate::errors::ErrorKind::AlreadyExists`].
    fn create_bucket(&self, bucket: &str) -> ClientFuture<'_, ()>;

    /// Delete an empty bucket.
    fn delete_bucket(&self, bucket: &str) -> ClientFuture<'_, ()>;

    /// List one page of keys under `prefix`.
    ///
    /// With a delimiter, keys containing it after the prefix are grouped
    /// into `common_prefixes`.  `marker` is the `next_marker` of the
    /// previous page.
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: Option<u32>,
    ) -> ClientFuture<'_, ObjectListing>;

    /// Fetch object metadata without content.
    fn head_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ObjectMetadata>;

    /// Fetch object content; with `if_match`, fails with
    /// [`crate::errors::ErrorKind::PreconditionFailed`] when the current tag
    /// differs.
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        if_match: Option<&ETag>,
    ) -> ClientFuture<'_, ObjectContent>;

    /// Write an object, returning its new ETag when the backend reports one.
    fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> ClientFuture<'_, Option<ETag>>;

    /// Delete an object.
    fn delete_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_etag_quotes() {
        assert_eq!(strip_etag_quotes("\"abc\""), "abc");
        assert_eq!(strip_etag_quotes("abc"), "abc");
        assert_eq!(strip_etag_quotes("\""), "\"");
        assert_eq!(strip_etag_quotes(" \"abc\" "), "abc");
    }

    #[test]
    fn test_etag_matches_ignores_quotes() {
        let etag = ETag::new("\"d41d8cd98f00b204e9800998ecf8427e\"");
        assert!(etag.matches("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(etag.matches("\"d41d8cd98f00b204e9800998ecf8427e\""));
        assert!(!etag.matches("\"other\""));
        assert_eq!(etag.to_string(), "\"d41d8cd98f00b204e9800998ecf8427e\"");
    }
}
