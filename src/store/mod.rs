//! Hierarchical file store over an object-store client.
//!
//! [`ObjectFileStore`] is an immutable value: a shared client handle, a
//! default bucket that non-rooted paths resolve against, and a few
//! tunables.  Every operation is an independent request/response cycle
//! against the backend; the store keeps no state between calls.
//!
//! Directory semantics are emulated in [`directory`], per-object
//! operations live in [`file`], and streamed uploads go through
//! [`writer::ObjectWriter`].

pub mod directory;
pub mod file;
pub mod writer;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::errors::{BackendError, BackendResult, ErrorKind, StoreError, StoreResult};
use crate::path::{self, PathKind, StorePath};
use crate::retry::RetryPolicy;
use crate::storage::client::{BucketInfo, ObjectListing, ObjectStoreClient};

pub use writer::ObjectWriter;

/// Tunables shared by every store value built from the same configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Retry policy for bucket-creation conflicts.
    pub conflict_retry: RetryPolicy,
    /// Upper bound on a `write_etag` call, from acquisition to upload.
    pub write_timeout: Duration,
    /// Concurrent deletes during a directory delete.
    pub delete_concurrency: usize,
    /// Entries requested per listing page.
    pub list_page_size: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            conflict_retry: RetryPolicy::default(),
            write_timeout: Duration::from_secs(40 * 60),
            delete_concurrency: 64,
            list_page_size: 1000,
        }
    }
}

/// File store backed by buckets of an object-store account.
#[derive(Clone)]
pub struct ObjectFileStore {
    client: Arc<dyn ObjectStoreClient>,
    default_bucket: String,
    options: StoreOptions,
}

impl std::fmt::Debug for ObjectFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFileStore")
            .field("client", &self.client.name())
            .field("default_bucket", &self.default_bucket)
            .field("options", &self.options)
            .finish()
    }
}

impl ObjectFileStore {
    /// Bind a store to `default_bucket` without touching the backend.
    pub fn new(client: Arc<dyn ObjectStoreClient>, default_bucket: impl Into<String>) -> StoreResult<Self> {
        let default_bucket = default_bucket.into();
        check_bucket_name(client.as_ref(), &default_bucket)?;
        Ok(Self {
            client,
            default_bucket,
            options: StoreOptions::default(),
        })
    }

    /// Bind a store and make sure its default bucket exists.
    pub async fn create(
        client: Arc<dyn ObjectStoreClient>,
        default_bucket: impl Into<String>,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let store = Self::new(client, default_bucket)?.with_options(options);
        store.ensure_bucket(&store.default_bucket).await?;
        Ok(store)
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// A new store rooted at another bucket, sharing this store's client.
    ///
    /// Accepts `/bucket/`, `/bucket`, or a bare bucket name.
    pub fn with_default_directory(&self, directory: &str) -> StoreResult<Self> {
        let bucket = if path::is_path_rooted(directory) {
            let parsed = StorePath::parse(directory, true).map_err(|source| StoreError::InvalidPath {
                path: directory.to_string(),
                source,
            })?;
            match (parsed.kind(), parsed.bucket()) {
                (PathKind::Bucket, Some(bucket)) => bucket.to_string(),
                _ => {
                    return Err(StoreError::InvalidArgument {
                        path: directory.to_string(),
                        message: "default directory must be a bucket".to_string(),
                    })
                }
            }
        } else {
            directory.trim_end_matches(path::SEPARATOR).to_string()
        };
        check_bucket_name(self.client.as_ref(), &bucket)?;

        Ok(Self {
            client: Arc::clone(&self.client),
            default_bucket: bucket,
            options: self.options,
        })
    }

    pub fn client(&self) -> &Arc<dyn ObjectStoreClient> {
        &self.client
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }

    /// The default bucket rendered as a directory path.
    pub fn default_directory(&self) -> String {
        format!("/{}/", self.default_bucket)
    }

    pub fn root_directory(&self) -> &'static str {
        "/"
    }

    // -- Path utilities --------------------------------------------------------

    pub fn combine<I, S>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        path::combine(segments)
    }

    pub fn get_directory_name<'a>(&self, path: &'a str) -> &'a str {
        path::get_directory_name(path)
    }

    pub fn get_file_name<'a>(&self, path: &'a str) -> &'a str {
        path::get_file_name(path)
    }

    pub fn is_path_rooted(&self, path: &str) -> bool {
        path::is_path_rooted(path)
    }

    // -- Shared helpers --------------------------------------------------------

    /// Normalize `raw` against the default bucket.
    pub(crate) fn resolve(&self, raw: &str, as_directory: bool) -> StoreResult<StorePath> {
        path::normalize(&self.default_bucket, raw, as_directory).map_err(|source| {
            StoreError::InvalidPath {
                path: raw.to_string(),
                source,
            }
        })
    }

    /// Normalize `raw` and require it to address an object.
    pub(crate) fn resolve_object(&self, raw: &str) -> StoreResult<StorePath> {
        let path = self.resolve(raw, false)?;
        if path.kind() != PathKind::Object {
            return Err(StoreError::InvalidArgument {
                path: path.to_string(),
                message: "expected a file path, found a bucket or the root".to_string(),
            });
        }
        Ok(path)
    }

    /// Create `bucket` unless it already exists.
    ///
    /// Conflicts from concurrent creators are retried under
    /// [`StoreOptions::conflict_retry`].
    pub(crate) async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        check_bucket_name(self.client.as_ref(), bucket)?;
        let client = &self.client;
        self.options
            .conflict_retry
            .run(
                "create_bucket",
                move || async move {
                    match client.create_bucket(bucket).await {
                        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                            debug!("bucket {} already exists", bucket);
                            Ok(())
                        }
                        other => other,
                    }
                },
                BackendError::is_conflict,
            )
            .await
            .map_err(|e| StoreError::backend(format!("/{bucket}/"), e))
    }

    /// Look `bucket` up among the account's buckets.
    pub(crate) async fn find_bucket(&self, bucket: &str) -> BackendResult<Option<BucketInfo>> {
        let buckets = self.client.list_buckets().await?;
        Ok(buckets.into_iter().find(|b| b.name == bucket))
    }

    /// Walk every listing page under `prefix`, in listing order.
    pub(crate) async fn walk_listing(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> BackendResult<ObjectListing> {
        let mut all = ObjectListing::default();
        let mut marker: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects(
                    bucket,
                    prefix,
                    delimiter,
                    marker.as_deref(),
                    Some(self.options.list_page_size),
                )
                .await?;
            all.keys.extend(page.keys);
            all.common_prefixes.extend(page.common_prefixes);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(all)
    }
}

fn check_bucket_name(client: &dyn ObjectStoreClient, name: &str) -> StoreResult<()> {
    if client.is_valid_bucket_name(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidBucketName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::memory::{MemoryClient, Operation};

    pub(crate) fn fast_options() -> StoreOptions {
        StoreOptions {
            conflict_retry: RetryPolicy::fixed(5, Duration::from_millis(1)),
            write_timeout: Duration::from_secs(30),
            delete_concurrency: 4,
            list_page_size: 2,
        }
    }

    /// A store over a fresh memory client with small listing pages.
    pub(crate) fn memory_store() -> (Arc<MemoryClient>, ObjectFileStore) {
        memory_store_with_page_size(2)
    }

    pub(crate) fn memory_store_with_page_size(page_size: u32) -> (Arc<MemoryClient>, ObjectFileStore) {
        let client = Arc::new(MemoryClient::with_page_size(page_size));
        let store = ObjectFileStore::new(client.clone(), "mbrace-data")
            .unwrap()
            .with_options(StoreOptions {
                list_page_size: page_size,
                ..fast_options()
            });
        (client, store)
    }

    #[test]
    fn test_new_rejects_invalid_default_bucket() {
        let client = Arc::new(MemoryClient::new());
        let err = ObjectFileStore::new(client, "bad/bucket").unwrap_err();
        assert!(matches!(err, StoreError::InvalidBucketName { .. }));
    }

    #[tokio::test]
    async fn test_create_provisions_default_bucket() {
        let client = Arc::new(MemoryClient::new());
        let store = ObjectFileStore::create(client.clone(), "mbrace-data", fast_options())
            .await
            .unwrap();
        assert!(store.find_bucket("mbrace-data").await.unwrap().is_some());
        // Creating again against an existing bucket is fine.
        ObjectFileStore::create(client, "mbrace-data", fast_options())
            .await
            .unwrap();
    }

    #[test]
    fn test_with_default_directory_shares_client() {
        let (client, store) = memory_store();
        let other = store.with_default_directory("/other-bucket/").unwrap();
        assert_eq!(other.default_bucket(), "other-bucket");
        assert_eq!(other.default_directory(), "/other-bucket/");
        // The source store keeps its bucket.
        assert_eq!(store.default_bucket(), "mbrace-data");
        assert_eq!(other.options(), store.options());
        assert!(Arc::ptr_eq(other.client(), store.client()));
        assert_eq!(Arc::strong_count(&client), 3);

        assert_eq!(
            store.with_default_directory("plain-name").unwrap().default_bucket(),
            "plain-name"
        );
    }

    #[test]
    fn test_with_default_directory_rejects_non_bucket() {
        let (_, store) = memory_store();
        assert!(matches!(
            store.with_default_directory("/bucket/sub/"),
            Err(StoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            store.with_default_directory("/"),
            Err(StoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            store.with_default_directory("tab\tname"),
            Err(StoreError::InvalidBucketName { .. })
        ));
    }

    #[test]
    fn test_resolve_object_requires_object_kind() {
        let (_, store) = memory_store();
        assert_eq!(
            store.resolve_object("foo.txt").unwrap().to_string(),
            "/mbrace-data/foo.txt"
        );
        assert!(matches!(
            store.resolve_object("/"),
            Err(StoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            store.resolve_object("/some-bucket/"),
            Err(StoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_path_utilities() {
        let (_, store) = memory_store();
        assert_eq!(store.combine(["/bucket", "dir", "file.txt"]), "/bucket/dir/file.txt");
        assert_eq!(store.get_directory_name("/bucket/dir/file.txt"), "/bucket/dir");
        assert_eq!(store.get_file_name("/bucket/dir/file.txt"), "file.txt");
        assert!(store.is_path_rooted("/bucket"));
        assert_eq!(store.root_directory(), "/");
    }

    #[tokio::test]
    async fn test_ensure_bucket_retries_conflicts() {
        let (client, store) = memory_store();
        client.inject_fault(Operation::CreateBucket, None, ErrorKind::Conflict, 3);
        store.ensure_bucket("racy-bucket").await.unwrap();
        assert!(store.find_bucket("racy-bucket").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ensure_bucket_gives_up_after_retry_budget() {
        let (client, store) = memory_store();
        client.inject_fault(Operation::CreateBucket, None, ErrorKind::Conflict, 6);
        let err = store.ensure_bucket("racy-bucket").await.unwrap_err();
        match err {
            StoreError::Backend { source, .. } => assert!(source.is_conflict()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_walk_listing_follows_markers() {
        let (client, store) = memory_store();
        client.create_bucket("mbrace-data").await.unwrap();
        for key in ["a", "b", "c", "d", "e"] {
            client
                .put_object("mbrace-data", key, crate::storage::client::ObjectBody::empty())
                .await
                .unwrap();
        }
        let listing = store.walk_listing("mbrace-data", "", None).await.unwrap();
        assert_eq!(listing.keys, vec!["a", "b", "c", "d", "e"]);
    }
}
