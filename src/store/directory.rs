//! Directory emulation.
//!
//! Buckets act as top-level directories and key prefixes ending in `/` as
//! nested ones.  An empty directory is kept alive by a zero-byte marker
//! object stored inside its own prefix.

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use super::ObjectFileStore;
use crate::errors::{BackendError, BackendResult, DeleteReport, FailedDelete, StoreError, StoreResult};
use crate::metrics;
use crate::path::{self, PathKind, StorePath, SEPARATOR};
use crate::storage::client::ObjectBody;

const DELIMITER: &str = "/";

impl ObjectFileStore {
    /// Whether `directory` exists.
    ///
    /// The root always exists, a bucket exists when the account has it, and
    /// a nested directory exists when at least one object sits under its
    /// prefix (a marker counts).
    pub async fn directory_exists(&self, directory: &str) -> StoreResult<bool> {
        let result: StoreResult<bool> = async {
            let path = self.resolve(directory, true)?;
            let bucket = match path.bucket() {
                None => return Ok(true),
                Some(bucket) => bucket,
            };
            if path.kind() == PathKind::Bucket {
                let found = self
                    .find_bucket(bucket)
                    .await
                    .map_err(|e| StoreError::backend(&path, e))?;
                return Ok(found.is_some());
            }
            match self
                .client
                .list_objects(bucket, path.key(), None, None, Some(1))
                .await
            {
                Ok(listing) => Ok(!listing.keys.is_empty() || !listing.common_prefixes.is_empty()),
                Err(e) if e.is_not_found() => Ok(false),
                Err(e) => Err(StoreError::backend(&path, e)),
            }
        }
        .await;
        metrics::record_operation("directory_exists", &result);
        result
    }

    /// Create `directory`, provisioning its bucket if needed.
    ///
    /// Nested directories get a marker object so they are visible before
    /// any file is written into them.  Creating the root is a no-op.
    pub async fn create_directory(&self, directory: &str) -> StoreResult<()> {
        let result: StoreResult<()> = async {
            let path = self.resolve(directory, true)?;
            let bucket = match path.bucket() {
                None => return Ok(()),
                Some(bucket) => bucket,
            };
            self.ensure_bucket(bucket).await?;
            if let Some(marker) = path.directory_marker_key() {
                self.client
                    .put_object(bucket, &marker, ObjectBody::empty())
                    .await
                    .map_err(|e| StoreError::backend(&path, e))?;
            }
            info!("Created directory {}", path);
            Ok(())
        }
        .await;
        metrics::record_operation("create_directory", &result);
        result
    }

    /// Delete everything under `directory`.
    ///
    /// Deleting a bucket also removes the bucket itself.  With
    /// `recursive == false` the call fails with
    /// [`StoreError::DirectoryNotEmpty`] when anything besides the
    /// directory's own marker is present.  A directory that does not exist
    /// is treated as already deleted.
    ///
    /// Objects are deleted concurrently, bounded by
    /// [`StoreOptions::delete_concurrency`](super::StoreOptions).  If any
    /// delete fails the remaining objects are still attempted and the call
    /// returns [`StoreError::DeleteIncomplete`] carrying the per-key report.
    pub async fn delete_directory(&self, directory: &str, recursive: bool) -> StoreResult<DeleteReport> {
        let result: StoreResult<DeleteReport> = async {
            let path = self.resolve(directory, true)?;
            let bucket = path.bucket().ok_or_else(|| StoreError::InvalidOperation {
                message: "the root directory cannot be deleted".to_string(),
            })?;

            let keys = match self.walk_listing(bucket, path.key(), None).await {
                Ok(listing) => listing.keys,
                Err(e) if e.is_not_found() => {
                    debug!("Directory {} does not exist, nothing to delete", path);
                    return Ok(DeleteReport::default());
                }
                Err(e) => return Err(StoreError::backend(&path, e)),
            };

            if !recursive {
                let own_marker = path.directory_marker_key();
                let has_content = keys
                    .iter()
                    .any(|key| own_marker.as_deref() != Some(key.as_str()));
                if has_content {
                    return Err(StoreError::DirectoryNotEmpty {
                        path: path.to_string(),
                    });
                }
            }

            let report = self.delete_keys(bucket, keys).await;
            metrics::record_deleted(report.deleted.len() as u64);
            if !report.is_complete() {
                warn!(
                    "Deleting {} left {} of {} objects behind",
                    path,
                    report.failed.len(),
                    report.failed.len() + report.deleted.len()
                );
                return Err(StoreError::DeleteIncomplete {
                    path: path.to_string(),
                    report,
                });
            }

            if path.kind() == PathKind::Bucket {
                match self.client.delete_bucket(bucket).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(StoreError::backend(&path, e)),
                }
            }

            info!("Deleted directory {} ({} objects)", path, report.deleted.len());
            Ok(report)
        }
        .await;
        metrics::record_operation("delete_directory", &result);
        result
    }

    /// Immediate subdirectories of `directory`, as absolute paths ending in
    /// `/`.  For the root these are the account's buckets.
    pub async fn enumerate_directories(&self, directory: &str) -> StoreResult<Vec<String>> {
        let result: StoreResult<Vec<String>> = async {
            let path = self.resolve(directory, true)?;
            let bucket = match path.bucket() {
                Some(bucket) => bucket,
                None => {
                    let buckets = self
                        .client
                        .list_buckets()
                        .await
                        .map_err(|e| StoreError::backend(&path, e))?;
                    return Ok(buckets.into_iter().map(|b| format!("/{}/", b.name)).collect());
                }
            };
            let listing = self
                .walk_listing(bucket, path.key(), Some(DELIMITER))
                .await
                .map_err(|e| directory_error(&path, e))?;
            Ok(listing
                .common_prefixes
                .iter()
                .map(|prefix| path.sibling(prefix))
                .collect())
        }
        .await;
        metrics::record_operation("enumerate_directories", &result);
        result
    }

    /// Files directly inside `directory`, as absolute paths.
    ///
    /// Directory markers are not files and are never returned.  The root
    /// holds no files.
    pub async fn enumerate_files(&self, directory: &str) -> StoreResult<Vec<String>> {
        let result: StoreResult<Vec<String>> = async {
            let path = self.resolve(directory, true)?;
            let bucket = match path.bucket() {
                Some(bucket) => bucket,
                None => return Ok(Vec::new()),
            };
            let listing = self
                .walk_listing(bucket, path.key(), Some(DELIMITER))
                .await
                .map_err(|e| directory_error(&path, e))?;
            Ok(listing
                .keys
                .iter()
                .filter(|key| !key.ends_with(SEPARATOR) && !path::is_directory_marker(key))
                .map(|key| path.sibling(key))
                .collect())
        }
        .await;
        metrics::record_operation("enumerate_files", &result);
        result
    }

    /// Delete `keys` with bounded concurrency, collecting every outcome.
    async fn delete_keys(&self, bucket: &str, keys: Vec<String>) -> DeleteReport {
        let client = &self.client;
        let outcomes: Vec<(String, BackendResult<()>)> = stream::iter(keys)
            .map(move |key| async move {
                let outcome = match client.delete_object(bucket, &key).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other,
                };
                (key, outcome)
            })
            .buffer_unordered(self.options.delete_concurrency.max(1))
            .collect()
            .await;

        let mut report = DeleteReport::default();
        for (key, outcome) in outcomes {
            match outcome {
                Ok(()) => report.deleted.push(key),
                Err(error) => report.failed.push(FailedDelete { key, error }),
            }
        }
        report
    }
}

fn directory_error(path: &StorePath, e: BackendError) -> StoreError {
    if e.is_not_found() {
        StoreError::DirectoryNotFound {
            path: path.to_string(),
        }
    } else {
        StoreError::backend(path, e)
    }
}
