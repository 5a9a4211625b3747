//! In-memory object-store client.
//!
//! Buckets and objects are held in a `tokio::sync::RwLock<BTreeMap<...>>`
//! so listings come out in key order, as they do from S3.  Listing pages
//! are capped at a configurable page size, which makes continuation
//! markers easy to exercise.
//!
//! Failures can be injected per operation (and optionally per key) to
//! simulate backend conflicts and partial outages.

use std::collections::BTreeMap;
use std::sync::Mutex;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tracing::debug;

use super::client::{
    BucketInfo, ClientFuture, ETag, ObjectBody, ObjectContent, ObjectListing, ObjectMetadata,
    ObjectStoreClient,
};
use crate::errors::{BackendError, BackendResult, ErrorKind};

/// Default number of entries per listing page (same as S3).
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Client operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    ListObjects,
    HeadObject,
    GetObject,
    PutObject,
    DeleteObject,
}

/// A pending injected failure.
#[derive(Debug, Clone)]
struct Fault {
    operation: Operation,
    /// Bucket name or object key the fault applies to; `None` matches all.
    target: Option<String>,
    kind: ErrorKind,
    remaining: u32,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    etag: ETag,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct MemoryBucket {
    created: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

/// In-memory [`ObjectStoreClient`].
pub struct MemoryClient {
    buckets: tokio::sync::RwLock<BTreeMap<String, MemoryBucket>>,
    page_size: u32,
    faults: Mutex<Vec<Fault>>,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a client whose listings return at most `page_size` entries
    /// per page.
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            buckets: tokio::sync::RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Make the next `times` calls of `operation` fail with `kind`.
    ///
    /// `target` restricts the fault to one object key (or bucket name for
    /// bucket operations).
    pub fn inject_fault(&self, operation: Operation, target: Option<&str>, kind: ErrorKind, times: u32) {
        self.faults.lock().expect("fault list poisoned").push(Fault {
            operation,
            target: target.map(str::to_string),
            kind,
            remaining: times,
        });
    }

    /// Number of objects currently stored in `bucket` (0 if absent).
    pub async fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .read()
            .await
            .get(bucket)
            .map_or(0, |b| b.objects.len())
    }

    fn check_fault(&self, operation: Operation, target: &str) -> BackendResult<()> {
        let mut faults = self.faults.lock().expect("fault list poisoned");
        let hit = faults.iter_mut().find(|f| {
            f.operation == operation
                && f.remaining > 0
                && f.target.as_deref().map_or(true, |t| t == target)
        });
        if let Some(fault) = hit {
            fault.remaining -= 1;
            let kind = fault.kind;
            faults.retain(|f| f.remaining > 0);
            return Err(BackendError::new(
                kind,
                format!("injected {} failure for {:?} on '{}'", kind.as_str(), operation, target),
            ));
        }
        Ok(())
    }

    /// Compute the quoted MD5-hex ETag for a byte slice.
    fn compute_etag(data: &[u8]) -> ETag {
        let mut hasher = Md5::new();
        hasher.update(data);
        ETag::new(format!("\"{}\"", hex::encode(hasher.finalize())))
    }

    fn no_such_bucket(bucket: &str) -> BackendError {
        BackendError::not_found(format!("NoSuchBucket: {bucket}"))
    }

    fn no_such_key(bucket: &str, key: &str) -> BackendError {
        BackendError::not_found(format!("NoSuchKey: {bucket}/{key}"))
    }
}

impl ObjectStoreClient for MemoryClient {
    fn name(&self) -> &str {
        "memory"
    }

    fn list_buckets(&self) -> ClientFuture<'_, Vec<BucketInfo>> {
        Box::pin(async move {
            self.check_fault(Operation::ListBuckets, "")?;
            let buckets = self.buckets.read().await;
            Ok(buckets
                .iter()
                .map(|(name, b)| BucketInfo {
                    name: name.clone(),
                    created: b.created,
                })
                .collect())
        })
    }

    fn create_bucket(&self, bucket: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            self.check_fault(Operation::CreateBucket, &bucket)?;
            let mut buckets = self.buckets.write().await;
            if buckets.contains_key(&bucket) {
                return Err(BackendError::new(
                    ErrorKind::AlreadyExists,
                    format!("BucketAlreadyOwnedByYou: {bucket}"),
                ));
            }
            debug!("memory create_bucket: {}", bucket);
            buckets.insert(
                bucket,
                MemoryBucket {
                    created: Utc::now(),
                    objects: BTreeMap::new(),
                },
            );
            Ok(())
        })
    }

    fn delete_bucket(&self, bucket: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            self.check_fault(Operation::DeleteBucket, &bucket)?;
            let mut buckets = self.buckets.write().await;
            match buckets.get(&bucket) {
                None => Err(Self::no_such_bucket(&bucket)),
                Some(b) if !b.objects.is_empty() => Err(BackendError::other(format!(
                    "BucketNotEmpty: {bucket}"
                ))),
                Some(_) => {
                    debug!("memory delete_bucket: {}", bucket);
                    buckets.remove(&bucket);
                    Ok(())
                }
            }
        })
    }

    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
        max_keys: Option<u32>,
    ) -> ClientFuture<'_, ObjectListing> {
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let delimiter = delimiter.filter(|d| !d.is_empty()).map(str::to_string);
        let marker = marker.map(str::to_string);
        Box::pin(async move {
            self.check_fault(Operation::ListObjects, &bucket)?;
            let limit = max_keys.unwrap_or(self.page_size).clamp(1, self.page_size) as usize;

            let buckets = self.buckets.read().await;
            let b = buckets
                .get(&bucket)
                .ok_or_else(|| Self::no_such_bucket(&bucket))?;

            // The common prefix a key rolls up into under the delimiter.
            let group_of = |key: &str| -> Option<String> {
                let d = delimiter.as_deref()?;
                let rest = key.strip_prefix(prefix.as_str())?;
                rest.find(d)
                    .map(|pos| format!("{}{}{}", prefix, &rest[..pos], d))
            };

            // A marker that is itself a common prefix skips the whole group.
            // A plain key that merely ends in the delimiter (e.g. `d/` listed
            // under prefix `d/`) does not.
            let marker_is_group = marker
                .as_deref()
                .is_some_and(|m| group_of(m).as_deref() == Some(m));

            let mut listing = ObjectListing::default();
            let mut count = 0usize;
            let mut last: Option<String> = None;
            let mut truncated = false;

            for key in b.objects.keys().filter(|k| k.starts_with(&prefix)) {
                if let Some(m) = &marker {
                    if key.as_str() <= m.as_str() || (marker_is_group && key.starts_with(m.as_str())) {
                        continue;
                    }
                }

                let group = group_of(key.as_str());

                if let Some(group) = &group {
                    if listing.common_prefixes.last() == Some(group) {
                        continue;
                    }
                }

                if count == limit {
                    truncated = true;
                    break;
                }
                count += 1;

                match group {
                    Some(group) => {
                        last = Some(group.clone());
                        listing.common_prefixes.push(group);
                    }
                    None => {
                        last = Some(key.clone());
                        listing.keys.push(key.clone());
                    }
                }
            }

            if truncated {
                listing.next_marker = last;
            }
            Ok(listing)
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ObjectMetadata> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.check_fault(Operation::HeadObject, &key)?;
            let buckets = self.buckets.read().await;
            let obj = buckets
                .get(&bucket)
                .and_then(|b| b.objects.get(&key))
                .ok_or_else(|| Self::no_such_key(&bucket, &key))?;
            Ok(ObjectMetadata {
                content_length: obj.data.len() as u64,
                last_modified: obj.last_modified,
                etag: obj.etag.clone(),
            })
        })
    }

    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        if_match: Option<&ETag>,
    ) -> ClientFuture<'_, ObjectContent> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let if_match = if_match.cloned();
        Box::pin(async move {
            self.check_fault(Operation::GetObject, &key)?;
            let buckets = self.buckets.read().await;
            let obj = buckets
                .get(&bucket)
                .and_then(|b| b.objects.get(&key))
                .ok_or_else(|| Self::no_such_key(&bucket, &key))?;

            if let Some(expected) = &if_match {
                if !obj.etag.matches(expected.as_str()) {
                    return Err(BackendError::new(
                        ErrorKind::PreconditionFailed,
                        format!("PreconditionFailed: {bucket}/{key}"),
                    ));
                }
            }

            Ok(ObjectContent {
                etag: Some(obj.etag.clone()),
                content_length: Some(obj.data.len() as u64),
                reader: Box::pin(std::io::Cursor::new(obj.data.clone())),
            })
        })
    }

    fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> ClientFuture<'_, Option<ETag>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.check_fault(Operation::PutObject, &key)?;
            let data = match body {
                ObjectBody::Bytes(data) => data,
                ObjectBody::File(path) => Bytes::from(tokio::fs::read(&path).await.map_err(|e| {
                    BackendError::other(format!("reading {}: {e}", path.display()))
                })?),
            };

            let mut buckets = self.buckets.write().await;
            let b = buckets
                .get_mut(&bucket)
                .ok_or_else(|| Self::no_such_bucket(&bucket))?;

            let etag = Self::compute_etag(&data);
            debug!("memory put_object: {}/{} ({} bytes)", bucket, key, data.len());
            b.objects.insert(
                key,
                StoredObject {
                    data,
                    etag: etag.clone(),
                    last_modified: Utc::now(),
                },
            );
            Ok(Some(etag))
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            self.check_fault(Operation::DeleteObject, &key)?;
            let mut buckets = self.buckets.write().await;
            let b = buckets
                .get_mut(&bucket)
                .ok_or_else(|| Self::no_such_bucket(&bucket))?;
            // S3 delete_object is idempotent -- no error for missing keys.
            b.objects.remove(&key);
            Ok(())
        })
    }
}
