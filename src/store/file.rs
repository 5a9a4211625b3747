//! Per-object file operations.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::writer::ObjectWriter;
use super::ObjectFileStore;
use crate::errors::{BackendError, StoreError, StoreResult};
use crate::metrics;
use crate::path::{PathKind, StorePath};
use crate::storage::client::{ETag, ObjectBody, ObjectContent, ObjectReader};

impl ObjectFileStore {
    pub async fn file_exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.try_get_etag(path).await?.is_some())
    }

    /// Delete the object at `path`.  A missing object is not an error.
    pub async fn delete_file(&self, path: &str) -> StoreResult<()> {
        let result: StoreResult<()> = async {
            let path = self.resolve_object(path)?;
            match self.client.delete_object(bucket_of(&path), path.key()).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(StoreError::backend(&path, e)),
            }
            info!("Deleted {}", path);
            Ok(())
        }
        .await;
        metrics::record_operation("delete_file", &result);
        result
    }

    pub async fn get_file_size(&self, path: &str) -> StoreResult<u64> {
        let result: StoreResult<u64> = async {
            let path = self.resolve_object(path)?;
            let meta = self
                .client
                .head_object(bucket_of(&path), path.key())
                .await
                .map_err(|e| file_error(&path, e))?;
            Ok(meta.content_length)
        }
        .await;
        metrics::record_operation("get_file_size", &result);
        result
    }

    /// Last modification time of a file or directory, in UTC.
    ///
    /// The root reports [`DateTime::<Utc>::MIN_UTC`].  A bucket reports its
    /// creation time and a nested directory the time of its marker.  A
    /// directory with no marker but with objects under it reports the time
    /// of its first object.
    pub async fn get_last_modified_time(&self, path: &str, is_directory: bool) -> StoreResult<DateTime<Utc>> {
        let result: StoreResult<DateTime<Utc>> = async {
            let path = self.resolve(path, is_directory)?;
            let missing = |path: &StorePath| {
                let path = path.to_string();
                if is_directory {
                    StoreError::DirectoryNotFound { path }
                } else {
                    StoreError::FileNotFound { path }
                }
            };

            match (path.kind(), path.bucket()) {
                (PathKind::Root, _) => Ok(DateTime::<Utc>::MIN_UTC),
                (PathKind::Bucket, Some(bucket)) => {
                    if !is_directory {
                        return Err(missing(&path));
                    }
                    let info = self
                        .find_bucket(bucket)
                        .await
                        .map_err(|e| StoreError::backend(&path, e))?;
                    info.map(|b| b.created).ok_or_else(|| missing(&path))
                }
                (_, bucket) => {
                    let key = if is_directory {
                        path.directory_marker_key().unwrap_or_default()
                    } else {
                        path.key().to_string()
                    };
                    let bucket = bucket.unwrap_or_default();
                    match self.client.head_object(bucket, &key).await {
                        Ok(meta) => Ok(meta.last_modified),
                        Err(e) if e.is_not_found() && is_directory => self
                            .first_object_time(bucket, &path)
                            .await?
                            .ok_or_else(|| missing(&path)),
                        Err(e) if e.is_not_found() => Err(missing(&path)),
                        Err(e) => Err(StoreError::backend(&path, e)),
                    }
                }
            }
        }
        .await;
        metrics::record_operation("get_last_modified_time", &result);
        result
    }

    /// Current ETag of the object, or `None` if it does not exist.
    pub async fn try_get_etag(&self, path: &str) -> StoreResult<Option<ETag>> {
        let result: StoreResult<Option<ETag>> = async {
            let path = self.resolve_object(path)?;
            match self.client.head_object(bucket_of(&path), path.key()).await {
                Ok(meta) => Ok(Some(meta.etag)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(StoreError::backend(&path, e)),
            }
        }
        .await;
        metrics::record_operation("try_get_etag", &result);
        result
    }

    /// Open the object for reading only if its ETag still equals `etag`.
    ///
    /// Returns `None` when the object has changed since `etag` was taken.
    pub async fn read_etag(&self, path: &str, etag: &ETag) -> StoreResult<Option<ObjectReader>> {
        let result: StoreResult<Option<ObjectReader>> = async {
            let path = self.resolve_object(path)?;
            match self
                .client
                .get_object(bucket_of(&path), path.key(), Some(etag))
                .await
            {
                Ok(content) => Ok(Some(content.reader)),
                Err(e) if e.is_precondition_failed() => {
                    debug!("{} no longer has ETag {}", path, etag);
                    Ok(None)
                }
                Err(e) => Err(file_error(&path, e)),
            }
        }
        .await;
        metrics::record_operation("read_etag", &result);
        result
    }

    /// Open the object for reading.
    pub async fn begin_read(&self, path: &str) -> StoreResult<ObjectReader> {
        let result: StoreResult<ObjectReader> = async {
            let path = self.resolve_object(path)?;
            Ok(self.open(&path).await?.reader)
        }
        .await;
        metrics::record_operation("begin_read", &result);
        result
    }

    /// Open a write stream for the object, creating its bucket if needed.
    ///
    /// The object appears once the writer is shut down or finished.
    pub async fn begin_write(&self, path: &str) -> StoreResult<ObjectWriter> {
        let result = self.open_writer(path, None).await;
        metrics::record_operation("begin_write", &result);
        result
    }

    /// Run `writer` against a fresh write stream for `path` and upload the
    /// result.
    ///
    /// If `writer` fails, nothing is uploaded and its error is returned.
    /// Otherwise the object's new ETag is returned alongside the writer's
    /// value.  `writer` and the upload together must finish within the
    /// store's `write_timeout`.
    pub async fn write_etag<T, F>(&self, path: &str, writer: F) -> StoreResult<(ETag, T)>
    where
        F: for<'w> FnOnce(&'w mut ObjectWriter) -> BoxFuture<'w, StoreResult<T>>,
    {
        let result: StoreResult<(ETag, T)> = async {
            let limit = self.options.write_timeout;
            let mut stream = self.open_writer(path, Some(limit)).await?;
            let object = stream.path().clone();
            let value = match stream.deadline() {
                Some(deadline) => match tokio::time::timeout_at(deadline, writer(&mut stream)).await {
                    Ok(value) => value?,
                    Err(_) => {
                        return Err(StoreError::Timeout {
                            path: object.to_string(),
                            after: limit,
                        })
                    }
                },
                None => writer(&mut stream).await?,
            };
            let etag = stream.finish().await?;
            let etag = self.etag_after_write(&object, etag).await?;
            Ok((etag, value))
        }
        .await;
        metrics::record_operation("write_etag", &result);
        result
    }

    /// Copy `source` into the object at `path` and return its new ETag.
    ///
    /// The copy is unbounded in time; a slow source only delays the upload.
    pub async fn upload_from_stream<R>(&self, path: &str, source: &mut R) -> StoreResult<ETag>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let result: StoreResult<ETag> = async {
            let mut stream = self.open_writer(path, None).await?;
            tokio::io::copy(source, &mut stream).await?;
            let object = stream.path().clone();
            let etag = stream.finish().await?;
            let etag = self.etag_after_write(&object, etag).await?;
            info!("Uploaded {}", object);
            Ok(etag)
        }
        .await;
        metrics::record_operation("upload_from_stream", &result);
        result
    }

    /// Upload a local file to `path` and return the object's new ETag.
    pub async fn upload_from_local_file(&self, local: impl AsRef<Path>, path: &str) -> StoreResult<ETag> {
        let local = local.as_ref();
        let result: StoreResult<ETag> = async {
            let path = self.resolve_object(path)?;
            let len = tokio::fs::metadata(local).await?.len();
            let bucket = bucket_of(&path);
            self.ensure_bucket(bucket).await?;
            let etag = self
                .client
                .put_object(bucket, path.key(), ObjectBody::File(local.to_path_buf()))
                .await
                .map_err(|e| StoreError::backend(&path, e))?;
            metrics::record_uploaded(len);
            let etag = self.etag_after_write(&path, etag).await?;
            info!("Uploaded {} to {} ({} bytes)", local.display(), path, len);
            Ok(etag)
        }
        .await;
        metrics::record_operation("upload_from_local_file", &result);
        result
    }

    /// Copy the object at `path` into `dest`; returns the bytes copied.
    pub async fn download_to_stream<W>(&self, path: &str, dest: &mut W) -> StoreResult<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let result: StoreResult<u64> = async {
            let path = self.resolve_object(path)?;
            let mut content = self.open(&path).await?;
            let copied = tokio::io::copy(&mut content.reader, dest).await?;
            dest.flush().await?;
            metrics::record_downloaded(copied);
            Ok(copied)
        }
        .await;
        metrics::record_operation("download_to_stream", &result);
        result
    }

    /// Download the object at `path` into a local file, replacing it.
    ///
    /// The local file is only created once the object has been found.
    pub async fn download_to_local_file(&self, path: &str, local: impl AsRef<Path>) -> StoreResult<u64> {
        let local = local.as_ref();
        let result: StoreResult<u64> = async {
            let path = self.resolve_object(path)?;
            let mut content = self.open(&path).await?;
            let mut file = tokio::fs::File::create(local).await?;
            let copied = tokio::io::copy(&mut content.reader, &mut file).await?;
            file.flush().await?;
            metrics::record_downloaded(copied);
            info!("Downloaded {} to {} ({} bytes)", path, local.display(), copied);
            Ok(copied)
        }
        .await;
        metrics::record_operation("download_to_local_file", &result);
        result
    }

    /// Write stream for `path`, without recording an operation metric.
    async fn open_writer(&self, path: &str, timeout: Option<Duration>) -> StoreResult<ObjectWriter> {
        let path = self.resolve_object(path)?;
        self.ensure_bucket(bucket_of(&path)).await?;
        ObjectWriter::new(self.client.clone(), path, timeout).await
    }

    /// Modification time of the first object under a directory that has
    /// no marker, or `None` when nothing is there.
    async fn first_object_time(&self, bucket: &str, path: &StorePath) -> StoreResult<Option<DateTime<Utc>>> {
        let listing = match self
            .client
            .list_objects(bucket, path.key(), None, None, Some(1))
            .await
        {
            Ok(listing) => listing,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(StoreError::backend(path, e)),
        };
        let Some(key) = listing.keys.first() else {
            return Ok(None);
        };
        match self.client.head_object(bucket, key).await {
            Ok(meta) => Ok(Some(meta.last_modified)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(StoreError::backend(path, e)),
        }
    }

    async fn open(&self, path: &StorePath) -> StoreResult<ObjectContent> {
        self.client
            .get_object(bucket_of(path), path.key(), None)
            .await
            .map_err(|e| file_error(path, e))
    }

    /// ETag reported by an upload, or a fresh probe when the backend sent
    /// none.
    async fn etag_after_write(&self, path: &StorePath, etag: Option<ETag>) -> StoreResult<ETag> {
        if let Some(etag) = etag {
            return Ok(etag);
        }
        debug!("No ETag in upload response for {}, probing", path);
        let meta = self
            .client
            .head_object(bucket_of(path), path.key())
            .await
            .map_err(|e| file_error(path, e))?;
        Ok(meta.etag)
    }
}

/// Bucket of a path already known to address an object.
fn bucket_of(path: &StorePath) -> &str {
    path.bucket().unwrap_or_default()
}

fn file_error(path: &StorePath, e: BackendError) -> StoreError {
    if e.is_not_found() {
        StoreError::FileNotFound {
            path: path.to_string(),
        }
    } else {
        StoreError::backend(path, e)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use futures::FutureExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::errors::{ErrorKind, StoreError};
    use crate::storage::client::ObjectStoreClient;
    use crate::storage::memory::Operation;
    use crate::store::tests::memory_store;
    use crate::store::StoreOptions;

    async fn read_to_vec(mut reader: crate::storage::client::ObjectReader) -> Vec<u8> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn test_upload_then_read_back() {
        let (_, store) = memory_store();
        let mut source: &[u8] = b"payload";
        let etag = store.upload_from_stream("/mbrace-data/a/b.txt", &mut source).await.unwrap();

        assert!(store.file_exists("/mbrace-data/a/b.txt").await.unwrap());
        assert_eq!(store.get_file_size("/mbrace-data/a/b.txt").await.unwrap(), 7);
        assert_eq!(store.try_get_etag("/mbrace-data/a/b.txt").await.unwrap(), Some(etag));
        let reader = store.begin_read("a/b.txt").await.unwrap();
        assert_eq!(read_to_vec(reader).await, b"payload");
    }

    #[tokio::test]
    async fn test_upload_provisions_bucket() {
        let (client, store) = memory_store();
        let mut source: &[u8] = b"x";
        store.upload_from_stream("/fresh-bucket/x", &mut source).await.unwrap();
        assert!(client
            .list_buckets()
            .await
            .unwrap()
            .iter()
            .any(|b| b.name == "fresh-bucket"));
    }

    #[tokio::test]
    async fn test_upload_into_missing_bucket_then_size() {
        let (_, store) = memory_store();
        assert!(!store.directory_exists("/mbraceX/").await.unwrap());
        let mut source: &[u8] = b"some bytes";
        store.upload_from_stream("/mbraceX/foo.txt", &mut source).await.unwrap();
        assert!(store.directory_exists("/mbraceX/").await.unwrap());
        assert_eq!(store.get_file_size("/mbraceX/foo.txt").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (_, store) = memory_store();
        store.create_directory("/mbrace-data/").await.unwrap();
        let missing = "/mbrace-data/nope.txt";

        assert!(!store.file_exists(missing).await.unwrap());
        assert_eq!(store.try_get_etag(missing).await.unwrap(), None);
        assert!(matches!(
            store.get_file_size(missing).await,
            Err(StoreError::FileNotFound { .. })
        ));
        assert!(matches!(
            store.begin_read(missing).await,
            Err(StoreError::FileNotFound { .. })
        ));
        let mut sink = Vec::new();
        assert!(matches!(
            store.download_to_stream(missing, &mut sink).await,
            Err(StoreError::FileNotFound { .. })
        ));
        // Deleting a missing file is fine.
        store.delete_file(missing).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_ops_reject_directories() {
        let (_, store) = memory_store();
        assert!(matches!(
            store.get_file_size("/").await,
            Err(StoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            store.delete_file("/mbrace-data/").await,
            Err(StoreError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (_, store) = memory_store();
        let mut source: &[u8] = b"bye";
        store.upload_from_stream("gone.txt", &mut source).await.unwrap();
        store.delete_file("gone.txt").await.unwrap();
        assert!(!store.file_exists("gone.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_etag_detects_change() {
        let (_, store) = memory_store();
        let mut v1: &[u8] = b"version one";
        let etag = store.upload_from_stream("doc.txt", &mut v1).await.unwrap();

        let reader = store.read_etag("doc.txt", &etag).await.unwrap().unwrap();
        assert_eq!(read_to_vec(reader).await, b"version one");

        let mut v2: &[u8] = b"version two";
        let newer = store.upload_from_stream("doc.txt", &mut v2).await.unwrap();
        assert_ne!(etag, newer);
        assert!(store.read_etag("doc.txt", &etag).await.unwrap().is_none());
        assert!(matches!(
            store.read_etag("other.txt", &etag).await,
            Err(StoreError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_etag_returns_value_and_etag() {
        let (_, store) = memory_store();
        let (etag, written) = store
            .write_etag("/mbrace-data/w.txt", |w| {
                async move {
                    w.write_all(b"streamed").await?;
                    Ok::<_, StoreError>(w.bytes_written())
                }
                .boxed()
            })
            .await
            .unwrap();
        assert_eq!(written, 8);
        assert_eq!(store.try_get_etag("w.txt").await.unwrap(), Some(etag));
    }

    #[tokio::test]
    async fn test_write_etag_failure_uploads_nothing() {
        let (client, store) = memory_store();
        let err = store
            .write_etag::<(), _>("/mbrace-data/w.txt", |w| {
                async move {
                    w.write_all(b"half").await?;
                    Err::<(), _>(StoreError::InvalidOperation {
                        message: "writer gave up".into(),
                    })
                }
                .boxed()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation { .. }));
        assert_eq!(client.object_count("mbrace-data").await, 0);
    }

    #[tokio::test]
    async fn test_write_etag_times_out() {
        let (client, store) = memory_store();
        let options = StoreOptions {
            write_timeout: Duration::from_millis(20),
            ..*store.options()
        };
        let store = store.with_options(options);
        let err = store
            .write_etag("/mbrace-data/slow.txt", |_| {
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, StoreError>(())
                }
                .boxed()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert_eq!(client.object_count("mbrace-data").await, 0);
    }

    #[tokio::test]
    async fn test_upload_from_slow_stream_ignores_write_timeout() {
        let (_, store) = memory_store();
        let options = StoreOptions {
            write_timeout: Duration::from_millis(50),
            ..*store.options()
        };
        let store = store.with_options(options);
        let (mut tx, mut rx) = tokio::io::duplex(64);
        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tx.write_all(b"late").await.unwrap();
        });

        store.upload_from_stream("/mbrace-data/late.txt", &mut rx).await.unwrap();
        sender.await.unwrap();
        let reader = store.begin_read("late.txt").await.unwrap();
        assert_eq!(read_to_vec(reader).await, b"late");
    }

    #[tokio::test]
    async fn test_begin_write_is_not_bounded_by_write_timeout() {
        let (_, store) = memory_store();
        let options = StoreOptions {
            write_timeout: Duration::from_millis(10),
            ..*store.options()
        };
        let store = store.with_options(options);
        let mut writer = store.begin_write("/mbrace-data/held.txt").await.unwrap();
        assert!(writer.deadline().is_none());
        tokio::time::sleep(Duration::from_millis(30)).await;
        writer.write_all(b"held").await.unwrap();
        writer.finish().await.unwrap();
        assert_eq!(store.get_file_size("held.txt").await.unwrap(), 4);
    }

    #[test]
    fn test_uploads_count_one_operation_each() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let (_, store) = memory_store();
                let mut source: &[u8] = b"once";
                store.upload_from_stream("/mbrace-data/once.txt", &mut source).await.unwrap();
                store
                    .write_etag("/mbrace-data/twice.txt", |w| {
                        async move {
                            w.write_all(b"twice").await?;
                            Ok::<_, StoreError>(())
                        }
                        .boxed()
                    })
                    .await
                    .unwrap();
            });
        });

        let rendered = handle.render();
        assert!(!rendered.contains("operation=\"begin_write\""), "{rendered}");
        for op in ["upload_from_stream", "write_etag"] {
            let label = format!("operation=\"{op}\"");
            let line = rendered.lines().find(|l| l.contains(&label)).unwrap();
            assert!(line.ends_with(" 1"), "{line}");
        }
    }

    #[tokio::test]
    async fn test_local_file_round_trip() {
        let (_, store) = memory_store();
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        std::fs::write(&src, b"0123456789").unwrap();

        let etag = store.upload_from_local_file(&src, "/mbrace-data/blob.bin").await.unwrap();
        assert_eq!(store.try_get_etag("blob.bin").await.unwrap(), Some(etag));

        let copied = store.download_to_local_file("blob.bin", &dst).await.unwrap();
        assert_eq!(copied, 10);
        assert_eq!(std::fs::read(&dst).unwrap(), b"0123456789");
    }

    #[tokio::test]
    async fn test_download_missing_does_not_create_local_file() {
        let (_, store) = memory_store();
        store.create_directory("/mbrace-data/").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("never.bin");
        assert!(matches!(
            store.download_to_local_file("missing.bin", &dst).await,
            Err(StoreError::FileNotFound { .. })
        ));
        assert!(!dst.exists());
    }

    #[tokio::test]
    async fn test_upload_missing_local_file_is_io_error() {
        let (_, store) = memory_store();
        assert!(matches!(
            store.upload_from_local_file("/nonexistent/file.bin", "x.bin").await,
            Err(StoreError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_download_to_stream_counts_bytes() {
        let (_, store) = memory_store();
        let mut source: &[u8] = b"abcdef";
        store.upload_from_stream("s.txt", &mut source).await.unwrap();
        let mut sink = Vec::new();
        assert_eq!(store.download_to_stream("s.txt", &mut sink).await.unwrap(), 6);
        assert_eq!(sink, b"abcdef");
    }

    #[tokio::test]
    async fn test_last_modified_times() {
        let (_, store) = memory_store();
        let before = Utc::now();
        store.create_directory("/mbrace-data/dir").await.unwrap();
        let mut source: &[u8] = b"x";
        store.upload_from_stream("/mbrace-data/dir/f.txt", &mut source).await.unwrap();

        assert_eq!(
            store.get_last_modified_time("/", true).await.unwrap(),
            DateTime::<Utc>::MIN_UTC
        );
        assert!(store.get_last_modified_time("/mbrace-data/", true).await.unwrap() >= before);
        assert!(store.get_last_modified_time("/mbrace-data/dir", true).await.unwrap() >= before);
        assert!(store.get_last_modified_time("/mbrace-data/dir/f.txt", false).await.unwrap() >= before);

        assert!(matches!(
            store.get_last_modified_time("/mbrace-data/", false).await,
            Err(StoreError::FileNotFound { .. })
        ));
        assert!(matches!(
            store.get_last_modified_time("/mbrace-data/ghost", true).await,
            Err(StoreError::DirectoryNotFound { .. })
        ));
        assert!(matches!(
            store.get_last_modified_time("/mbrace-data/ghost.txt", false).await,
            Err(StoreError::FileNotFound { .. })
        ));
        assert!(matches!(
            store.get_last_modified_time("/ghost-bucket/", true).await,
            Err(StoreError::DirectoryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_last_modified_of_directory_holding_only_files() {
        let (_, store) = memory_store();
        let before = Utc::now();
        let mut source: &[u8] = b"x";
        store
            .upload_from_stream("/mbrace-data/only-files/f.txt", &mut source)
            .await
            .unwrap();
        assert!(store.directory_exists("/mbrace-data/only-files/").await.unwrap());
        assert!(
            store
                .get_last_modified_time("/mbrace-data/only-files/", true)
                .await
                .unwrap()
                >= before
        );
        assert!(matches!(
            store.get_last_modified_time("/mbrace-data/only", true).await,
            Err(StoreError::DirectoryNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_head_failure_is_not_masked() {
        let (client, store) = memory_store();
        let mut source: &[u8] = b"x";
        store.upload_from_stream("f.txt", &mut source).await.unwrap();
        client.inject_fault(Operation::HeadObject, Some("f.txt"), ErrorKind::Other, 1);
        assert!(matches!(
            store.file_exists("f.txt").await,
            Err(StoreError::Backend { .. })
        ));
    }
}
