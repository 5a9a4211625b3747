//! Streamed writes.
//!
//! An [`ObjectWriter`] spools everything written to it into a temporary
//! file and uploads the whole file as one object on shutdown.  Nothing is
//! visible in the bucket until the upload completes; dropping the writer
//! before then discards the data.  A writer may carry a deadline, after
//! which the upload is abandoned.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::debug;

use crate::errors::{StoreError, StoreResult};
use crate::metrics;
use crate::path::StorePath;
use crate::storage::client::{ETag, ObjectBody, ObjectStoreClient};

enum WriterState {
    Open,
    Uploading(BoxFuture<'static, StoreResult<Option<ETag>>>),
    Done(Option<ETag>),
    Failed,
}

/// Write-side stream for a single object.
pub struct ObjectWriter {
    client: Arc<dyn ObjectStoreClient>,
    path: StorePath,
    file: File,
    spool: Option<TempPath>,
    written: u64,
    timeout: Option<Duration>,
    deadline: Option<Instant>,
    state: WriterState,
}

impl std::fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter")
            .field("path", &self.path)
            .field("written", &self.written)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ObjectWriter {
    /// Open a writer spooling to a fresh temporary file.  With a
    /// `timeout`, the upload must complete within that long from now.
    pub(crate) async fn new(
        client: Arc<dyn ObjectStoreClient>,
        path: StorePath,
        timeout: Option<Duration>,
    ) -> StoreResult<Self> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let spool = tokio::task::spawn_blocking(tempfile::NamedTempFile::new)
            .await
            .map_err(io::Error::other)??;
        let (file, spool) = spool.into_parts();
        Ok(Self {
            client,
            path,
            file: File::from_std(file),
            spool: Some(spool),
            written: 0,
            timeout,
            deadline,
            state: WriterState::Open,
        })
    }

    /// Destination of the upload.
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Instant after which the upload is abandoned, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Upload the spooled data and return the backend's ETag, if any.
    ///
    /// Equivalent to `shutdown()` but hands back the ETag and the typed
    /// error.
    pub async fn finish(mut self) -> StoreResult<Option<ETag>> {
        match std::mem::replace(&mut self.state, WriterState::Failed) {
            WriterState::Open => {
                self.file.flush().await?;
                self.start_upload().await
            }
            WriterState::Uploading(upload) => upload.await,
            WriterState::Done(etag) => Ok(etag),
            WriterState::Failed => Err(StoreError::InvalidOperation {
                message: format!("upload of {} already failed", self.path),
            }),
        }
    }

    fn start_upload(&mut self) -> BoxFuture<'static, StoreResult<Option<ETag>>> {
        let client = Arc::clone(&self.client);
        let path = self.path.clone();
        let spool = self.spool.take();
        let written = self.written;
        let timeout = self.timeout;
        let deadline = self.deadline;

        Box::pin(async move {
            let spool = spool.ok_or_else(|| StoreError::InvalidOperation {
                message: format!("upload of {path} already started"),
            })?;
            let timed_out = || StoreError::Timeout {
                path: path.to_string(),
                after: timeout.unwrap_or_default(),
            };
            let bucket = path.bucket().unwrap_or_default();
            let put = client.put_object(bucket, path.key(), ObjectBody::File(spool.to_path_buf()));
            let result = match deadline {
                Some(deadline) if Instant::now() >= deadline => return Err(timed_out()),
                Some(deadline) => match tokio::time::timeout_at(deadline, put).await {
                    Ok(result) => result,
                    Err(_) => return Err(timed_out()),
                },
                None => put.await,
            };
            let etag = result.map_err(|e| StoreError::backend(&path, e))?;
            drop(spool);
            metrics::record_uploaded(written);
            debug!("Uploaded {} ({} bytes)", path, written);
            Ok(etag)
        })
    }
}

impl AsyncWrite for ObjectWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if !matches!(this.state, WriterState::Open) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("writer for {} is closed", this.path),
            )));
        }
        let n = ready!(Pin::new(&mut this.file).poll_write(cx, buf))?;
        this.written += n as u64;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match this.state {
            WriterState::Open => Pin::new(&mut this.file).poll_flush(cx),
            _ => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                WriterState::Open => {
                    ready!(Pin::new(&mut this.file).poll_flush(cx))?;
                    let upload = this.start_upload();
                    this.state = WriterState::Uploading(upload);
                }
                WriterState::Uploading(upload) => {
                    let result = ready!(upload.as_mut().poll(cx));
                    return Poll::Ready(match result {
                        Ok(etag) => {
                            this.state = WriterState::Done(etag);
                            Ok(())
                        }
                        Err(e) => {
                            this.state = WriterState::Failed;
                            Err(io::Error::other(e))
                        }
                    });
                }
                WriterState::Done(_) => return Poll::Ready(Ok(())),
                WriterState::Failed => {
                    return Poll::Ready(Err(io::Error::other(format!(
                        "upload of {} failed",
                        this.path
                    ))))
                }
            }
        }
    }
}
