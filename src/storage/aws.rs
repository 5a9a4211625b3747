//! AWS S3 object-store client.
//!
//! Talks to AWS S3 or any S3-compatible endpoint (MinIO, LocalStack, ...)
//! through the official SDK.  Buckets and keys map one-to-one onto the
//! remote service.
//!
//! Credentials are resolved via the standard AWS credential chain
//! (env vars, `~/.aws/credentials`, IAM role, etc.) unless static keys are
//! configured.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::client::{
    BucketInfo, ClientFuture, ETag, ObjectBody, ObjectContent, ObjectListing, ObjectMetadata,
    ObjectStoreClient,
};
use crate::config::AwsBackendConfig;
use crate::errors::{BackendError, ErrorKind};

/// Region that rejects an explicit location constraint on bucket creation.
const DEFAULT_REGION: &str = "us-east-1";

/// Client backed by the AWS S3 SDK.
pub struct AwsClient {
    /// AWS S3 SDK client.
    client: Client,
    /// Region buckets are created in.
    region: String,
    /// Identifier used in logs.
    name: String,
}

impl AwsClient {
    /// Create a new AWS client.
    ///
    /// Loads AWS credentials from the default credential chain
    /// (environment variables, `~/.aws/credentials`, IAM role, etc.)
    /// unless explicit keys are configured.
    pub async fn new(config: &AwsBackendConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&config.endpoint_url);
        }

        // If explicit credentials are provided, inject them as static credentials.
        if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "bucketfs-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "AWS S3 client initialized: region={} endpoint='{}' path_style={}",
            config.region, config.endpoint_url, config.use_path_style
        );

        Ok(Self::from_client(client, config.region.clone()))
    }

    /// Wrap an already-configured SDK client.
    pub fn from_client(client: Client, region: String) -> Self {
        Self {
            client,
            name: format!("aws-s3:{region}"),
            region,
        }
    }

    /// Location constraint for bucket creation outside the default region.
    fn bucket_configuration(&self) -> Option<CreateBucketConfiguration> {
        if self.region == DEFAULT_REGION {
            return None;
        }
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build(),
        )
    }
}

/// Classify an SDK failure by service error code, then HTTP status.
fn classify_sdk_error<E>(context: &str, err: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let kind = classify(err.code(), status);
    BackendError::new(kind, format!("AWS S3 {context}: {}", DisplayErrorContext(&err)))
}

/// Map an S3 error code and HTTP status onto an [`ErrorKind`].
fn classify(code: Option<&str>, status: Option<u16>) -> ErrorKind {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => return ErrorKind::NotFound,
        Some("PreconditionFailed") => return ErrorKind::PreconditionFailed,
        Some("BucketAlreadyOwnedByYou") => return ErrorKind::AlreadyExists,
        Some("OperationAborted" | "BucketAlreadyExists") => return ErrorKind::Conflict,
        Some("BucketNotEmpty") => return ErrorKind::Other,
        _ => {}
    }
    match status {
        Some(404) => ErrorKind::NotFound,
        Some(412) => ErrorKind::PreconditionFailed,
        Some(409) => ErrorKind::Conflict,
        _ => ErrorKind::Other,
    }
}

/// Convert an SDK timestamp to UTC, defaulting to the epoch.
fn to_utc(dt: Option<&aws_sdk_s3::primitives::DateTime>) -> DateTime<Utc> {
    dt.and_then(|d| DateTime::<Utc>::from_timestamp(d.secs(), d.subsec_nanos()))
        .unwrap_or_default()
}

impl ObjectStoreClient for AwsClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_valid_bucket_name(&self, name: &str) -> bool {
        crate::path::is_valid_s3_bucket_name(name)
    }

    fn list_buckets(&self) -> ClientFuture<'_, Vec<BucketInfo>> {
        Box::pin(async move {
            debug!("AWS list_buckets");

            let mut buckets = Vec::new();
            let mut continuation_token: Option<String> = None;
            loop {
                let resp = self
                    .client
                    .list_buckets()
                    .set_continuation_token(continuation_token.take())
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error("list_buckets", e))?;

                buckets.extend(resp.buckets().iter().filter_map(|b| {
                    b.name().map(|name| BucketInfo {
                        name: name.to_string(),
                        created: to_utc(b.creation_date()),
                    })
                }));

                match resp.continuation_token() {
                    Some(token) if !token.is_empty() => continuation_token = Some(token.to_string()),
                    _ => break,
                }
            }
            Ok(buckets)
        })
    }

    fn create_bucket(&self, bucket: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            debug!("AWS create_bucket: bucket={} region={}", bucket, self.region);

            self.client
                .create_bucket()
                .bucket(&bucket)
                .set_create_bucket_configuration(self.bucket_configuration())
                .send()
                .await
                .map_err(|e| classify_sdk_error("create_bucket", e))?;

            Ok(())
        })
    }

    fn delete_bucket(&self, bucket: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        Box::pin(async move {
            debug!("AWS delete_bucket: bucket={}", bucket);

            self.client
                .delete_bucket()
                .bucket(&bucket)
                .send()
                .await
                .map_err(|e| classify_sdk_error("delete_bucket", e))?;

            Ok(())
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
        let delimiter = delimiter.map(str::to_string);
        let marker = marker.map(str::to_string);
        Box::pin(async move {
            debug!(
                "AWS list_objects_v2: bucket={} prefix='{}' delimiter={:?}",
                bucket, prefix, delimiter
            );

            let resp = self
                .client
                .list_objects_v2()
                .bucket(&bucket)
                .prefix(&prefix)
                .set_delimiter(delimiter)
                .set_continuation_token(marker)
                .set_max_keys(max_keys.map(|n| n.min(i32::MAX as u32) as i32))
                .send()
                .await
                .map_err(|e| classify_sdk_error("list_objects_v2", e))?;

            let keys = resp
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(str::to_string))
                .collect();
            let common_prefixes = resp
                .common_prefixes()
                .iter()
                .filter_map(|cp| cp.prefix().map(str::to_string))
                .collect();
            let next_marker = if resp.is_truncated() == Some(true) {
                resp.next_continuation_token().map(str::to_string)
            } else {
                None
            };

            Ok(ObjectListing {
                keys,
                common_prefixes,
                next_marker,
            })
        })
    }

    fn head_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ObjectMetadata> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("AWS head_object: bucket={} key={}", bucket, key);

            let resp = self
                .client
                .head_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| classify_sdk_error("head_object", e))?;

            Ok(ObjectMetadata {
                content_length: resp.content_length().unwrap_or(0).max(0) as u64,
                last_modified: to_utc(resp.last_modified()),
                etag: ETag::new(resp.e_tag().unwrap_or_default()),
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
        let if_match = if_match.map(|e| e.as_str().to_string());
        Box::pin(async move {
            debug!(
                "AWS get_object: bucket={} key={} if_match={:?}",
                bucket, key, if_match
            );

            let resp = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .set_if_match(if_match)
                .send()
                .await
                .map_err(|e| classify_sdk_error("get_object", e))?;

            let etag = resp.e_tag().map(ETag::from);
            let content_length = resp.content_length().map(|n| n.max(0) as u64);
            Ok(ObjectContent {
                etag,
                content_length,
                reader: Box::pin(resp.body.into_async_read()),
            })
        })
    }

    fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> ClientFuture<'_, Option<ETag>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let body = match body {
                ObjectBody::Bytes(data) => ByteStream::from(data),
                ObjectBody::File(path) => ByteStream::from_path(&path).await.map_err(|e| {
                    BackendError::other(format!("AWS S3 put_object body {}: {e}", path.display()))
                })?,
            };

            debug!("AWS put_object: bucket={} key={}", bucket, key);

            let resp = self
                .client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .map_err(|e| classify_sdk_error("put_object", e))?;

            Ok(resp.e_tag().map(ETag::from))
        })
    }

    fn delete_object(&self, bucket: &str, key: &str) -> ClientFuture<'_, ()> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            debug!("AWS delete_object: bucket={} key={}", bucket, key);

            // S3 delete_object is idempotent -- no error for missing keys.
            self.client
                .delete_object()
                .bucket(&bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| classify_sdk_error("delete_object", e))?;

            Ok(())
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(classify(Some("NoSuchKey"), Some(404)), ErrorKind::NotFound);
        assert_eq!(classify(Some("NoSuchBucket"), None), ErrorKind::NotFound);
        assert_eq!(
            classify(Some("PreconditionFailed"), Some(412)),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            classify(Some("BucketAlreadyOwnedByYou"), Some(409)),
            ErrorKind::AlreadyExists
        );
        assert_eq!(classify(Some("OperationAborted"), Some(409)), ErrorKind::Conflict);
        assert_eq!(classify(Some("BucketNotEmpty"), Some(409)), ErrorKind::Other);
        assert_eq!(classify(Some("AccessDenied"), Some(403)), ErrorKind::Other);
    }

    #[test]
    fn test_classify_by_status_when_code_missing() {
        // HEAD responses carry no body, so only the status is available.
        assert_eq!(classify(None, Some(404)), ErrorKind::NotFound);
        assert_eq!(classify(None, Some(412)), ErrorKind::PreconditionFailed);
        assert_eq!(classify(None, Some(409)), ErrorKind::Conflict);
        assert_eq!(classify(None, Some(500)), ErrorKind::Other);
        assert_eq!(classify(None, None), ErrorKind::Other);
    }

    #[test]
    fn test_to_utc() {
        let dt = aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000);
        assert_eq!(to_utc(Some(&dt)).timestamp(), 1_700_000_000);
        assert_eq!(to_utc(None), DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn test_bucket_configuration_depends_on_region() {
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let client = Client::from_conf(sdk_config);

        let us = AwsClient::from_client(client.clone(), "us-east-1".into());
        assert!(us.bucket_configuration().is_none());
        assert_eq!(us.name(), "aws-s3:us-east-1");

        let eu = AwsClient::from_client(client, "eu-west-1".into());
        let cfg = eu.bucket_configuration().unwrap();
        assert_eq!(
            cfg.location_constraint(),
            Some(&BucketLocationConstraint::EuWest1)
        );
    }
}
