//! Prometheus metrics for bucketfs.
//!
//! Store operations report through the `metrics` facade.  Without an
//! installed recorder every call is a no-op; the CLI installs a Prometheus
//! recorder via [`init_metrics`] when asked to print metrics.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::errors::StoreResult;

// -- Metric name constants ----------------------------------------------------

/// Total store operations (counter). Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "bucketfs_operations_total";

/// Total bytes written to the backend (counter).
pub const BYTES_UPLOADED_TOTAL: &str = "bucketfs_bytes_uploaded_total";

/// Total bytes read from the backend (counter).
pub const BYTES_DOWNLOADED_TOTAL: &str = "bucketfs_bytes_downloaded_total";

/// Bucket-creation attempts repeated after a conflict (counter).
pub const CONFLICT_RETRIES_TOTAL: &str = "bucketfs_conflict_retries_total";

/// Objects removed by directory deletes (counter).
pub const OBJECTS_DELETED_TOTAL: &str = "bucketfs_objects_deleted_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times. Fails if another recorder is already installed.
pub fn init_metrics() -> anyhow::Result<&'static PrometheusHandle> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(OPERATIONS_TOTAL, "Total store operations by type and outcome");
    describe_counter!(BYTES_UPLOADED_TOTAL, "Total bytes uploaded to the backend");
    describe_counter!(BYTES_DOWNLOADED_TOTAL, "Total bytes downloaded from the backend");
    describe_counter!(
        CONFLICT_RETRIES_TOTAL,
        "Bucket creations retried after a conflict"
    );
    describe_counter!(OBJECTS_DELETED_TOTAL, "Objects deleted by directory deletes");
}

/// Count one store operation, labelled with its outcome.
pub fn record_operation<T>(operation: &'static str, result: &StoreResult<T>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    };
    counter!(OPERATIONS_TOTAL, "operation" => operation, "status" => status).increment(1);
}

pub fn record_uploaded(bytes: u64) {
    counter!(BYTES_UPLOADED_TOTAL).increment(bytes);
}

pub fn record_downloaded(bytes: u64) {
    counter!(BYTES_DOWNLOADED_TOTAL).increment(bytes);
}

pub fn record_deleted(objects: u64) {
    counter!(OBJECTS_DELETED_TOTAL).increment(objects);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;

    #[test]
    fn test_metric_names_are_namespaced() {
        for name in [
            OPERATIONS_TOTAL,
            BYTES_UPLOADED_TOTAL,
            BYTES_DOWNLOADED_TOTAL,
            CONFLICT_RETRIES_TOTAL,
            OBJECTS_DELETED_TOTAL,
        ] {
            assert!(name.starts_with("bucketfs_"), "{name}");
        }
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_operation("delete_file", &Ok::<(), StoreError>(()));
        record_operation::<()>(
            "delete_file",
            &Err(StoreError::FileNotFound { path: "/b/k".into() }),
        );
        record_uploaded(10);
        record_downloaded(10);
        record_deleted(1);
    }
}
