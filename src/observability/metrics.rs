//! Metrics for the catalog authoring pipeline, the listing cache and the
//! storefront, recorded through the `metrics` facade and rendered by a
//! Prometheus recorder.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Wizard and update stages
    StageSubmitted,
    StageFailed,

    // Media host
    MediaUploads,
    MediaUploadRetries,
    MediaUploadFailures,

    // Name uniqueness
    NameChecks,
    NameCheckFailures,
    NameCheckDiscarded,

    // Listing cache
    CacheHits,
    CacheMisses,
    CacheFetchErrors,

    // Catalog writes
    EntitiesCreated,
    EntitiesDeleted,
    EnquiriesSubmitted,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::StageSubmitted => "catalog_stage_submitted_total",
            MetricName::StageFailed => "catalog_stage_failed_total",
            MetricName::MediaUploads => "catalog_media_uploads_total",
            MetricName::MediaUploadRetries => "catalog_media_upload_retries_total",
            MetricName::MediaUploadFailures => "catalog_media_upload_failures_total",
            MetricName::NameChecks => "catalog_name_checks_total",
            MetricName::NameCheckFailures => "catalog_name_check_failures_total",
            MetricName::NameCheckDiscarded => "catalog_name_check_discarded_total",
            MetricName::CacheHits => "catalog_cache_hits_total",
            MetricName::CacheMisses => "catalog_cache_misses_total",
            MetricName::CacheFetchErrors => "catalog_cache_fetch_errors_total",
            MetricName::EntitiesCreated => "catalog_entities_created_total",
            MetricName::EntitiesDeleted => "catalog_entities_deleted_total",
            MetricName::EnquiriesSubmitted => "catalog_enquiries_submitted_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            StageSubmitted,
            StageFailed,
            MediaUploads,
            MediaUploadRetries,
            MediaUploadFailures,
            NameChecks,
            NameCheckFailures,
            NameCheckDiscarded,
            CacheHits,
            CacheMisses,
            CacheFetchErrors,
            EntitiesCreated,
            EntitiesDeleted,
            EnquiriesSubmitted,
        ]
        .into_iter()
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            METRICS_HANDLE.set(handle).ok();
            for metric in MetricName::all_metrics() {
                ::metrics::describe_counter!(metric.as_str(), metric.as_str());
            }
            info!("Metrics recorder installed");
        }
        Err(e) => warn!("Metrics recorder install failed (possibly already installed): {}", e),
    }
}

/// Prometheus text exposition, if the recorder is installed.
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod stages {
    use super::MetricName;

    pub fn submitted(stage: &'static str) {
        ::metrics::counter!(MetricName::StageSubmitted.as_str(), "stage" => stage).increment(1);
    }

    pub fn failed(stage: &'static str) {
        ::metrics::counter!(MetricName::StageFailed.as_str(), "stage" => stage).increment(1);
    }
}

pub mod media {
    use super::MetricName;

    pub fn uploaded(folder: &str) {
        ::metrics::counter!(MetricName::MediaUploads.as_str(), "folder" => folder.to_string())
            .increment(1);
    }

    pub fn retried() {
        ::metrics::counter!(MetricName::MediaUploadRetries.as_str()).increment(1);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::MediaUploadFailures.as_str()).increment(1);
    }
}

pub mod names {
    use super::MetricName;

    pub fn checked() {
        ::metrics::counter!(MetricName::NameChecks.as_str()).increment(1);
    }

    pub fn check_failed() {
        ::metrics::counter!(MetricName::NameCheckFailures.as_str()).increment(1);
    }

    pub fn stale_discarded() {
        ::metrics::counter!(MetricName::NameCheckDiscarded.as_str()).increment(1);
    }
}

pub mod cache {
    use super::MetricName;

    pub fn hit(key: &str) {
        ::metrics::counter!(MetricName::CacheHits.as_str(), "key" => key.to_string()).increment(1);
    }

    pub fn miss(key: &str) {
        ::metrics::counter!(MetricName::CacheMisses.as_str(), "key" => key.to_string())
            .increment(1);
    }

    pub fn fetch_error(key: &str) {
        ::metrics::counter!(MetricName::CacheFetchErrors.as_str(), "key" => key.to_string())
            .increment(1);
    }
}

pub mod catalog {
    use super::MetricName;

    pub fn created(kind: &'static str) {
        ::metrics::counter!(MetricName::EntitiesCreated.as_str(), "kind" => kind).increment(1);
    }

    pub fn deleted(kind: &'static str) {
        ::metrics::counter!(MetricName::EntitiesDeleted.as_str(), "kind" => kind).increment(1);
    }

    pub fn enquiry(kind: &'static str) {
        ::metrics::counter!(MetricName::EnquiriesSubmitted.as_str(), "kind" => kind).increment(1);
    }
}
