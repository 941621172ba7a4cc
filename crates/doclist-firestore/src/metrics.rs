//! Firestore metrics collection.
//!
//! Records through the `metrics` facade; installing an exporter is up to the
//! embedding binary.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total Firestore requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "firestore_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "firestore_latency_seconds";

    /// Pages fetched by list operations, by collection.
    pub const LIST_PAGES_TOTAL: &str = "firestore_list_pages_total";

    /// Documents returned by list operations, by collection.
    pub const LIST_DOCUMENTS_RETURNED_TOTAL: &str = "firestore_list_documents_returned_total";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed Firestore operation.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record one fetched list page and the documents it carried.
pub fn record_list_page(collection: &str, documents: usize) {
    counter!(
        names::LIST_PAGES_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(1);

    counter!(
        names::LIST_DOCUMENTS_RETURNED_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(documents as u64);
}
