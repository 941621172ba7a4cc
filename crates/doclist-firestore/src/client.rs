//! Firestore REST API client.
//!
//! Holds the pieces every listing needs:
//! - Database identity (project, database) and base URL
//! - Bearer credentials
//! - A tuned HTTP client (pooling, timeouts)
//! - Observability (tracing spans, metrics)

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{info_span, Instrument};
use url::Url;

use crate::auth::Credentials;
use crate::endpoint;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;

/// Public Firestore REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Database used when none is configured.
pub const DEFAULT_DATABASE_ID: &str = "(default)";

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// REST root, up to and including the API version
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl FirestoreConfig {
    /// Config for `project_id` with default database, endpoint and timeouts.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: DEFAULT_DATABASE_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::config("GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore")
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::config(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        Ok(Self::from_env_for(project_id))
    }

    /// Config for an explicit project; everything else comes from the
    /// environment.
    pub fn from_env_for(project_id: impl Into<String>) -> Self {
        let base_url = match std::env::var("FIRESTORE_BASE_URL").ok().filter(|s| !s.is_empty()) {
            Some(url) => url,
            None => match std::env::var("FIRESTORE_EMULATOR_HOST").ok().filter(|s| !s.is_empty()) {
                Some(host) => format!("http://{}/v1", host),
                None => DEFAULT_BASE_URL.to_string(),
            },
        };

        Self {
            project_id: project_id.into(),
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_ID.to_string()),
            base_url,
            timeout: Duration::from_secs(env_secs("FIRESTORE_TIMEOUT_SECS", 30)),
            connect_timeout: Duration::from_secs(env_secs("FIRESTORE_CONNECT_TIMEOUT_SECS", 5)),
        }
    }
}

fn env_secs(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
///
/// Cheap to clone; clones share the connection pool and token cache.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    pub(crate) http: Client,
    pub(crate) config: FirestoreConfig,
    pub(crate) credentials: Credentials,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub fn new(config: FirestoreConfig, credentials: Credentials) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("doclist-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        let credentials = Credentials::from_env()?;
        Self::new(config, credentials)
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    /// URL of the resource at `components` under this database.
    pub(crate) fn documents_url(&self, components: &[&str]) -> FirestoreResult<Url> {
        endpoint::documents_url(
            &self.config.base_url,
            &self.config.project_id,
            &self.config.database_id,
            components,
        )
    }

    /// Execute an operation with tracing and metrics.
    pub(crate) async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            project = %self.config.project_id,
            collection = %collection
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }
}

// =============================================================================
// Tests
// =============================================================================
