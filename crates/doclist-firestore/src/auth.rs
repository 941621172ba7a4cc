//! Bearer credentials for Firestore requests.
//!
//! A caller either hands over an opaque access token, or lets the client mint
//! tokens from a service account. Minted tokens are cached and refreshed
//! shortly before they expire; concurrent callers share a single refresh.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh a minted token this long before it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider reports an unusable expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Environment variable holding a pre-issued bearer token.
pub const TOKEN_ENV_VAR: &str = "FIRESTORE_TOKEN";

// =============================================================================
// Credentials
// =============================================================================

/// Source of the `Authorization: Bearer` token.
#[derive(Clone)]
pub enum Credentials {
    /// Opaque token, sent verbatim. Never validated locally.
    Bearer(String),
    /// Tokens minted from a service account and cached.
    ServiceAccount(Arc<TokenCache>),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Credentials::Bearer(<redacted>)"),
            Credentials::ServiceAccount(_) => f.write_str("Credentials::ServiceAccount"),
        }
    }
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer(token.into())
    }

    /// Wrap any `gcp_auth` provider in a token cache.
    pub fn from_provider(provider: Arc<dyn TokenProvider>) -> Self {
        Self::from_source(Arc::new(GcpTokenSource::new(provider)))
    }

    /// Wrap any token source in a token cache.
    pub fn from_source(source: Arc<dyn TokenSource>) -> Self {
        Credentials::ServiceAccount(Arc::new(TokenCache::new(source)))
    }

    /// `FIRESTORE_TOKEN` if set, otherwise the service account named by
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> FirestoreResult<Self> {
        if let Some(token) = std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Bearer(token));
        }

        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Self::from_provider(Arc::new(sa))),
            None => Err(FirestoreError::auth_error(format!(
                "Neither {} nor GOOGLE_APPLICATION_CREDENTIALS is set",
                TOKEN_ENV_VAR
            ))),
        }
    }

    /// Token to put in the next request.
    pub async fn token(&self) -> FirestoreResult<String> {
        match self {
            Credentials::Bearer(token) => Ok(token.clone()),
            Credentials::ServiceAccount(cache) => cache.get_token().await,
        }
    }
}

// =============================================================================
// Token Sources
// =============================================================================

/// A freshly minted access token.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Something that can mint access tokens for the Firestore scope.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> FirestoreResult<MintedToken>;
}

/// [`TokenSource`] backed by a `gcp_auth` provider.
pub struct GcpTokenSource {
    provider: Arc<dyn TokenProvider>,
}

impl GcpTokenSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenSource for GcpTokenSource {
    async fn fetch_token(&self) -> FirestoreResult<MintedToken> {
        let token = self
            .provider
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| FirestoreError::auth_error(format!("Failed to obtain auth token: {}", e)))?;

        Ok(MintedToken {
            access_token: token.as_str().to_string(),
            expires_at: token.expires_at(),
        })
    }
}

// =============================================================================
// Token Cache
// =============================================================================

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call mints a new one.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Return a fresh token, refreshing under the write lock when needed.
    ///
    /// If the refresh fails but the cached token has not expired yet, the
    /// cached token is returned.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh()) {
            return Ok(cached.access_token.clone());
        }

        match self.source.fetch_token().await {
            Ok(MintedToken {
                access_token,
                expires_at,
            }) => {
                let expires_at = expiry_instant(expires_at);

                *cache = Some(CachedToken {
                    access_token: access_token.clone(),
                    expires_at,
                });

                debug!("Refreshed Firestore auth token");
                Ok(access_token)
            }
            Err(e) => match cache.as_ref().filter(|c| c.is_usable()) {
                Some(cached) => {
                    warn!("Token refresh failed, using existing token: {}", e);
                    Ok(cached.access_token.clone())
                }
                None => Err(e),
            },
        }
    }
}

/// Map a wall-clock expiry onto the monotonic clock.
///
/// Expiries in the past map to "now" so the next call refreshes.
fn expiry_instant(expires_at: DateTime<Utc>) -> Instant {
    let now = Utc::now();
    if expires_at <= now {
        return Instant::now();
    }
    match (expires_at - now).to_std() {
        Ok(ttl) => Instant::now() + ttl,
        Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Mints `token-<n>` valid for `ttl`, counting calls. Fails while `failing`
    /// is set.
    struct FakeSource {
        calls: AtomicUsize,
        failing: AtomicBool,
        ttl: chrono::Duration,
        delay: Duration,
    }

    impl FakeSource {
        fn new(ttl: chrono::Duration) -> Arc<Self> {
            Self::slow(ttl, Duration::ZERO)
        }

        fn slow(ttl: chrono::Duration, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                ttl,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenSource for FakeSource {
        async fn fetch_token(&self) -> FirestoreResult<MintedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(FirestoreError::auth_error("metadata server unavailable"));
            }
            Ok(MintedToken {
                access_token: format!("token-{}", n),
                expires_at: Utc::now() + self.ttl,
            })
        }
    }

    #[test]
    fn test_firestore_scope() {
        assert!(FIRESTORE_SCOPE.contains("datastore"));
    }

    #[test]
    fn test_expiry_in_past_is_immediate() {
        let expired = expiry_instant(Utc::now() - chrono::Duration::minutes(5));
        assert!(expired <= Instant::now());
    }

    #[test]
    fn test_expiry_in_future_is_tracked() {
        let later = expiry_instant(Utc::now() + chrono::Duration::minutes(30));
        assert!(later > Instant::now() + Duration::from_secs(29 * 60));
    }

    #[tokio::test]
    async fn test_bearer_token_is_returned_verbatim() {
        let creds = Credentials::bearer("opaque-token");
        assert_eq!(creds.token().await.unwrap(), "opaque-token");
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials::bearer("secret");
        assert!(!format!("{:?}", creds).contains("secret"));
    }

    #[tokio::test]
    async fn test_fresh_token_is_reused() {
        let source = FakeSource::new(chrono::Duration::minutes(30));
        let cache = TokenCache::new(source.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_token_inside_refresh_margin_is_refreshed() {
        // 30 s left is inside the 60 s margin, so every call refreshes.
        let source = FakeSource::new(chrono::Duration::seconds(30));
        let cache = TokenCache::new(source.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let source = FakeSource::new(chrono::Duration::minutes(30));
        let cache = TokenCache::new(source.clone());

        cache.get_token().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_refresh() {
        let source = FakeSource::slow(chrono::Duration::minutes(30), Duration::from_millis(50));
        let cache = Arc::new(TokenCache::new(source.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token-1");
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_unexpired_token() {
        let source = FakeSource::new(chrono::Duration::seconds(30));
        let cache = TokenCache::new(source.clone());
        assert_eq!(cache.get_token().await.unwrap(), "token-1");

        source.failing.store(true, Ordering::SeqCst);
        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_after_expiry_is_an_error() {
        let source = FakeSource::new(chrono::Duration::seconds(-5));
        let cache = TokenCache::new(source.clone());
        assert_eq!(cache.get_token().await.unwrap(), "token-1");

        source.failing.store(true, Ordering::SeqCst);
        let err = cache.get_token().await.unwrap_err();
        assert!(matches!(err, FirestoreError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_service_account_credentials_use_the_cache() {
        let source = FakeSource::new(chrono::Duration::minutes(30));
        let creds = Credentials::from_source(source.clone());

        assert_eq!(creds.token().await.unwrap(), "token-1");
        assert_eq!(creds.clone().token().await.unwrap(), "token-1");
        assert_eq!(source.calls(), 1);
    }

    #[test]
    #[serial]
    fn test_from_env_prefers_static_token() {
        std::env::set_var(TOKEN_ENV_VAR, "env-token");
        let creds = Credentials::from_env().unwrap();
        std::env::remove_var(TOKEN_ENV_VAR);
        assert!(matches!(creds, Credentials::Bearer(ref t) if t == "env-token"));
    }
}
