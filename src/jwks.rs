//! JWKS fetching for recipient key discovery.
//!
//! Recipients publish their public keys as a JWKS document over HTTPS. This
//! module provides the fetch side: URL validation, key validation, and a
//! small in-memory cache whose TTL honors `Cache-Control`/`Expires` response
//! headers clamped to a configurable range. The codec itself takes keys by
//! value; nothing here is required on the seal/open hot path.

use crate::errors::{HpkeError, Result};
use crate::keys::{select_jwk, Jwk, Jwks};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use url::Url;

/// Default lower clamp for cached JWKS documents.
pub const DEFAULT_MIN_TTL: Duration = Duration::from_secs(60);

/// Default upper clamp for cached JWKS documents.
pub const DEFAULT_MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key-source seam for integrations that resolve JWKS documents through
/// their own transport (tests, alternative HTTP stacks, pinned key sets).
#[async_trait]
pub trait JwksFetch: Send + Sync {
    /// Fetches and validates the JWKS document at `url`.
    async fn fetch_jwks(&self, url: &str) -> Result<Jwks>;
}

/// Validates a JWKS URL: present, parseable, and HTTPS.
pub fn validate_jwks_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(HpkeError::JwksUrlRequired);
    }
    let parsed = Url::parse(url)
        .map_err(|e| HpkeError::JwksInvalid(format!("invalid JWKS URL: {}", e)))?;
    if parsed.scheme() != "https" {
        return Err(HpkeError::JwksHttpsRequired);
    }
    Ok(())
}

/// Fetches JWKS documents over HTTPS with TTL-clamped caching.
///
/// # Examples
///
/// ```no_run
/// use x402_hpke::jwks::JwksClient;
///
/// # async fn example() -> Result<(), x402_hpke::errors::HpkeError> {
/// let mut client = JwksClient::new();
/// let jwk = client.fetch_key("https://keys.example.com/jwks.json", "key-1").await?;
/// assert!(jwk.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct JwksClient {
    http_client: Client,
    min_ttl: Duration,
    max_ttl: Duration,
    cache: HashMap<String, CacheEntry>,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    jwks: Jwks,
    expires_at: Instant,
}

impl Default for JwksClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JwksClient {
    /// Creates a client with the default TTL clamp.
    pub fn new() -> Self {
        Self {
            http_client: Client::new(),
            min_ttl: DEFAULT_MIN_TTL,
            max_ttl: DEFAULT_MAX_TTL,
            cache: HashMap::new(),
        }
    }

    /// Sets the minimum cache TTL.
    pub fn with_min_ttl(mut self, min_ttl: Duration) -> Self {
        self.min_ttl = min_ttl;
        self
    }

    /// Sets the maximum cache TTL.
    pub fn with_max_ttl(mut self, max_ttl: Duration) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Fetches a JWKS document, bypassing the cache.
    pub async fn fetch(&self, url: &str) -> Result<(Jwks, Duration)> {
        validate_jwks_url(url)?;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| HpkeError::JwksInvalid(format!("fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HpkeError::JwksHttp(status.as_u16()));
        }

        let ttl = self.clamp_ttl(ttl_from_headers(response.headers()));

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| HpkeError::JwksInvalid(format!("malformed JWKS body: {}", e)))?;
        for key in &jwks.keys {
            key.validate()?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(url, keys = jwks.keys.len(), ttl_secs = ttl.as_secs(), "fetched JWKS");

        Ok((jwks, ttl))
    }

    /// Fetches a JWKS document through the cache.
    pub async fn fetch_cached(&mut self, url: &str) -> Result<Jwks> {
        if let Some(entry) = self.cache.get(url) {
            if entry.expires_at > Instant::now() {
                return Ok(entry.jwks.clone());
            }
        }

        let (jwks, ttl) = self.fetch(url).await?;
        self.cache.insert(
            url.to_string(),
            CacheEntry {
                jwks: jwks.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(jwks)
    }

    /// Fetches the JWKS and selects a key by `kid`.
    pub async fn fetch_key(&mut self, url: &str, kid: &str) -> Result<Option<Jwk>> {
        let jwks = self.fetch_cached(url).await?;
        Ok(select_jwk(&jwks, kid)?.cloned())
    }

    fn clamp_ttl(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.min_ttl)
            .clamp(self.min_ttl, self.max_ttl)
    }
}

#[async_trait]
impl JwksFetch for JwksClient {
    async fn fetch_jwks(&self, url: &str) -> Result<Jwks> {
        let (jwks, _) = self.fetch(url).await?;
        Ok(jwks)
    }
}

fn ttl_from_headers(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    if let Some(value) = headers
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ttl) = parse_cache_control(value) {
            return Some(ttl);
        }
    }
    headers
        .get(reqwest::header::EXPIRES)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_expires)
}

/// Parses `Cache-Control`, preferring `s-maxage` over `max-age`.
fn parse_cache_control(value: &str) -> Option<Duration> {
    let mut max_age = None;
    let mut s_maxage = None;
    for directive in value.split(',') {
        let directive = directive.trim().to_ascii_lowercase();
        if let Some(rest) = directive.strip_prefix("s-maxage=") {
            s_maxage = rest.parse::<u64>().ok();
        } else if let Some(rest) = directive.strip_prefix("max-age=") {
            max_age = rest.parse::<u64>().ok();
        }
    }
    s_maxage.or(max_age).map(Duration::from_secs)
}

/// Parses an `Expires` header into a remaining TTL. Dates in the past clamp
/// to zero (the caller's minimum TTL then applies).
fn parse_expires(value: &str) -> Option<Duration> {
    let expires = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = expires.signed_duration_since(chrono::Utc::now());
    Some(Duration::from_secs(remaining.num_seconds().max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    #[test]
    fn test_url_validation() {
        assert_eq!(
            validate_jwks_url("").unwrap_err().code(),
            "JWKS_URL_REQUIRED"
        );
        assert_eq!(
            validate_jwks_url("http://keys.example.com/jwks.json")
                .unwrap_err()
                .code(),
            "JWKS_HTTPS_REQUIRED"
        );
        assert_eq!(
            validate_jwks_url("not a url").unwrap_err().code(),
            "JWKS_INVALID"
        );
        assert!(validate_jwks_url("https://keys.example.com/jwks.json").is_ok());
    }

    #[test]
    fn test_parse_cache_control() {
        assert_eq!(
            parse_cache_control("max-age=300"),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            parse_cache_control("public, max-age=300, s-maxage=600"),
            Some(Duration::from_secs(600))
        );
        assert_eq!(
            parse_cache_control("Public, Max-Age=120"),
            Some(Duration::from_secs(120))
        );
        assert_eq!(parse_cache_control("no-store"), None);
    }

    #[test]
    fn test_parse_expires() {
        // Far future: several hours of TTL remain.
        let ttl = parse_expires("Sat, 01 Jan 2101 00:00:00 GMT").unwrap();
        assert!(ttl > Duration::from_secs(60 * 60));

        // Past dates clamp to zero rather than underflowing.
        let ttl = parse_expires("Thu, 01 Jan 2004 00:00:00 GMT").unwrap();
        assert_eq!(ttl, Duration::ZERO);

        assert_eq!(parse_expires("not a date"), None);
    }

    #[test]
    fn test_ttl_clamping() {
        let client = JwksClient::new()
            .with_min_ttl(Duration::from_secs(60))
            .with_max_ttl(Duration::from_secs(3600));

        assert_eq!(client.clamp_ttl(None), Duration::from_secs(60));
        assert_eq!(
            client.clamp_ttl(Some(Duration::from_secs(5))),
            Duration::from_secs(60)
        );
        assert_eq!(
            client.clamp_ttl(Some(Duration::from_secs(600))),
            Duration::from_secs(600)
        );
        assert_eq!(
            client.clamp_ttl(Some(Duration::from_secs(86400))),
            Duration::from_secs(3600)
        );
    }

    struct PinnedKeys(Jwks);

    #[async_trait]
    impl JwksFetch for PinnedKeys {
        async fn fetch_jwks(&self, url: &str) -> Result<Jwks> {
            validate_jwks_url(url)?;
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_trait_seam_with_pinned_keys() {
        let pair = KeyPair::generate(Some("pinned-1"));
        let source = PinnedKeys(Jwks {
            keys: vec![pair.public.clone()],
        });

        let jwks = tokio_test::block_on(
            source.fetch_jwks("https://keys.example.com/jwks.json"),
        )
        .unwrap();
        assert_eq!(select_jwk(&jwks, "pinned-1").unwrap().unwrap().x, pair.public.x);

        let err =
            tokio_test::block_on(source.fetch_jwks("http://keys.example.com/jwks.json"))
                .unwrap_err();
        assert_eq!(err.code(), "JWKS_HTTPS_REQUIRED");
    }
}
